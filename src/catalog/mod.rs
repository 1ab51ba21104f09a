//! Read-only game data catalogs
//!
//! Four JSON catalogs are loaded once per process and shared by every
//! encounter:
//! - `abilities.json` - ability definitions (plus optional id aliases)
//! - `status_effects.json` - status effect definitions
//! - `enemies.json` - enemy templates
//! - `summons.json` - summon templates
//!
//! Each file may be a bare array or an object wrapping the array under the
//! file's key (`{"abilities": [...]}`).

mod templates;
mod validate;

pub use templates::{
    AbilityRider, AiLogic, EnemyAbility, EnemyAbilityKind, EnemyStats, EnemyTemplate, OnHitEffect,
    SummonCount, SummonStats, SummonTemplate,
};
pub use validate::{validate, CatalogIssue};

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::combat::{AbilityDefinition, StatusEffectDefinition, StatusLookup};

pub const ABILITIES_FILE: &str = "abilities.json";
pub const STATUS_EFFECTS_FILE: &str = "status_effects.json";
pub const ENEMIES_FILE: &str = "enemies.json";
pub const SUMMONS_FILE: &str = "summons.json";

const BUILTIN_ABILITIES: &str = include_str!("../../data/abilities.json");
const BUILTIN_STATUS_EFFECTS: &str = include_str!("../../data/status_effects.json");
const BUILTIN_ENEMIES: &str = include_str!("../../data/enemies.json");
const BUILTIN_SUMMONS: &str = include_str!("../../data/summons.json");

/// Catalog loading errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },
}

/// All catalog data, keyed by stable string id
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    abilities: HashMap<String, AbilityDefinition>,
    aliases: HashMap<String, String>,
    statuses: HashMap<String, StatusEffectDefinition>,
    enemies: HashMap<String, EnemyTemplate>,
    summons: HashMap<String, SummonTemplate>,
}

impl Catalog {
    /// Empty catalog, filled with the `insert_*` methods
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalogs bundled with the crate
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(
            BUILTIN_ABILITIES,
            BUILTIN_STATUS_EFFECTS,
            BUILTIN_ENEMIES,
            BUILTIN_SUMMONS,
        )
    }

    /// Load all four catalog files from a directory
    pub fn load_dir(dir: &Path) -> Result<Self, CatalogError> {
        let read = |name: &str| -> Result<String, CatalogError> {
            let path = dir.join(name);
            std::fs::read_to_string(&path).map_err(|source| CatalogError::Io { path, source })
        };
        let catalog = Self::from_json(
            &read(ABILITIES_FILE)?,
            &read(STATUS_EFFECTS_FILE)?,
            &read(ENEMIES_FILE)?,
            &read(SUMMONS_FILE)?,
        )?;
        info!("Loaded catalog from {}", dir.display());
        Ok(catalog)
    }

    /// Parse catalogs from JSON text
    pub fn from_json(
        abilities: &str,
        status_effects: &str,
        enemies: &str,
        summons: &str,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();

        for ability in parse_list::<AbilityDefinition>(ABILITIES_FILE, abilities, "abilities")? {
            catalog.insert_ability(ability)?;
        }
        catalog.aliases = parse_aliases(abilities)?;
        let statuses = parse_list::<StatusEffectDefinition>(
            STATUS_EFFECTS_FILE,
            status_effects,
            "status_effects",
        )?;
        for status in statuses {
            catalog.insert_status(status)?;
        }
        for enemy in parse_list::<EnemyTemplate>(ENEMIES_FILE, enemies, "enemies")? {
            catalog.insert_enemy(enemy)?;
        }
        for summon in parse_list::<SummonTemplate>(SUMMONS_FILE, summons, "summons")? {
            catalog.insert_summon(summon)?;
        }

        debug!(
            "Catalog: {} abilities, {} aliases, {} statuses, {} enemies, {} summons",
            catalog.abilities.len(),
            catalog.aliases.len(),
            catalog.statuses.len(),
            catalog.enemies.len(),
            catalog.summons.len()
        );
        Ok(catalog)
    }

    pub fn insert_ability(&mut self, ability: AbilityDefinition) -> Result<(), CatalogError> {
        insert_unique(&mut self.abilities, "ability", ability.id.clone(), ability)
    }

    pub fn insert_status(&mut self, status: StatusEffectDefinition) -> Result<(), CatalogError> {
        insert_unique(&mut self.statuses, "status", status.id.clone(), status)
    }

    pub fn insert_enemy(&mut self, enemy: EnemyTemplate) -> Result<(), CatalogError> {
        insert_unique(&mut self.enemies, "enemy", enemy.id.clone(), enemy)
    }

    pub fn insert_summon(&mut self, summon: SummonTemplate) -> Result<(), CatalogError> {
        insert_unique(&mut self.summons, "summon", summon.id.clone(), summon)
    }

    /// Map a legacy ability id onto a canonical one
    pub fn insert_alias(&mut self, alias: &str, target: &str) {
        self.aliases.insert(alias.to_string(), target.to_string());
    }

    /// Look up an ability by id or alias
    pub fn ability(&self, id: &str) -> Option<&AbilityDefinition> {
        self.abilities.get(id).or_else(|| {
            self.aliases
                .get(id)
                .and_then(|target| self.abilities.get(target))
        })
    }

    pub fn status(&self, id: &str) -> Option<&StatusEffectDefinition> {
        self.statuses.get(id)
    }

    pub fn enemy(&self, id: &str) -> Option<&EnemyTemplate> {
        self.enemies.get(id)
    }

    pub fn summon(&self, id: &str) -> Option<&SummonTemplate> {
        self.summons.get(id)
    }

    pub fn abilities(&self) -> impl Iterator<Item = &AbilityDefinition> {
        self.abilities.values()
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&String, &String)> {
        self.aliases.iter()
    }

    pub fn statuses(&self) -> impl Iterator<Item = &StatusEffectDefinition> {
        self.statuses.values()
    }

    pub fn enemies(&self) -> impl Iterator<Item = &EnemyTemplate> {
        self.enemies.values()
    }

    pub fn summons(&self) -> impl Iterator<Item = &SummonTemplate> {
        self.summons.values()
    }
}

impl StatusLookup for Catalog {
    fn status(&self, id: &str) -> Option<&StatusEffectDefinition> {
        self.statuses.get(id)
    }
}

fn insert_unique<T>(
    map: &mut HashMap<String, T>,
    kind: &'static str,
    id: String,
    value: T,
) -> Result<(), CatalogError> {
    if map.contains_key(&id) {
        return Err(CatalogError::DuplicateId { kind, id });
    }
    map.insert(id, value);
    Ok(())
}

fn parse_value(file: &str, text: &str) -> Result<Value, CatalogError> {
    serde_json::from_str(text).map_err(|source| CatalogError::Parse {
        file: file.to_string(),
        source,
    })
}

/// Accept either a bare array or `{ key: [...] }`
fn parse_list<T: DeserializeOwned>(
    file: &str,
    text: &str,
    key: &str,
) -> Result<Vec<T>, CatalogError> {
    let list = match parse_value(file, text)? {
        Value::Object(mut map) => map.remove(key).unwrap_or(Value::Array(Vec::new())),
        other => other,
    };
    serde_json::from_value(list).map_err(|source| CatalogError::Parse {
        file: file.to_string(),
        source,
    })
}

/// Optional `"aliases": { "old_id": "new_id" }` next to the ability list
fn parse_aliases(text: &str) -> Result<HashMap<String, String>, CatalogError> {
    match parse_value(ABILITIES_FILE, text)? {
        Value::Object(mut map) => match map.remove("aliases") {
            Some(aliases) => serde_json::from_value(aliases).map_err(|source| CatalogError::Parse {
                file: ABILITIES_FILE.to_string(),
                source,
            }),
            None => Ok(HashMap::new()),
        },
        _ => Ok(HashMap::new()),
    }
}
