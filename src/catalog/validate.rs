//! Cross-reference checks over a loaded catalog
//!
//! Loading only checks that each file parses. These checks catch data that
//! parses but would misbehave at runtime: dangling status, summon and
//! minion ids, misordered level rules, malformed dice and out-of-range
//! chances. The engine tolerates all of them, so they are reported, never
//! fatal.

use std::fmt;

use crate::combat::{DiceExpr, DiceSpec, EffectKind, Magnitude};

use super::{Catalog, EnemyAbilityKind};

/// One problem found in the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogIssue {
    /// Catalog section: "ability", "alias", "enemy" or "summon"
    pub kind: &'static str,
    /// Id of the entry holding the problem
    pub id: String,
    pub message: String,
}

impl CatalogIssue {
    fn new(kind: &'static str, id: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for CatalogIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.id, self.message)
    }
}

fn check_chance(chance: Option<f64>) -> Option<String> {
    match chance {
        Some(c) if !(0.0..=1.0).contains(&c) => Some(format!("chance {} outside [0, 1]", c)),
        _ => None,
    }
}

fn check_notation(notation: &str) -> Option<String> {
    notation
        .parse::<DiceExpr>()
        .err()
        .map(|e| format!("bad dice notation {:?}: {}", notation, e))
}

fn check_dice(spec: &DiceSpec) -> Option<String> {
    (spec.dice == 0 || spec.sides == 0)
        .then(|| format!("degenerate dice {}d{}", spec.dice, spec.sides))
}

/// Run every check; an empty list means the catalog is consistent
pub fn validate(catalog: &Catalog) -> Vec<CatalogIssue> {
    let mut issues = Vec::new();
    check_abilities(catalog, &mut issues);
    check_enemies(catalog, &mut issues);
    check_summons(catalog, &mut issues);
    issues.sort_by(|a, b| (a.kind, &a.id).cmp(&(b.kind, &b.id)));
    issues
}

fn check_abilities(catalog: &Catalog, issues: &mut Vec<CatalogIssue>) {
    for (alias, target) in catalog.aliases() {
        if catalog.abilities().all(|a| &a.id != target) {
            issues.push(CatalogIssue::new(
                "alias",
                alias,
                format!("points at unknown ability {}", target),
            ));
        }
    }

    for ability in catalog.abilities() {
        let mut report =
            |message: String| issues.push(CatalogIssue::new("ability", &ability.id, message));

        if ability.base_effects.is_empty() {
            report("no effects".to_string());
        }
        for effect in &ability.base_effects {
            if let Some(msg) = check_chance(effect.chance) {
                report(msg);
            }
            if let Magnitude::Notation(notation) = &effect.magnitude {
                if let Some(msg) = check_notation(notation) {
                    report(msg);
                }
            }
            match &effect.kind {
                EffectKind::Status { status_id, .. } | EffectKind::Buff { status_id, .. } => {
                    if catalog.status(status_id).is_none() {
                        report(format!("unknown status {}", status_id));
                    }
                }
                EffectKind::Cleanse { status_id: Some(status_id) } => {
                    if catalog.status(status_id).is_none() {
                        report(format!("cleanses unknown status {}", status_id));
                    }
                }
                EffectKind::Summon { summon_id } => match summon_id {
                    Some(id) if catalog.summon(id).is_none() => {
                        report(format!("unknown summon {}", id))
                    }
                    None => report("summon effect without summon_id".to_string()),
                    Some(_) => {}
                },
                EffectKind::GrantItem { item_id: None, .. } => {
                    report("grant_item effect without item_id".to_string());
                }
                _ => {}
            }
        }

        let mut last = None;
        for rule in &ability.level_rules {
            if let Some(prev) = last {
                if rule.min_level <= prev {
                    report(format!("level rule {} does not follow {}", rule.min_level, prev));
                }
            }
            last = Some(rule.min_level);

            if let Some(delta) = rule.magnitude_delta.as_deref() {
                if let Some(msg) = check_notation(delta) {
                    report(msg);
                }
            }
        }
    }
}

fn check_enemies(catalog: &Catalog, issues: &mut Vec<CatalogIssue>) {
    for enemy in catalog.enemies() {
        let mut report =
            |message: String| issues.push(CatalogIssue::new("enemy", &enemy.id, message));

        if enemy.base_stats.hp <= 0 {
            report(format!("non-positive hp {}", enemy.base_stats.hp));
        }
        if let Some(msg) = check_dice(&enemy.base_stats.basic_attack) {
            report(msg);
        }
        if let Some(on_hit) = &enemy.on_hit {
            if catalog.status(&on_hit.status_id).is_none() {
                report(format!("on_hit applies unknown status {}", on_hit.status_id));
            }
            if let Some(msg) = check_chance(Some(on_hit.chance)) {
                report(msg);
            }
        }

        for ability in &enemy.abilities {
            if let Some(msg) = check_chance(ability.chance) {
                report(format!("{}: {}", ability.id, msg));
            }
            match &ability.kind {
                EnemyAbilityKind::Summon { summon_ids, summon_count } => {
                    if summon_ids.is_empty() {
                        report(format!("{}: no summon_ids", ability.id));
                    }
                    for id in summon_ids {
                        if catalog.enemy(id).is_none() {
                            report(format!("{}: unknown minion {}", ability.id, id));
                        }
                    }
                    if summon_count.min > summon_count.max {
                        report(format!(
                            "{}: summon_count min {} above max {}",
                            ability.id, summon_count.min, summon_count.max
                        ));
                    }
                }
                EnemyAbilityKind::SanityAttack { sanity_damage } => {
                    if let Some(msg) = sanity_damage.as_ref().and_then(check_dice) {
                        report(format!("{}: {}", ability.id, msg));
                    }
                }
                EnemyAbilityKind::HpAttack { damage, effect } => {
                    if let Some(msg) = damage.as_ref().and_then(check_dice) {
                        report(format!("{}: {}", ability.id, msg));
                    }
                    if let Some(rider) = effect {
                        if catalog.status(&rider.status_id).is_none() {
                            report(format!("{}: unknown status {}", ability.id, rider.status_id));
                        }
                        if let Some(msg) = check_chance(rider.chance) {
                            report(format!("{}: {}", ability.id, msg));
                        }
                    }
                }
            }
        }

        for id in &enemy.ai_logic.preferred_ability_order {
            if enemy.ability(id).is_none() {
                report(format!("preferred_ability_order names unknown ability {}", id));
            }
        }
    }
}

fn check_summons(catalog: &Catalog, issues: &mut Vec<CatalogIssue>) {
    for summon in catalog.summons() {
        let mut report =
            |message: String| issues.push(CatalogIssue::new("summon", &summon.id, message));
        if summon.base_stats.hp <= 0 {
            report(format!("non-positive hp {}", summon.base_stats.hp));
        }
        if summon.duration == 0 {
            report("zero duration".to_string());
        }
        if let Some(msg) = check_dice(&summon.base_stats.basic_attack) {
            report(msg);
        }
    }
}
