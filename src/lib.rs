//! cryptcombat - turn-based party-vs-monsters combat engine
//!
//! The exploration layer hands over a party snapshot and a list of enemy
//! ids; the engine runs the fight to a terminal state and hands back a
//! `CombatResult`.

pub mod catalog;
pub mod combat;
pub mod handoff;
pub mod party;
pub mod timers;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use catalog::Catalog;
use combat::{CombatError, CombatSession, PlayerAction, RulesConfig, Step};
use handoff::{CombatHandoff, CombatResult};
use party::PartyController;
use timers::{Pacer, PacingConfig, Pause};

/// Prefix for environment overrides, e.g. `CRYPT_RULES__MAX_LEVEL=12`
pub const ENV_PREFIX: &str = "CRYPT_";

/// Engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the four catalog files; the built-in catalog when unset
    pub catalog_dir: Option<PathBuf>,
    /// RNG seed for reproducible encounters
    pub seed: Option<u64>,
    pub pacing: PacingConfig,
    pub rules: RulesConfig,
}

impl Config {
    /// Defaults, then the TOML file if given, then `CRYPT_` environment variables
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Config = Self::figment(path)
            .extract()
            .context("Failed to load configuration")?;
        Ok(config)
    }

    /// Load the configured catalog, or the built-in one
    pub fn load_catalog(&self) -> Result<Catalog> {
        match &self.catalog_dir {
            Some(dir) => Catalog::load_dir(dir)
                .with_context(|| format!("Failed to load catalog from {}", dir.display())),
            None => Catalog::builtin().context("Failed to load built-in catalog"),
        }
    }

    /// Build a session for a handoff under this configuration
    pub fn session(
        &self,
        handoff: &CombatHandoff,
        catalog: Arc<Catalog>,
    ) -> Result<CombatSession, CombatError> {
        CombatSession::from_handoff(handoff, catalog, self.rules.clone(), self.seed)
    }
}

/// Drives a session to its end, pausing between steps and asking a party
/// controller for player and companion decisions
pub struct EncounterRunner<P: Pacer> {
    session: CombatSession,
    pacer: P,
}

impl<P: Pacer> EncounterRunner<P> {
    pub fn new(session: CombatSession, pacer: P) -> Self {
        Self { session, pacer }
    }

    pub fn session(&self) -> &CombatSession {
        &self.session
    }

    pub fn pacer(&self) -> &P {
        &self.pacer
    }

    pub fn into_session(self) -> CombatSession {
        self.session
    }

    /// Run until the encounter reaches a terminal state.
    ///
    /// A rejected ability (wrong faction) leaves the turn open; the member
    /// defends instead so the fight keeps moving.
    pub async fn run<C: PartyController>(
        &mut self,
        controller: &mut C,
    ) -> Result<CombatResult, CombatError> {
        info!("Running encounter {}", self.session.id());
        loop {
            if let Some(result) = self.session.result() {
                return Ok(result);
            }

            match self.session.advance() {
                Step::RoundStarted { .. } => self.pacer.pause(Pause::Turn).await,
                Step::Acted { .. } => self.pacer.pause(Pause::Action).await,
                Step::Skipped { .. } => self.pacer.pause(Pause::Skip).await,
                Step::AwaitingInput { actor } => {
                    let action = controller.choose_action(actor, &self.session);
                    match self.session.submit(actor, action) {
                        Ok(_) => {}
                        Err(CombatError::Ability(e)) => {
                            warn!("{} cannot act that way: {}", actor, e);
                            self.session.submit(actor, PlayerAction::Defend)?;
                        }
                        Err(e) => return Err(e),
                    }
                    self.pacer.pause(Pause::Action).await;
                }
                Step::Ended { outcome } => {
                    info!("Encounter over: {}", outcome);
                }
            }
        }
    }
}
