//! Encounter state machine
//!
//! `Active -> Victory | Defeat | Fled`, all terminal.
//!
//! - Victory: no enemy remains alive with HP above zero
//! - Defeat: the player's HP reaches zero. Sanity at zero is not a loss;
//!   the party fights on through madness.
//! - Fled: player-initiated, after the flee penalty is paid

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

use super::combatant::Roster;
use super::rules::RulesConfig;

/// Overall encounter state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncounterState {
    #[default]
    Active,
    Victory,
    Defeat,
    Fled,
}

impl EncounterState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EncounterState::Active)
    }
}

impl FromStr for EncounterState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(EncounterState::Active),
            "victory" | "win" => Ok(EncounterState::Victory),
            "defeat" | "loss" => Ok(EncounterState::Defeat),
            "fled" | "flee" => Ok(EncounterState::Fled),
            _ => Err(()),
        }
    }
}

impl fmt::Display for EncounterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EncounterState::Active => "active",
            EncounterState::Victory => "victory",
            EncounterState::Defeat => "defeat",
            EncounterState::Fled => "fled",
        };
        write!(f, "{}", s)
    }
}

/// Check end conditions against the roster.
///
/// Victory is checked first, so a final blow that also fells the player
/// still wins the fight.
pub fn evaluate(roster: &Roster) -> EncounterState {
    if roster.enemies_remaining() == 0 {
        return EncounterState::Victory;
    }
    match roster.player() {
        Some(p) if p.is_alive() => EncounterState::Active,
        _ => EncounterState::Defeat,
    }
}

/// What one party member paid to escape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleeLoss {
    pub name: String,
    pub hp_lost: i32,
    pub sanity_lost: i32,
}

/// Proportional loss, at least 1 when there is anything to lose
fn proportional_loss(current: i32, fraction: f64) -> i32 {
    ((current as f64 * fraction).ceil() as i32).max(1)
}

/// Apply the flee penalty to every living party member.
///
/// HP never drops below 1 from fleeing; sanity floors at 0.
pub fn apply_flee_penalty(roster: &mut Roster, rules: &RulesConfig) -> Vec<FleeLoss> {
    let mut losses = Vec::new();
    for c in roster
        .iter_mut()
        .filter(|c| c.is_alive() && c.faction.is_party_member())
    {
        let hp_lost = if c.hp > 1 {
            proportional_loss(c.hp, rules.flee_hp_fraction).min(c.hp - 1)
        } else {
            0
        };
        c.hp -= hp_lost;

        let sanity_lost = if c.sanity > 0 {
            proportional_loss(c.sanity, rules.flee_sanity_fraction).min(c.sanity)
        } else {
            0
        };
        c.sanity -= sanity_lost;

        info!(
            "{} flees, losing {} HP and {} sanity",
            c.name, hp_lost, sanity_lost
        );
        losses.push(FleeLoss {
            name: c.name.clone(),
            hp_lost,
            sanity_lost,
        });
    }
    losses
}
