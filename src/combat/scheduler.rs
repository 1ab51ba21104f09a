//! Turn scheduling
//!
//! State machine: `Idle -> RoundStart -> ActorTurn(n) -> [RoundStart | Idle]`.
//!
//! - Each round every living combatant rolls `initiative + jitter`
//! - The queue is sorted descending by the rolled value
//! - A roster change mid-round rebuilds the queue with fresh rolls; those
//!   who already acted stay ahead of the cursor, so nobody acts twice or
//!   loses a turn within a round

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::combatant::{Combatant, CombatantId, Faction};

/// Where the scheduler is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerPhase {
    Idle,
    RoundStart,
    ActorTurn(usize),
}

/// One slot in the turn order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub combatant: CombatantId,
    pub faction: Faction,
    pub base_init: i32,
    pub rolled_init: i32,
}

impl QueueEntry {
    fn roll<R: Rng + ?Sized>(c: &Combatant, jitter: i32, rng: &mut R) -> Self {
        let jitter = jitter.abs();
        Self {
            combatant: c.id,
            faction: c.faction,
            base_init: c.initiative,
            rolled_init: c.initiative + rng.random_range(-jitter..=jitter),
        }
    }
}

/// Result of asking for the next actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// This combatant acts now
    Actor(CombatantId),
    /// The entry refers to a combatant no longer in the fight
    Stale(CombatantId),
    /// Every entry has acted; a new round must start
    RoundComplete,
    /// Nothing scheduled
    Idle,
}

/// Initiative-ordered turn queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnQueue {
    entries: Vec<QueueEntry>,
    phase: SchedulerPhase,
    round: u32,
    rebuilds: u32,
    jitter: i32,
}

impl TurnQueue {
    pub fn new(jitter: i32) -> Self {
        Self {
            entries: Vec::new(),
            phase: SchedulerPhase::Idle,
            round: 0,
            rebuilds: 0,
            jitter,
        }
    }

    /// Roll initiative for the living set and begin a new round
    pub fn start_round<'a, R, I>(&mut self, living: I, rng: &mut R)
    where
        R: Rng + ?Sized,
        I: IntoIterator<Item = &'a Combatant>,
    {
        self.entries = roll_sorted(living, self.jitter, rng);
        self.round += 1;
        self.phase = SchedulerPhase::RoundStart;
        debug!("Round {} order: {:?}", self.round, self.order());
    }

    /// Rebuild from the current living set after a roster change
    pub fn rebuild<'a, R, I>(&mut self, living: I, rng: &mut R)
    where
        R: Rng + ?Sized,
        I: IntoIterator<Item = &'a Combatant>,
    {
        let acted: Vec<CombatantId> = match self.phase {
            SchedulerPhase::ActorTurn(i) => {
                self.entries.iter().take(i + 1).map(|e| e.combatant).collect()
            }
            _ => Vec::new(),
        };

        let (done, pending): (Vec<_>, Vec<_>) = roll_sorted(living, self.jitter, rng)
            .into_iter()
            .partition(|e| acted.contains(&e.combatant));

        self.phase = match (self.phase, done.len()) {
            (SchedulerPhase::Idle, _) => SchedulerPhase::Idle,
            (_, 0) => SchedulerPhase::RoundStart,
            (_, n) => SchedulerPhase::ActorTurn(n - 1),
        };
        self.entries = done.into_iter().chain(pending).collect();
        self.rebuilds += 1;
        debug!("Queue rebuilt: {:?}", self.order());
    }

    /// Move to the next entry
    pub fn advance(&mut self, is_live: impl Fn(CombatantId) -> bool) -> Advance {
        let next = match self.phase {
            SchedulerPhase::Idle => return Advance::Idle,
            SchedulerPhase::RoundStart => 0,
            SchedulerPhase::ActorTurn(i) => i + 1,
        };

        let Some(entry) = self.entries.get(next) else {
            return Advance::RoundComplete;
        };
        self.phase = SchedulerPhase::ActorTurn(next);

        if is_live(entry.combatant) {
            Advance::Actor(entry.combatant)
        } else {
            Advance::Stale(entry.combatant)
        }
    }

    /// Stop scheduling; used once the encounter ends
    pub fn stop(&mut self) {
        self.phase = SchedulerPhase::Idle;
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Times the queue was rebuilt mid-round
    pub fn rebuilds(&self) -> u32 {
        self.rebuilds
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn order(&self) -> Vec<CombatantId> {
        self.entries.iter().map(|e| e.combatant).collect()
    }

    /// Combatant whose turn it currently is
    pub fn current(&self) -> Option<CombatantId> {
        match self.phase {
            SchedulerPhase::ActorTurn(i) => self.entries.get(i).map(|e| e.combatant),
            _ => None,
        }
    }
}

fn roll_sorted<'a, R, I>(living: I, jitter: i32, rng: &mut R) -> Vec<QueueEntry>
where
    R: Rng + ?Sized,
    I: IntoIterator<Item = &'a Combatant>,
{
    let mut entries: Vec<QueueEntry> = living
        .into_iter()
        .filter(|c| c.is_alive())
        .map(|c| QueueEntry::roll(c, jitter, rng))
        .collect();
    // Stable sort keeps roster order on ties
    entries.sort_by(|a, b| b.rolled_init.cmp(&a.rolled_init));
    entries
}
