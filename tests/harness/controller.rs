//! Scripted party decisions

#![allow(dead_code)]

use std::collections::VecDeque;

use cryptcombat::combat::{CombatSession, CombatantId, PlayerAction};
use cryptcombat::party::{AutoPilot, PartyController};

/// Plays queued actions in order, then defers to an `AutoPilot`
#[derive(Debug, Default)]
pub struct ScriptedController {
    script: VecDeque<PlayerAction>,
    fallback: AutoPilot,
    /// Every (actor, action) handed out so far
    pub played: Vec<(CombatantId, PlayerAction)>,
}

impl ScriptedController {
    pub fn new(script: impl IntoIterator<Item = PlayerAction>) -> Self {
        Self {
            script: script.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_fallback(mut self, fallback: AutoPilot) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl PartyController for ScriptedController {
    fn choose_action(&mut self, actor: CombatantId, session: &CombatSession) -> PlayerAction {
        let action = self
            .script
            .pop_front()
            .unwrap_or_else(|| self.fallback.choose_action(actor, session));
        self.played.push((actor, action.clone()));
        action
    }
}
