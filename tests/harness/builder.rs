//! Encounter assembly for scenario tests

#![allow(dead_code)]

use std::sync::Arc;

use cryptcombat::catalog::Catalog;
use cryptcombat::combat::{
    AbilityDefinition, CombatSession, Combatant, CombatantId, DiceSpec, EncounterState, Faction,
    PlayerAction, RulesConfig, Step,
};
use cryptcombat::handoff::Inventory;
use cryptcombat::party::PartyController;

/// Safety net so a broken scenario fails instead of spinning
const MAX_STEPS: usize = 2_000;

/// Builds a session step by step
pub struct EncounterBuilder {
    catalog: Catalog,
    rules: RulesConfig,
    seed: u64,
    members: Vec<Combatant>,
    enemies: Vec<(String, Option<i32>)>,
    inventory: Option<Inventory>,
}

impl EncounterBuilder {
    /// Built-in catalog, no initiative jitter, fixed seed
    pub fn new(seed: u64) -> Self {
        Self {
            catalog: Catalog::builtin().expect("built-in catalog loads"),
            rules: RulesConfig {
                initiative_jitter: 0,
                ..RulesConfig::default()
            },
            seed,
            members: Vec::new(),
            enemies: Vec::new(),
            inventory: None,
        }
    }

    pub fn rules(mut self, f: impl FnOnce(&mut RulesConfig)) -> Self {
        f(&mut self.rules);
        self
    }

    /// Add an extra ability definition to the catalog
    pub fn ability(mut self, json: serde_json::Value) -> Self {
        let def: AbilityDefinition = serde_json::from_value(json).expect("ability json");
        self.catalog.insert_ability(def).expect("insert ability");
        self
    }

    pub fn inventory(mut self, inventory: Inventory) -> Self {
        self.inventory = Some(inventory);
        self
    }

    /// Player with a 1d4 attack, no defense and initiative 0
    pub fn hero(self, name: &str, hp: i32) -> Self {
        self.member(name, Faction::Player, hp, |_| {})
    }

    pub fn companion(self, name: &str, hp: i32) -> Self {
        self.member(name, Faction::Companion, hp, |_| {})
    }

    /// Party member with custom tweaks
    pub fn member(
        mut self,
        name: &str,
        faction: Faction,
        hp: i32,
        tweak: impl FnOnce(&mut Combatant),
    ) -> Self {
        let mut c = Combatant::new(name, faction, hp, 20);
        c.basic_attack = DiceSpec::new(1, 4);
        c.xp_to_next_level = 50;
        tweak(&mut c);
        self.members.push(c);
        self
    }

    /// Enemy from the built-in catalog
    pub fn enemy(mut self, template_id: &str) -> Self {
        self.enemies.push((template_id.to_string(), None));
        self
    }

    /// Enemy with its initiative pinned
    pub fn enemy_at(mut self, template_id: &str, initiative: i32) -> Self {
        self.enemies.push((template_id.to_string(), Some(initiative)));
        self
    }

    pub fn build(self) -> Encounter {
        let mut session = CombatSession::new(Arc::new(self.catalog), self.rules, Some(self.seed));
        if let Some(inventory) = self.inventory {
            session = session.with_inventory(inventory);
        }
        let mut party = Vec::new();
        for member in self.members {
            party.push(session.add_combatant(member));
        }
        let mut enemies = Vec::new();
        for (template_id, initiative) in self.enemies {
            let id = session.spawn_enemy(&template_id, None).expect("enemy spawns");
            if let Some(initiative) = initiative {
                if let Some(c) = session.roster_mut().get_mut(id) {
                    c.initiative = initiative;
                }
            }
            enemies.push(id);
        }
        Encounter {
            session,
            party,
            enemies,
        }
    }
}

/// A built session plus the ids it was built with
pub struct Encounter {
    pub session: CombatSession,
    /// Party ids in the order they were added
    pub party: Vec<CombatantId>,
    /// Enemy ids in the order they were added
    pub enemies: Vec<CombatantId>,
}

impl Encounter {
    pub fn combatant(&self, id: CombatantId) -> &Combatant {
        self.session.roster().get(id).expect("combatant exists")
    }

    pub fn combatant_mut(&mut self, id: CombatantId) -> &mut Combatant {
        self.session.roster_mut().get_mut(id).expect("combatant exists")
    }

    /// Look a combatant up by display name
    pub fn by_name(&self, name: &str) -> CombatantId {
        self.session
            .roster()
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.id)
            .expect("combatant with that name")
    }

    /// Advance until some party member holds the turn, returning every step seen
    pub fn until_input(&mut self) -> (Option<CombatantId>, Vec<Step>) {
        let mut steps = Vec::new();
        for _ in 0..MAX_STEPS {
            let step = self.session.advance();
            match step {
                Step::AwaitingInput { actor } => return (Some(actor), steps),
                Step::Ended { .. } => {
                    steps.push(step);
                    return (None, steps);
                }
                other => steps.push(other),
            }
        }
        panic!("no input requested within {} steps", MAX_STEPS);
    }

    /// Advance and submit a single action for whoever holds the turn
    pub fn act(&mut self, action: PlayerAction) -> CombatantId {
        let (actor, _) = self.until_input();
        let actor = actor.expect("encounter still running");
        self.session.submit(actor, action).expect("action accepted");
        actor
    }

    /// Play to a terminal state with the given controller
    pub fn run_to_end<C: PartyController>(&mut self, controller: &mut C) -> EncounterState {
        for _ in 0..MAX_STEPS {
            match self.session.advance() {
                Step::Ended { outcome } => return outcome,
                Step::AwaitingInput { actor } => {
                    let action = controller.choose_action(actor, &self.session);
                    if self.session.submit(actor, action).is_err() {
                        self.session.submit(actor, PlayerAction::Defend).expect("defend accepted");
                    }
                }
                _ => {}
            }
        }
        panic!("encounter did not end within {} steps", MAX_STEPS);
    }
}
