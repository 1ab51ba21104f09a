//! Party members: hydration, progression and automatic control
//!
//! Handles the party side of an encounter:
//! - Build combatants from the exploration layer's snapshot
//! - Award XP and apply level-up stat growth
//! - Scale basic attacks with level
//! - `PartyController` decides player/companion turns; `AutoPilot` is the
//!   built-in one used by the CLI and tests

use rand::Rng;
use tracing::info;

use crate::catalog::Catalog;
use crate::combat::{Combatant, CombatantId, Faction, PlayerAction, Resource, RulesConfig};
use crate::combat::CombatSession;
use crate::handoff::PartyMemberSnapshot;

const BASE_XP_TO_LEVEL: u64 = 50;
/// Percent of base HP and sanity gained per level
const GROWTH_PERCENT_PER_LEVEL: i64 = 15;

/// XP needed to leave `level`: `floor(50 * 1.2^level)`. Saturates at the level cap.
pub fn xp_to_next_level(level: u32, max_level: u32) -> u32 {
    if level >= max_level {
        return u32::MAX;
    }
    // Exact integer form of 1.2^level; u64 holds it well past any sane cap
    let (num, den) = (6u64.saturating_pow(level), 5u64.saturating_pow(level));
    u32::try_from(BASE_XP_TO_LEVEL.saturating_mul(num) / den).unwrap_or(u32::MAX)
}

/// Build a party combatant from its snapshot
pub fn hydrate(snapshot: &PartyMemberSnapshot, rules: &RulesConfig) -> Combatant {
    let mut c = Combatant::new(
        &snapshot.name,
        snapshot.slot.faction(),
        snapshot.max_hp,
        snapshot.max_sanity,
    );
    c.template_id = snapshot.name.to_lowercase();
    c.hp = snapshot.hp.clamp(0, c.max_hp);
    c.sanity = snapshot.sanity.clamp(0, c.max_sanity);
    c.base_hp = snapshot.base_hp.unwrap_or(c.max_hp).max(1);
    c.base_sanity = snapshot.base_sanity.unwrap_or(c.max_sanity).max(0);
    c.defense = snapshot.defense;
    c.initiative = snapshot.initiative;
    c.level = snapshot.level.min(rules.max_level);
    c.xp = snapshot.xp;
    c.xp_to_next_level = snapshot
        .xp_to_next_level
        .filter(|n| *n > 0)
        .unwrap_or_else(|| xp_to_next_level(c.level, rules.max_level));
    c.basic_attack = snapshot.basic_attack;
    c.abilities = snapshot.abilities.clone();
    if !snapshot.alive || c.hp == 0 {
        c.mark_dead();
    }
    c
}

/// Recompute maxima for the current level and heal by the increase
fn apply_level_growth(c: &mut Combatant) {
    let percent = 100 + GROWTH_PERCENT_PER_LEVEL * c.level as i64;
    let scale = |base: i32| (base as i64 * percent / 100) as i32;
    let new_max_hp = scale(c.base_hp).max(1);
    let new_max_sanity = scale(c.base_sanity).max(0);

    let hp_gain = new_max_hp - c.max_hp;
    let sanity_gain = new_max_sanity - c.max_sanity;
    c.max_hp = new_max_hp;
    c.max_sanity = new_max_sanity;
    c.hp = (c.hp + hp_gain).clamp(0, c.max_hp);
    c.sanity = (c.sanity + sanity_gain).clamp(0, c.max_sanity);
}

/// Add XP and level up as many times as it covers.
///
/// Returns each level reached, in order.
pub fn award_xp(c: &mut Combatant, amount: u32, rules: &RulesConfig) -> Vec<u32> {
    let mut reached = Vec::new();
    if c.level >= rules.max_level {
        return reached;
    }
    if c.xp_to_next_level == 0 {
        c.xp_to_next_level = xp_to_next_level(c.level, rules.max_level);
    }

    c.xp = c.xp.saturating_add(amount);
    while c.level < rules.max_level && c.xp >= c.xp_to_next_level {
        c.xp -= c.xp_to_next_level;
        c.level += 1;
        apply_level_growth(c);
        c.xp_to_next_level = xp_to_next_level(c.level, rules.max_level);
        info!(
            "{} reached level {} (max HP {}, max sanity {})",
            c.name, c.level, c.max_hp, c.max_sanity
        );
        reached.push(c.level);
    }
    reached
}

/// Extra basic-attack dice: one at level 3, another at level 6
pub fn extra_attack_dice(level: u32) -> u32 {
    u32::from(level >= 3) + u32::from(level >= 6)
}

/// Party basic attack roll before buffs and mitigation
pub fn scaled_attack_roll<R: Rng + ?Sized>(c: &Combatant, rng: &mut R) -> i32 {
    c.basic_attack.roll_with_extra(extra_attack_dice(c.level), rng) + 2 * c.level as i32
}

/// Source of player and companion decisions
pub trait PartyController {
    fn choose_action(&mut self, actor: CombatantId, session: &CombatSession) -> PlayerAction;
}

/// Simple built-in party tactics.
///
/// - Flee when the player's HP ratio drops below `flee_below`
/// - Heal a badly hurt ally with a healing ability when one is known
/// - Defend when sanity runs low
/// - Otherwise attack the weakest enemy
#[derive(Debug, Clone, Default)]
pub struct AutoPilot {
    pub flee_below: Option<f64>,
}

impl AutoPilot {
    pub fn new(flee_below: Option<f64>) -> Self {
        Self { flee_below }
    }

    fn healing_ability<'a>(actor: &'a Combatant, catalog: &Catalog) -> Option<&'a str> {
        actor
            .abilities
            .iter()
            .find(|id| catalog.ability(id).is_some_and(|a| a.heals()))
            .map(String::as_str)
    }
}

impl PartyController for AutoPilot {
    fn choose_action(&mut self, actor: CombatantId, session: &CombatSession) -> PlayerAction {
        let roster = session.roster();
        let Some(me) = roster.get(actor) else {
            return PlayerAction::Defend;
        };

        if let (Some(limit), Some(player)) = (self.flee_below, roster.player()) {
            if player.hp_ratio() < limit {
                return PlayerAction::Flee;
            }
        }

        let low = session.rules().low_hp_threshold;
        if let Some(heal) = Self::healing_ability(me, session.catalog()) {
            let hurt = roster
                .living_allies_of(me.faction)
                .filter(|c| c.faction.is_party_member() && c.hp_ratio() < low)
                .min_by(|a, b| a.hp_ratio().total_cmp(&b.hp_ratio()));
            if let Some(hurt) = hurt {
                return PlayerAction::Ability {
                    ability_id: heal.to_string(),
                    target: Some(hurt.id),
                };
            }
        }

        if me.max_sanity > 0 && me.resource(Resource::Sanity) * 4 < me.max_sanity {
            return PlayerAction::Defend;
        }

        roster
            .living_in(Faction::Enemy)
            .min_by_key(|c| c.hp)
            .map_or(PlayerAction::Defend, |c| PlayerAction::Attack { target: c.id })
    }
}
