//! Ability resolution inside a running encounter

use std::collections::HashSet;

use crate::harness::{Encounter, EncounterBuilder};
use cryptcombat::combat::abilities::resolve;
use cryptcombat::combat::{EffectType, Faction, PlayerAction};
use serde_json::json;

fn jab(skip_level_bonus: bool) -> serde_json::Value {
    json!({
        "id": "jab",
        "name": "Jab",
        "base_effects": [{
            "type": "damage",
            "damage_type": "physical",
            "target_scope": "enemy",
            "magnitude": "1d6",
            "chance": 1.0,
            "skip_level_bonus": skip_level_bonus
        }]
    })
}

/// Level-1 hero with the turn, facing one priestess (defense 2)
fn jab_encounter(seed: u64, skip_level_bonus: bool) -> Encounter {
    EncounterBuilder::new(seed)
        .ability(jab(skip_level_bonus))
        .member("Hero", Faction::Player, 30, |c| {
            c.level = 1;
            c.initiative = 10;
        })
        .enemy("priestess")
        .build()
}

/// Damage actually applied by one jab
fn jab_once(enc: &mut Encounter) -> i32 {
    let priestess = enc.enemies[0];
    let before = enc.combatant(priestess).hp;
    let (actor, _) = enc.until_input();
    let actor = actor.expect("hero turn");
    let report = enc
        .session
        .submit(
            actor,
            PlayerAction::Ability {
                ability_id: "jab".into(),
                target: Some(priestess),
            },
        )
        .expect("jab resolves");
    let applied = report.results[0].amount.expect("damage amount");
    assert_eq!(before - enc.combatant(priestess).hp, applied);
    applied
}

#[test]
fn test_physical_damage_mitigated_by_defense() {
    let mut seen = HashSet::new();
    for seed in 0..80 {
        let mut enc = jab_encounter(seed, true);
        let applied = jab_once(&mut enc);
        assert!((0..=4).contains(&applied), "seed {}: applied {}", seed, applied);
        seen.insert(applied);
    }
    assert!(seen.contains(&0));
    assert!(seen.contains(&4));
}

#[test]
fn test_level_bonus_offsets_defense() {
    // ceil(1 * 1.5) = 2 cancels the priestess's defense
    let mut seen = HashSet::new();
    for seed in 0..80 {
        let mut enc = jab_encounter(seed, false);
        let applied = jab_once(&mut enc);
        assert!((1..=6).contains(&applied), "seed {}: applied {}", seed, applied);
        seen.insert(applied);
    }
    assert!(seen.contains(&1));
    assert!(seen.contains(&6));
}

fn stun_attack_hits(level: u32) -> HashSet<cryptcombat::combat::CombatantId> {
    let mut enc = EncounterBuilder::new(21)
        .member("Hero", Faction::Player, 30, |c| {
            c.level = level;
            c.initiative = 10;
            c.abilities = vec!["stun_attack".into()];
        })
        .enemy("cultist")
        .enemy("cultist")
        .enemy("cultist")
        .build();
    let first = enc.enemies[0];
    let (actor, _) = enc.until_input();
    let report = enc
        .session
        .submit(
            actor.expect("hero turn"),
            PlayerAction::Ability {
                ability_id: "shield_bash".into(),
                target: Some(first),
            },
        )
        .expect("alias resolves");
    assert_eq!(report.action, "shield_bash");
    report
        .results
        .iter()
        .filter(|r| r.effect == EffectType::Damage && r.success)
        .map(|r| r.target)
        .collect()
}

#[test]
fn test_low_level_hits_single_target() {
    let hits = stun_attack_hits(1);
    assert_eq!(hits.len(), 1);
}

#[test]
fn test_team_override_hits_every_enemy() {
    let hits = stun_attack_hits(3);
    assert_eq!(hits.len(), 3);
}

#[test]
fn test_heal_clamps_to_max() {
    let mut enc = EncounterBuilder::new(22)
        .member("Hero", Faction::Player, 30, |c| {
            c.initiative = 10;
            c.level = 3;
            c.hp = 28;
        })
        .companion("Lydia", 30)
        .enemy("cultist")
        .ability(json!({
            "id": "mend",
            "name": "Mend",
            "base_effects": [{
                "type": "heal", "resource": "hp", "target_scope": "ally",
                "magnitude": "2d6", "chance": 1.0
            }]
        }))
        .build();
    let hero = enc.party[0];

    let (actor, _) = enc.until_input();
    assert_eq!(actor, Some(hero));
    let report = enc
        .session
        .submit(
            hero,
            PlayerAction::Ability {
                ability_id: "mend".into(),
                target: Some(hero),
            },
        )
        .expect("heal resolves");
    assert_eq!(report.results[0].amount, Some(2));
    assert_eq!(enc.combatant(hero).hp, 30);
}

#[test]
fn test_barrier_absorbs_enemy_blow() {
    let mut enc = EncounterBuilder::new(23)
        .ability(json!({
            "id": "bulwark",
            "name": "Bulwark",
            "base_effects": [{
                "type": "barrier", "duration": 1, "target_scope": "self",
                "magnitude": "0", "chance": 1.0
            }]
        }))
        .member("Hero", Faction::Player, 30, |c| c.initiative = 10)
        .enemy_at("priestess", 5)
        .build();
    let hero = enc.party[0];

    enc.act(PlayerAction::Ability {
        ability_id: "bulwark".into(),
        target: None,
    });
    let (actor, _) = enc.until_input();
    assert_eq!(actor, Some(hero));
    assert_eq!(enc.combatant(hero).hp, 30);
    assert_eq!(enc.combatant(hero).sanity, 20);
}

#[test]
fn test_team_override_leaves_self_effects_on_caster() {
    let mut enc = EncounterBuilder::new(24)
        .ability(json!({
            "id": "battle_cry",
            "name": "Battle Cry",
            "base_effects": [
                { "type": "buff", "status_id": "attack_up", "target_scope": "self", "chance": 1.0 },
                { "type": "damage", "target_scope": "enemy", "magnitude": 1, "chance": 1.0 }
            ],
            "level_rules": [{ "min_level": 3, "target_override": "enemy_team" }]
        }))
        .member("Hero", Faction::Player, 30, |c| c.level = 3)
        .companion("Lydia", 30)
        .enemy("cultist")
        .enemy("cultist")
        .build();
    let hero = enc.party[0];
    let lydia = enc.party[1];

    let results = resolve(&mut enc.session, "battle_cry", hero, &[enc.enemies[0]])
        .expect("battle cry resolves");
    let buffed: Vec<_> = results
        .iter()
        .filter(|r| r.effect == EffectType::Buff)
        .map(|r| r.target)
        .collect();
    let struck: HashSet<_> = results
        .iter()
        .filter(|r| r.effect == EffectType::Damage)
        .map(|r| r.target)
        .collect();

    assert_eq!(buffed, vec![hero]);
    assert_eq!(struck, enc.enemies.iter().copied().collect::<HashSet<_>>());
    assert!(enc.combatant(hero).statuses.has("attack_up"));
    assert!(!enc.combatant(lydia).statuses.has("attack_up"));
}

#[test]
fn test_ally_team_includes_summons() {
    let mut enc = EncounterBuilder::new(25)
        .ability(json!({
            "id": "rally",
            "name": "Rally",
            "base_effects": [{
                "type": "heal", "resource": "hp", "target_scope": "ally_team",
                "magnitude": "3", "chance": 1.0
            }]
        }))
        .hero("Hero", 30)
        .companion("Lydia", 30)
        .enemy("cultist")
        .build();
    let hero = enc.party[0];
    let lydia = enc.party[1];
    let cultist = enc.enemies[0];
    let guardian = enc
        .session
        .spawn_summon("spirit_guardian", Some(hero))
        .expect("guardian spawns");
    for id in [hero, lydia, guardian, cultist] {
        enc.combatant_mut(id).hp -= 5;
    }

    let results = resolve(&mut enc.session, "rally", hero, &[]).expect("rally resolves");
    let healed: HashSet<_> = results.iter().filter(|r| r.success).map(|r| r.target).collect();
    assert_eq!(healed, HashSet::from([hero, lydia, guardian]));
    assert_eq!(enc.combatant(guardian).hp, enc.combatant(guardian).max_hp - 2);
    assert_eq!(enc.combatant(cultist).hp, enc.combatant(cultist).max_hp - 5);
}
