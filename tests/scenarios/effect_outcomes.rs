//! Per-effect outcomes reported by the ability resolver

use crate::harness::{Encounter, EncounterBuilder};
use cryptcombat::combat::abilities::{reason, resolve};
use cryptcombat::combat::{AbilityError, CombatantId, DamageType, EffectResult, Faction, Magnitude};
use cryptcombat::handoff::Inventory;
use serde_json::json;

/// One-effect ability that always lands
fn certain(id: &str, effect: serde_json::Value) -> serde_json::Value {
    let mut effect = effect;
    effect["chance"] = json!(1.0);
    json!({ "id": id, "name": id, "base_effects": [effect] })
}

fn cast(
    enc: &mut Encounter,
    id: &str,
    caster: CombatantId,
    targets: &[CombatantId],
) -> EffectResult {
    let mut results = resolve(&mut enc.session, id, caster, targets).expect("ability resolves");
    assert_eq!(results.len(), 1, "{} resolves one effect", id);
    results.remove(0)
}

fn apply_status(enc: &mut Encounter, target: CombatantId, status_id: &str) {
    let catalog = enc.session.catalog_handle();
    let def = catalog.status(status_id).expect("status in catalog");
    enc.combatant_mut(target).statuses.apply(def, 3, 2, None);
}

#[test]
fn test_unknown_status_fails_without_touching_target() {
    let mut enc = EncounterBuilder::new(51)
        .ability(certain(
            "hex",
            json!({ "type": "status", "status_id": "no_such_status", "target_scope": "enemy" }),
        ))
        .hero("Hero", 30)
        .enemy("cultist")
        .build();
    let hero = enc.party[0];
    let cultist = enc.enemies[0];
    let hp = enc.combatant(cultist).hp;

    let result = cast(&mut enc, "hex", hero, &[cultist]);
    assert_eq!(result.target, cultist);
    assert!(!result.success);
    assert_eq!(result.reason.as_deref(), Some(reason::UNKNOWN_STATUS));
    assert!(enc.combatant(cultist).statuses.is_empty());
    assert_eq!(enc.combatant(cultist).hp, hp);
}

#[test]
fn test_enemy_cannot_use_party_reactions() {
    let mut enc = EncounterBuilder::new(52)
        .hero("Hero", 30)
        .enemy("cultist")
        .build();
    let cultist = enc.enemies[0];

    let err = resolve(&mut enc.session, "parry", cultist, &[]).unwrap_err();
    assert_eq!(
        err,
        AbilityError::RestrictedCaster {
            ability: "parry".into(),
            caster: cultist
        }
    );
    let err = resolve(&mut enc.session, "counter", cultist, &[]).unwrap_err();
    assert!(matches!(
        err,
        AbilityError::RestrictedCaster { ability, .. } if ability == "counter_attack"
    ));
    let hero = enc.party[0];
    assert!(resolve(&mut enc.session, "parry", hero, &[]).is_ok());
}

#[test]
fn test_cleanse_removes_named_status_once() {
    let mut enc = EncounterBuilder::new(53)
        .ability(certain(
            "purge",
            json!({ "type": "cleanse", "status_id": "poison", "target_scope": "self" }),
        ))
        .hero("Hero", 30)
        .enemy("cultist")
        .build();
    let hero = enc.party[0];
    apply_status(&mut enc, hero, "poison");
    apply_status(&mut enc, hero, "dread");

    let first = cast(&mut enc, "purge", hero, &[]);
    assert!(first.success);
    assert_eq!(first.amount, Some(1));
    assert!(!enc.combatant(hero).statuses.has("poison"));
    assert!(enc.combatant(hero).statuses.has("dread"));

    let second = cast(&mut enc, "purge", hero, &[]);
    assert!(!second.success);
    assert_eq!(second.reason.as_deref(), Some(reason::NOTHING_TO_CLEANSE));
}

#[test]
fn test_cure_all_clears_chosen_ally() {
    let mut enc = EncounterBuilder::new(54)
        .ability(certain("restore", json!({ "type": "cure_all", "target_scope": "ally" })))
        .hero("Hero", 30)
        .companion("Lydia", 30)
        .enemy("cultist")
        .build();
    let hero = enc.party[0];
    let lydia = enc.party[1];
    apply_status(&mut enc, lydia, "poison");
    apply_status(&mut enc, lydia, "dread");
    apply_status(&mut enc, hero, "poison");

    let result = cast(&mut enc, "restore", hero, &[lydia]);
    assert_eq!(result.target, lydia);
    assert!(result.success);
    assert_eq!(result.amount, Some(2));
    assert!(enc.combatant(lydia).statuses.is_empty());
    assert!(enc.combatant(hero).statuses.has("poison"));

    // nothing left is still a success
    let again = cast(&mut enc, "restore", hero, &[lydia]);
    assert!(again.success);
    assert_eq!(again.amount, Some(0));
}

#[test]
fn test_grant_item_needs_an_inventory() {
    let forage = || {
        certain(
            "forage",
            json!({
                "type": "grant_item", "item_id": "herbal_tonic", "quantity": 2,
                "target_scope": "self"
            }),
        )
    };

    let mut bare = EncounterBuilder::new(55)
        .ability(forage())
        .hero("Hero", 30)
        .enemy("cultist")
        .build();
    let hero = bare.party[0];
    let result = cast(&mut bare, "forage", hero, &[]);
    assert!(!result.success);
    assert_eq!(result.reason.as_deref(), Some(reason::INVENTORY_UNAVAILABLE));

    let mut stocked = EncounterBuilder::new(55)
        .ability(forage())
        .ability(certain("fumble", json!({ "type": "grant_item", "target_scope": "self" })))
        .inventory(Inventory::new())
        .hero("Hero", 30)
        .enemy("cultist")
        .build();
    let hero = stocked.party[0];
    let result = cast(&mut stocked, "forage", hero, &[]);
    assert!(result.success);
    assert_eq!(result.amount, Some(2));
    let inventory = stocked.session.inventory().expect("inventory attached");
    assert_eq!(inventory.count("herbal_tonic"), 2);

    let result = cast(&mut stocked, "fumble", hero, &[]);
    assert!(!result.success);
    assert_eq!(result.reason.as_deref(), Some(reason::ITEM_ADD_FAILED));
}

#[test]
fn test_weapon_coating_defaults() {
    let mut enc = EncounterBuilder::new(56)
        .ability(certain("venom", json!({ "type": "weapon_coating", "target_scope": "self" })))
        .ability(certain(
            "cinders",
            json!({
                "type": "weapon_coating", "coating_type": "fire", "duration": 5,
                "target_scope": "self", "magnitude": "2d4"
            }),
        ))
        .hero("Hero", 30)
        .enemy("cultist")
        .build();
    let hero = enc.party[0];

    let result = cast(&mut enc, "venom", hero, &[]);
    assert!(result.success);
    assert_eq!(result.amount, Some(3));
    let coating = enc.combatant(hero).flags.coating.clone().expect("coated");
    assert_eq!(coating.damage_type, DamageType::Poison);
    assert_eq!(coating.damage_per_hit, Magnitude::from("1d6"));
    assert_eq!(coating.remaining, 3);

    cast(&mut enc, "cinders", hero, &[]);
    let coating = enc.combatant(hero).flags.coating.clone().expect("coated");
    assert_eq!(coating.damage_type, DamageType::Fire);
    assert_eq!(coating.damage_per_hit, Magnitude::from("2d4"));
    assert_eq!(coating.remaining, 5);
}

#[test]
fn test_crowd_control_lasts_two_turns_by_default() {
    let mut enc = EncounterBuilder::new(57)
        .ability(certain("snare", json!({ "type": "immobilize", "target_scope": "enemy" })))
        .ability(certain("daze", json!({ "type": "confusion", "target_scope": "enemy" })))
        .hero("Hero", 30)
        .enemy("cultist")
        .enemy("cultist")
        .build();
    let hero = enc.party[0];
    let (first, second) = (enc.enemies[0], enc.enemies[1]);

    let snared = cast(&mut enc, "snare", hero, &[second]);
    assert_eq!(snared.target, second);
    assert_eq!(snared.amount, Some(2));
    let dazed = cast(&mut enc, "daze", hero, &[second]);
    assert_eq!(dazed.amount, Some(2));

    assert_eq!(enc.combatant(second).flags.immobilized, Some(2));
    assert_eq!(enc.combatant(second).flags.confusion, Some(2));
    assert_eq!(enc.combatant(first).flags.immobilized, None);
    assert_eq!(enc.combatant(first).flags.confusion, None);
}

#[test]
fn test_rest_party_restores_living_members_only() {
    let mut enc = EncounterBuilder::new(58)
        .ability(certain(
            "camp",
            json!({ "type": "meta", "meta_action": "rest_party", "target_scope": "self" }),
        ))
        .member("Hero", Faction::Player, 30, |c| {
            c.hp = 10;
            c.sanity = 5;
        })
        .member("Lydia", Faction::Companion, 30, |c| c.hp = 20)
        .enemy("cultist")
        .build();
    let hero = enc.party[0];
    let lydia = enc.party[1];
    let cultist = enc.enemies[0];
    apply_status(&mut enc, hero, "poison");
    let cultist_hp = enc.combatant(cultist).hp - 5;
    enc.combatant_mut(cultist).hp = cultist_hp;

    let result = cast(&mut enc, "camp", hero, &[]);
    assert!(result.success);
    assert_eq!(result.amount, Some(20 + 15 + 10));

    for id in [hero, lydia] {
        let c = enc.combatant(id);
        assert_eq!(c.hp, c.max_hp);
        assert_eq!(c.sanity, c.max_sanity);
        assert!(c.statuses.is_empty());
    }
    assert_eq!(enc.combatant(cultist).hp, cultist_hp);
}
