//! Terminal states and resource bounds

use crate::harness::{EncounterBuilder, ScriptedController};
use cryptcombat::combat::{DiceSpec, EncounterState, Faction, PlayerAction, Step};
use cryptcombat::party::{AutoPilot, PartyController};

#[test]
fn test_victory_awards_catalog_xp() {
    let mut enc = EncounterBuilder::new(11)
        .member("Hero", Faction::Player, 40, |c| {
            c.initiative = 10;
            c.basic_attack = DiceSpec::new(3, 6);
        })
        .enemy("cultist")
        .build();

    let outcome = enc.run_to_end(&mut ScriptedController::default());
    assert_eq!(outcome, EncounterState::Victory);

    let result = enc.session.result().expect("terminal result");
    assert_eq!(result.outcome, EncounterState::Victory);
    assert_eq!(result.enemies_defeated.len(), 1);
    assert_eq!(result.enemies_defeated[0].template_id, "cultist");
    assert_eq!(result.xp_awarded, 20);
    assert_eq!(result.members[0].xp, 20);
    assert!(result.flee_summary.is_none());
}

#[test]
fn test_player_death_is_defeat() {
    let mut enc = EncounterBuilder::new(12)
        .hero("Hero", 1)
        .enemy_at("priestess", 10)
        .build();

    let outcome = enc.run_to_end(&mut ScriptedController::default());
    assert_eq!(outcome, EncounterState::Defeat);

    let result = enc.session.result().expect("terminal result");
    assert!(!result.members[0].alive);
    assert_eq!(result.members[0].hp, 0);
    assert_eq!(result.xp_awarded, 0);
    assert!(result.loot_drops.is_empty());
}

#[test]
fn test_flee_halves_resources() {
    let mut enc = EncounterBuilder::new(13)
        .member("Hero", Faction::Player, 30, |c| {
            c.initiative = 10;
            c.hp = 10;
            c.sanity = 8;
        })
        .enemy("cultist")
        .build();
    let hero = enc.party[0];

    let (actor, _) = enc.until_input();
    assert_eq!(actor, Some(hero));
    let report = enc.session.submit(hero, PlayerAction::Flee).expect("flee accepted");
    assert_eq!(report.action, "flee");

    assert_eq!(enc.session.state(), EncounterState::Fled);
    assert_eq!(enc.session.advance(), Step::Ended { outcome: EncounterState::Fled });
    let result = enc.session.result().expect("terminal result");
    assert_eq!((result.members[0].hp, result.members[0].sanity), (5, 4));
    let losses = result.flee_summary.expect("flee summary");
    assert_eq!((losses[0].hp_lost, losses[0].sanity_lost), (5, 4));
}

#[test]
fn test_enemy_at_one_hp_keeps_fight_going() {
    let mut enc = EncounterBuilder::new(14)
        .member("Hero", Faction::Player, 30, |c| c.initiative = 10)
        .enemy("cultist")
        .build();
    let cultist = enc.enemies[0];
    enc.combatant_mut(cultist).hp = 1;

    let (actor, _) = enc.until_input();
    assert!(actor.is_some());
    assert_eq!(enc.session.state(), EncounterState::Active);
    assert!(enc.combatant(cultist).is_alive());
}

#[test]
fn test_resources_stay_in_bounds() {
    for seed in 0..12 {
        let mut enc = EncounterBuilder::new(seed)
            .member("Hero", Faction::Player, 30, |c| c.abilities = vec!["stun_attack".into()])
            .member("Lydia", Faction::Companion, 25, |c| c.abilities = vec!["heal".into()])
            .enemy("rat_man")
            .enemy("mossleech")
            .enemy("drowned_acolyte")
            .build();
        let mut controller = ScriptedController::default().with_fallback(AutoPilot::new(Some(0.2)));

        let mut ended = false;
        for _ in 0..2_000 {
            let step = enc.session.advance();
            for c in enc.session.roster().iter() {
                assert!((0..=c.max_hp).contains(&c.hp), "seed {}: {} hp {}", seed, c.name, c.hp);
                assert!(
                    (0..=c.max_sanity).contains(&c.sanity),
                    "seed {}: {} sanity {}",
                    seed,
                    c.name,
                    c.sanity
                );
            }
            match step {
                Step::Ended { .. } => {
                    ended = true;
                    break;
                }
                Step::AwaitingInput { actor } => {
                    let action = controller.choose_action(actor, &enc.session);
                    if enc.session.submit(actor, action).is_err() {
                        enc.session.submit(actor, PlayerAction::Defend).expect("defend accepted");
                    }
                }
                _ => {}
            }
        }
        assert!(ended, "seed {} never ended", seed);
    }
}
