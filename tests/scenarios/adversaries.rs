//! Enemy behavior, incapacitation and summons

use crate::harness::EncounterBuilder;
use cryptcombat::combat::{EffectType, EventKind, Faction, PlayerAction, SkipReason, Step};

#[test]
fn test_boss_summons_on_first_turn() {
    for seed in 0..10 {
        let mut enc = EncounterBuilder::new(seed)
            .hero("Hero", 60)
            .enemy_at("astral_summoner", 5)
            .build();
        let boss = enc.enemies[0];

        assert!(matches!(enc.session.advance(), Step::RoundStarted { round: 1 }));
        match enc.session.advance() {
            Step::Acted { actor, report } => {
                assert_eq!(actor, boss);
                assert_eq!(report.action, "litany_of_the_spawned", "seed {}", seed);
                assert!(report
                    .results
                    .iter()
                    .all(|r| r.effect == EffectType::Summon && r.success));
            }
            other => panic!("seed {}: expected the boss to act, got {:?}", seed, other),
        }

        let minions: Vec<_> = enc
            .session
            .roster()
            .living_in(Faction::Enemy)
            .filter(|c| c.minion_of == Some(boss))
            .collect();
        assert!((1..=3).contains(&minions.len()), "seed {}", seed);
        assert!(minions.iter().all(|c| c.template_id == "astral_creeper"));
    }
}

#[test]
fn test_boss_does_not_resummon_while_minions_live() {
    let mut enc = EncounterBuilder::new(31)
        .hero("Hero", 200)
        .enemy_at("astral_summoner", 5)
        .build();
    let boss = enc.enemies[0];

    let mut litanies = 0;
    for _ in 0..3 {
        let (actor, steps) = enc.until_input();
        for step in steps {
            if let Step::Acted { actor, report } = step {
                if actor == boss && report.action == "litany_of_the_spawned" {
                    litanies += 1;
                }
            }
        }
        enc.session
            .submit(actor.expect("hero turn"), PlayerAction::Defend)
            .expect("defend accepted");
    }
    assert_eq!(litanies, 1);
}

#[test]
fn test_stunned_enemy_loses_turn_without_rebuild() {
    let mut enc = EncounterBuilder::new(32)
        .hero("Hero", 30)
        .enemy_at("cultist", 10)
        .build();
    let hero = enc.party[0];
    let cultist = enc.enemies[0];
    {
        let catalog = enc.session.catalog_handle();
        let stun = catalog.status("stun").expect("stun in catalog");
        enc.combatant_mut(cultist).statuses.apply(stun, 1, 0, None);
    }

    assert!(matches!(enc.session.advance(), Step::RoundStarted { .. }));
    let rebuilds = enc.session.queue().rebuilds();
    assert_eq!(
        enc.session.advance(),
        Step::Skipped {
            actor: cultist,
            reason: SkipReason::Stunned
        }
    );
    assert_eq!(enc.session.queue().rebuilds(), rebuilds);
    assert_eq!(enc.session.advance(), Step::AwaitingInput { actor: hero });
    assert_eq!(enc.combatant(hero).hp, 30);
    assert!(!enc.combatant(cultist).statuses.has("stun"));
}

#[test]
fn test_summoned_guardian_fades() {
    let mut enc = EncounterBuilder::new(33)
        .member("Hero", Faction::Player, 200, |c| {
            c.initiative = 50;
            c.abilities = vec!["call_guardian".into()];
        })
        .enemy_at("flesh_golem", 0)
        .build();

    enc.act(PlayerAction::Ability {
        ability_id: "call_guardian".into(),
        target: None,
    });
    let guardian = enc
        .session
        .roster()
        .iter()
        .find(|c| c.faction == Faction::Summon)
        .map(|c| c.id)
        .expect("guardian summoned");
    let duration = enc
        .combatant(guardian)
        .summon
        .as_ref()
        .map(|s| s.remaining_duration)
        .expect("summon state");

    for _ in 0..=duration {
        enc.act(PlayerAction::Defend);
    }
    assert!(!enc.combatant(guardian).alive);
    assert!(enc
        .session
        .log()
        .events()
        .iter()
        .any(|e| matches!(e.kind, EventKind::Despawned { combatant } if combatant == guardian)));
}
