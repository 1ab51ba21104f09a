//! The async encounter runner end to end

use std::path::Path;
use std::sync::Arc;

use crate::harness::{EncounterBuilder, ScriptedController};
use cryptcombat::catalog::Catalog;
use cryptcombat::combat::{DiceSpec, EncounterState, Faction, PlayerAction};
use cryptcombat::handoff::{CombatHandoff, CombatResult};
use cryptcombat::party::AutoPilot;
use cryptcombat::timers::{NoPacing, Pause, RecordingPacer};
use cryptcombat::{Config, EncounterRunner};

#[tokio::test]
async fn test_runner_paces_every_step() {
    let enc = EncounterBuilder::new(41)
        .member("Hero", Faction::Player, 40, |c| {
            c.initiative = 10;
            c.basic_attack = DiceSpec::new(3, 6);
        })
        .enemy("cultist")
        .build();

    let mut runner = EncounterRunner::new(enc.session, RecordingPacer::new());
    let result = runner
        .run(&mut ScriptedController::default())
        .await
        .expect("runner finishes");
    assert_eq!(result.outcome, EncounterState::Victory);

    let pauses = runner.pacer().pauses().await;
    assert_eq!(pauses.first(), Some(&Pause::Turn));
    assert!(pauses.contains(&Pause::Action));
    let rounds = pauses.iter().filter(|p| **p == Pause::Turn).count() as u32;
    assert_eq!(rounds, result.rounds);
}

#[tokio::test]
async fn test_runner_honors_scripted_flee() {
    let enc = EncounterBuilder::new(42)
        .member("Hero", Faction::Player, 30, |c| c.initiative = 10)
        .enemy("pit_butcher")
        .build();

    let mut runner = EncounterRunner::new(enc.session, NoPacing);
    let mut controller = ScriptedController::new([PlayerAction::Defend, PlayerAction::Flee]);
    let result = runner.run(&mut controller).await.expect("runner finishes");

    assert_eq!(result.outcome, EncounterState::Fled);
    assert_eq!(controller.remaining(), 0);
    assert_eq!(controller.played.len(), 2);
    assert!(result.flee_summary.is_some());
}

#[tokio::test]
async fn test_demo_handoff_round_trip() {
    let path = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/data/handoff.json"));
    let handoff = CombatHandoff::load(path).expect("demo handoff loads");
    let config = Config {
        seed: Some(43),
        ..Config::default()
    };
    let catalog = Arc::new(Catalog::builtin().expect("built-in catalog loads"));
    let session = config.session(&handoff, catalog).expect("session builds");
    assert_eq!(session.encounter_id(), "astral_sanctum");
    assert_eq!(session.depth(), 7);

    let mut runner = EncounterRunner::new(session, NoPacing);
    let mut autopilot = ScriptedController::default().with_fallback(AutoPilot::new(Some(0.25)));
    let result = runner.run(&mut autopilot).await.expect("runner finishes");
    assert!(result.outcome.is_terminal());
    assert_eq!(result.members.len(), 2);
    assert_eq!(result.members[0].name, "Cryptonaut");
    assert!(result.ended_at >= result.started_at);

    let inventory = result.inventory.as_ref().expect("inventory carried through");
    assert!(inventory.count("herbal_tonic") >= 3);
    if result.outcome != EncounterState::Victory {
        assert!(result.loot_drops.is_empty());
    }

    let json = serde_json::to_string(&result).expect("result serializes");
    let back: CombatResult = serde_json::from_str(&json).expect("result parses");
    assert_eq!(back.outcome, result.outcome);
    assert_eq!(back.log.len(), result.log.len());
}
