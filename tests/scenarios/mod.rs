//! Scenario Tests
//!
//! Whole-encounter scenarios covering:
//! - Outcomes: victory, defeat, fleeing and the HP/sanity bounds
//! - Abilities: defense mitigation, level scaling and team-wide overrides
//! - Effect outcomes: per-effect results and failure reasons from the resolver
//! - Adversaries: boss summon gating, stunned turns, summon expiry
//! - Runner: the async encounter runner over a handoff

pub mod abilities;
pub mod adversaries;
pub mod effect_outcomes;
pub mod outcomes;
pub mod runner;
