//! Integration Test Harness
//!
//! Encounter-level test infrastructure:
//! - `EncounterBuilder` - Assembles a session from the built-in catalog with
//!   deterministic initiative and a fixed seed
//! - `ScriptedController` - Party controller that plays a queue of
//!   actions, then falls back to the auto-pilot
//!
//! # Example
//!
//! ```rust,ignore
//! use harness::EncounterBuilder;
//!
//! let mut enc = EncounterBuilder::new(7).hero("Hero", 30).enemy("cultist").build();
//! enc.run_to_end(&mut ScriptedController::default());
//! ```

mod builder;
mod controller;

pub use builder::{Encounter, EncounterBuilder};
pub use controller::ScriptedController;
