//! Presentation pacing
//!
//! Provides:
//! - `Pacer`: the clock the encounter runner waits on between steps
//! - `TokioPacer`: real delays via `tokio::time::sleep`
//! - `NoPacing`: returns immediately (tests, batch runs)
//! - `RecordingPacer`: remembers every pause it was asked for
//!
//! Pauses never touch simulation state; they only space steps out.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::trace;

/// Kind of pause between simulation steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pause {
    /// After an action resolves
    Action,
    /// Between turns and at round start
    Turn,
    /// After a skipped turn
    Skip,
}

/// Pacing delays, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub enabled: bool,
    pub action_delay_ms: u64,
    pub turn_delay_ms: u64,
    pub skip_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            action_delay_ms: 900,
            turn_delay_ms: 600,
            skip_delay_ms: 400,
        }
    }
}

impl PacingConfig {
    /// Delay for a pause kind; zero when pacing is off
    pub fn delay(&self, pause: Pause) -> Duration {
        if !self.enabled {
            return Duration::ZERO;
        }
        let ms = match pause {
            Pause::Action => self.action_delay_ms,
            Pause::Turn => self.turn_delay_ms,
            Pause::Skip => self.skip_delay_ms,
        };
        Duration::from_millis(ms)
    }
}

/// Clock the runner waits on
pub trait Pacer {
    fn pause(&self, pause: Pause) -> impl Future<Output = ()> + Send;
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Default)]
pub struct TokioPacer {
    config: PacingConfig,
}

impl TokioPacer {
    pub fn new(config: PacingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PacingConfig {
        &self.config
    }
}

impl Pacer for TokioPacer {
    async fn pause(&self, pause: Pause) {
        let delay = self.config.delay(pause);
        if delay.is_zero() {
            return;
        }
        trace!("Pacing {:?} for {:?}", pause, delay);
        tokio::time::sleep(delay).await;
    }
}

/// Never waits
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacing;

impl Pacer for NoPacing {
    async fn pause(&self, _pause: Pause) {}
}

/// Never waits, but keeps the sequence of requested pauses
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<Pause>>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pauses requested so far
    pub async fn pauses(&self) -> Vec<Pause> {
        self.pauses.lock().await.clone()
    }
}

impl Pacer for RecordingPacer {
    async fn pause(&self, pause: Pause) {
        self.pauses.lock().await.push(pause);
    }
}
