//! Process-wide call spacing for the remote model backend.
//!
//! One `RateLimiter` is shared (behind an `Arc`) by every client that talks to
//! the same backend. Each `Lane` keeps its own minimum interval and next free
//! slot, so embedding and chat traffic are throttled independently. The
//! interval only ever grows: `on_throttled` doubles it up to a ceiling.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use docqa_core::config::{ChatSettings, EmbeddingSettings};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    Embedding,
    Chat,
}

#[derive(Debug, Clone, Copy)]
pub struct LaneConfig {
    pub interval: Duration,
    pub ceiling: Duration,
}

impl LaneConfig {
    pub fn from_qps(qps: f64, ceiling: Duration) -> Self {
        let interval = if qps > 0.0 { Duration::from_secs_f64(1.0 / qps) } else { ceiling };
        Self { interval, ceiling: ceiling.max(interval) }
    }
}

#[derive(Debug)]
struct LaneState {
    interval: Duration,
    ceiling: Duration,
    next_slot: Option<Instant>,
}

impl LaneState {
    fn new(config: LaneConfig) -> Self {
        Self { interval: config.interval, ceiling: config.ceiling, next_slot: None }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    embedding: Mutex<LaneState>,
    chat: Mutex<LaneState>,
}

impl RateLimiter {
    pub fn new(embedding: LaneConfig, chat: LaneConfig) -> Self {
        Self { embedding: Mutex::new(LaneState::new(embedding)), chat: Mutex::new(LaneState::new(chat)) }
    }

    pub fn from_settings(embedding: &EmbeddingSettings, chat: &ChatSettings) -> Self {
        let ceiling = Duration::from_millis(embedding.interval_ceiling_ms);
        Self::new(LaneConfig::from_qps(embedding.qps, ceiling), LaneConfig::from_qps(chat.qps, ceiling))
    }

    /// No spacing at all; for tests and offline fakes.
    pub fn unlimited() -> Self {
        let cfg = LaneConfig { interval: Duration::ZERO, ceiling: Duration::ZERO };
        Self::new(cfg, cfg)
    }

    fn lane(&self, lane: Lane) -> &Mutex<LaneState> {
        match lane {
            Lane::Embedding => &self.embedding,
            Lane::Chat => &self.chat,
        }
    }

    /// Wait until this lane's next slot, reserving the one after it.
    /// Returns how long the caller was delayed.
    pub async fn acquire(&self, lane: Lane) -> Duration {
        let now = Instant::now();
        let start = {
            let mut state = self.lane(lane).lock().unwrap_or_else(PoisonError::into_inner);
            let start = state.next_slot.map_or(now, |slot| slot.max(now));
            state.next_slot = Some(start + state.interval);
            start
        };
        let wait = start.saturating_duration_since(now);
        if !wait.is_zero() {
            debug!("rate limiter: {lane:?} waiting {wait:?}");
            sleep_until(start).await;
        }
        wait
    }

    /// Record a throttling signal from the backend and return the new interval.
    pub fn on_throttled(&self, lane: Lane) -> Duration {
        let mut state = self.lane(lane).lock().unwrap_or_else(PoisonError::into_inner);
        let doubled = if state.interval.is_zero() { Duration::from_millis(100) } else { state.interval * 2 };
        state.interval = doubled.min(state.ceiling).max(state.interval);
        warn!("rate limiter: {lane:?} throttled, interval now {:?}", state.interval);
        state.interval
    }

    pub fn interval(&self, lane: Lane) -> Duration {
        self.lane(lane).lock().unwrap_or_else(PoisonError::into_inner).interval
    }
}
