//! Position Store
//!
//! Single-slot, last-write-wins container for the latest position.
//!
//! Writers build the replacement record in full and swap it in under the
//! write lock, so readers never observe a half-applied update. Staleness
//! is not stored; it is derived from the clock on every read.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::core::clock::{Clock, SystemClock};
use crate::relay::position::{Position, PositionSnapshot, PositionUpdate};
use crate::STALE_THRESHOLD_MS;

/// Operational view returned by [`PositionStore::health`].
#[derive(Clone, Copy, Debug, Serialize)]
pub struct HealthReport {
    /// Seconds since the store was created.
    pub uptime: f64,
    /// Accepted writes since start.
    #[serde(rename = "updateCount")]
    pub update_count: u64,
    /// Current position view.
    pub position: PositionSnapshot,
}

/// Shared latest-position state.
pub struct PositionStore {
    /// The single stored record.
    current: RwLock<Position>,
    /// Time source for write stamps and staleness.
    clock: Arc<dyn Clock>,
    /// Age after which reads report the record stale.
    stale_threshold_ms: i64,
    /// Creation time, for uptime.
    started_at: i64,
    /// Whether the current staleness episode has been logged.
    stale_reported: AtomicBool,
}

impl PositionStore {
    /// Create a store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store on a custom clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_millis();
        Self {
            current: RwLock::new(Position::initial(now)),
            clock,
            stale_threshold_ms: STALE_THRESHOLD_MS,
            started_at: now,
            stale_reported: AtomicBool::new(false),
        }
    }

    /// Override the stale threshold.
    pub fn with_stale_threshold(mut self, threshold_ms: i64) -> Self {
        self.stale_threshold_ms = threshold_ms;
        self
    }

    /// Stale threshold in milliseconds.
    pub fn stale_threshold_ms(&self) -> i64 {
        self.stale_threshold_ms
    }

    /// Accept an update and return the new record.
    ///
    /// Never fails: out-of-range coordinates are clamped.
    pub async fn update(&self, update: PositionUpdate) -> Position {
        let next = {
            let mut current = self.current.write().await;
            let now = self.clock.now_millis();
            let next = current.next(&update, now);
            *current = next;
            next
        };

        if self.stale_reported.swap(false, Ordering::Relaxed) {
            info!("Position feed resumed after stale period");
        }

        debug!(
            "Position #{} -> ({:.2}, {:.2}) / roblox ({}, {})",
            next.update_count, next.x, next.y, next.roblox_x, next.roblox_y
        );

        next
    }

    /// Current position with derived staleness.
    pub async fn snapshot(&self) -> PositionSnapshot {
        let position = *self.current.read().await;
        self.view(position)
    }

    /// View an already-read record at the current time.
    ///
    /// Used to answer a write with the same shape a read would return.
    pub fn view(&self, position: Position) -> PositionSnapshot {
        let snapshot = position.view_at(self.clock.now_millis(), self.stale_threshold_ms);
        self.note_staleness(&snapshot);
        snapshot
    }

    /// Uptime, write count and current position.
    pub async fn health(&self) -> HealthReport {
        let position = self.snapshot().await;
        HealthReport {
            uptime: self.uptime_secs(),
            update_count: position.position.update_count,
            position,
        }
    }

    /// Seconds since the store was created.
    pub fn uptime_secs(&self) -> f64 {
        let elapsed = self.clock.now_millis().saturating_sub(self.started_at);
        elapsed.max(0) as f64 / 1000.0
    }

    /// Log the first read of each staleness episode.
    fn note_staleness(&self, snapshot: &PositionSnapshot) {
        if snapshot.is_stale() && !self.stale_reported.swap(true, Ordering::Relaxed) {
            warn!(
                "Position data is stale ({} ms since last update, {} updates total)",
                snapshot.data_age, snapshot.position.update_count
            );
        }
    }
}

impl Default for PositionStore {
    fn default() -> Self {
        Self::new()
    }
}
