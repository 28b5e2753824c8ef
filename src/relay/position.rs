//! Position Record
//!
//! The single entity the bridge stores, plus the validated update that
//! replaces it and the read-time view with derived staleness.

use serde::{Deserialize, Serialize};

use crate::core::coords::{SourcePoint, TargetPoint};

/// Latest known position in both coordinate spaces.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Source-space X, clamped to `[0, 640]`.
    pub x: f64,
    /// Source-space Y, clamped to `[0, 448]`.
    pub y: f64,
    /// Target-space X.
    pub roblox_x: f64,
    /// Target-space Y.
    pub roblox_y: f64,
    /// Producer's observation time (epoch ms), or receipt time if none was given.
    pub timestamp: i64,
    /// Server receipt time of the accepted write (epoch ms).
    #[serde(rename = "lastUpdate")]
    pub last_update: i64,
    /// Accepted writes since process start.
    #[serde(rename = "updateCount")]
    pub update_count: u64,
    /// Whether the record was stale when this copy was taken.
    #[serde(rename = "isStale")]
    pub is_stale: bool,
}

impl Position {
    /// Initial record: source centre, never updated.
    pub fn initial(now_millis: i64) -> Self {
        let source = SourcePoint::CENTER;
        let target = source.to_target();
        Self {
            x: source.x,
            y: source.y,
            roblox_x: target.x,
            roblox_y: target.y,
            timestamp: now_millis,
            last_update: now_millis,
            update_count: 0,
            is_stale: false,
        }
    }

    /// Build the record that replaces `self` after accepting `update`.
    ///
    /// Clamps the source point, converts it unless an explicit target was
    /// supplied, and stamps the write with `now_millis`.
    pub fn next(&self, update: &PositionUpdate, now_millis: i64) -> Self {
        let source = update.source.clamped();
        let target = update.target.unwrap_or_else(|| source.to_target());

        Self {
            x: source.x,
            y: source.y,
            roblox_x: target.x,
            roblox_y: target.y,
            timestamp: update.timestamp.unwrap_or(now_millis),
            last_update: now_millis,
            update_count: self.update_count + 1,
            is_stale: false,
        }
    }

    /// Source-space point.
    pub fn source(&self) -> SourcePoint {
        SourcePoint::new(self.x, self.y)
    }

    /// Target-space point.
    pub fn target(&self) -> TargetPoint {
        TargetPoint::new(self.roblox_x, self.roblox_y)
    }

    /// Milliseconds since the last accepted write.
    pub fn age_at(&self, now_millis: i64) -> i64 {
        now_millis.saturating_sub(self.last_update)
    }

    /// Read-time view at `now_millis` with staleness derived from `threshold_ms`.
    pub fn view_at(&self, now_millis: i64, threshold_ms: i64) -> PositionSnapshot {
        let data_age = self.age_at(now_millis);
        PositionSnapshot {
            position: Self {
                is_stale: data_age > threshold_ms,
                ..*self
            },
            data_age,
            server_time: now_millis,
        }
    }
}

/// Validated input to the store.
///
/// Produced by the HTTP layer after decoding and policy checks.
/// Values may still be out of range; the store clamps them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionUpdate {
    /// Reported source point (unclamped).
    pub source: SourcePoint,
    /// Explicit target point, bypassing conversion.
    pub target: Option<TargetPoint>,
    /// Producer's observation time (epoch ms).
    pub timestamp: Option<i64>,
}

impl PositionUpdate {
    /// Update carrying only a source point.
    pub fn from_source(x: f64, y: f64) -> Self {
        Self {
            source: SourcePoint::new(x, y),
            target: None,
            timestamp: None,
        }
    }

    /// Attach an explicit target point.
    pub fn with_target(mut self, x: f64, y: f64) -> Self {
        self.target = Some(TargetPoint::new(x, y));
        self
    }

    /// Attach the producer's timestamp.
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Point-in-time view of the stored position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    /// Stored record with `isStale` recomputed.
    #[serde(flatten)]
    pub position: Position,
    /// Milliseconds since the last accepted write.
    #[serde(rename = "dataAge")]
    pub data_age: i64,
    /// Server time the view was taken (epoch ms).
    #[serde(rename = "serverTime")]
    pub server_time: i64,
}

impl PositionSnapshot {
    /// Whether no write was accepted within the stale threshold.
    pub fn is_stale(&self) -> bool {
        self.position.is_stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_is_center() {
        let p = Position::initial(1_000);
        assert_eq!(p.source(), SourcePoint::CENTER);
        assert_eq!(p.target(), TargetPoint::new(0.0, 0.0));
        assert_eq!(p.update_count, 0);
        assert_eq!(p.last_update, 1_000);
        assert!(!p.is_stale);
    }

    #[test]
    fn test_next_converts_and_counts() {
        let p = Position::initial(0);
        let next = p.next(&PositionUpdate::from_source(0.0, 0.0), 500);

        assert_eq!(next.target(), TargetPoint::new(-50.0, -50.0));
        assert_eq!(next.update_count, 1);
        assert_eq!(next.last_update, 500);
        assert_eq!(next.timestamp, 500);
    }

    #[test]
    fn test_next_clamps_before_converting() {
        let p = Position::initial(0);
        let next = p.next(&PositionUpdate::from_source(9000.0, -3.0), 1);

        assert_eq!(next.source(), SourcePoint::new(640.0, 0.0));
        assert_eq!(next.target(), TargetPoint::new(50.0, -50.0));
    }

    #[test]
    fn test_next_explicit_target_bypasses_conversion() {
        let p = Position::initial(0);
        let update = PositionUpdate::from_source(0.0, 0.0).with_target(7.0, -3.0);
        let next = p.next(&update, 1);

        assert_eq!(next.source(), SourcePoint::new(0.0, 0.0));
        assert_eq!(next.target(), TargetPoint::new(7.0, -3.0));
    }

    #[test]
    fn test_next_keeps_caller_timestamp() {
        let p = Position::initial(0);
        let update = PositionUpdate::from_source(1.0, 1.0).with_timestamp(123);
        let next = p.next(&update, 9_999);

        assert_eq!(next.timestamp, 123);
        assert_eq!(next.last_update, 9_999);
    }

    #[test]
    fn test_view_staleness_boundary() {
        let p = Position::initial(1_000);

        let at_threshold = p.view_at(6_000, 5_000);
        assert_eq!(at_threshold.data_age, 5_000);
        assert!(!at_threshold.is_stale());

        let past = p.view_at(6_001, 5_000);
        assert!(past.is_stale());
        assert_eq!(past.server_time, 6_001);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let snap = Position::initial(10).view_at(20, 5_000);
        let json = serde_json::to_value(snap).unwrap();

        let keys = [
            "x",
            "y",
            "roblox_x",
            "roblox_y",
            "timestamp",
            "lastUpdate",
            "updateCount",
            "isStale",
            "dataAge",
            "serverTime",
        ];
        for key in keys {
            assert!(json.get(key).is_some(), "missing key {}", key);
        }
        assert_eq!(json["dataAge"], 10);
    }
}
