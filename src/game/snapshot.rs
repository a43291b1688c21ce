//! Snapshot scheduling and hand-off

use parking_lot::Mutex;

use crate::net::SnapshotRecord;
use crate::util::time::ticks_per_snapshot;

/// Decides on which simulation ticks a snapshot is captured
#[derive(Debug, Clone)]
pub struct SnapshotCadence {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotCadence {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    pub fn from_rates(simulation_tps: u32, serialization_rate: u32) -> Self {
        Self::new(ticks_per_snapshot(simulation_tps, serialization_rate))
    }

    pub fn interval(&self) -> u32 {
        self.snapshot_interval
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for spawns)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }
}

/// Single-slot buffer between the decode path and an observer's tick.
///
/// The newest state wins; events from overwritten records are kept by
/// merging them into the replacement.
#[derive(Debug, Default)]
pub struct SnapshotInbox {
    slot: Mutex<Option<SnapshotRecord>>,
}

impl SnapshotInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a fully decoded record
    pub fn publish(&self, mut record: SnapshotRecord) {
        let mut slot = self.slot.lock();
        if let Some(previous) = slot.take() {
            record.events.merge(previous.events);
        }
        *slot = Some(record);
    }

    /// Take the pending record, if any
    pub fn take(&self) -> Option<SnapshotRecord> {
        self.slot.lock().take()
    }
}

/// Outbound snapshot counters for debugging
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_bytes: u64,
    pub avg_bytes_per_snapshot: f32,
}

impl SnapshotStats {
    pub fn record(&mut self, bytes: usize) {
        self.total_snapshots += 1;
        self.total_bytes += bytes as u64;

        // Running average
        let n = self.total_snapshots as f32;
        self.avg_bytes_per_snapshot =
            self.avg_bytes_per_snapshot * ((n - 1.0) / n) + (bytes as f32 / n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{EntityState, Event, EventSet};
    use nalgebra::{UnitQuaternion, Vector3};

    fn record(x: f32, event: Option<Event>) -> SnapshotRecord {
        let mut events = EventSet::default();
        if let Some(event) = event {
            events.raise(event);
        }
        SnapshotRecord {
            state: EntityState::at_rest(Vector3::new(x, 0.0, 0.0), UnitQuaternion::identity(), 1),
            events,
        }
    }

    #[test]
    fn cadence_fires_every_interval() {
        let mut cadence = SnapshotCadence::from_rates(60, 10);
        assert_eq!(cadence.interval(), 6);
        let fired: Vec<u32> = (1..=18).filter(|_| cadence.should_send()).collect();
        assert_eq!(fired.len(), 3);
    }

    #[test]
    fn cadence_interval_is_at_least_one_tick() {
        let mut cadence = SnapshotCadence::from_rates(30, 60);
        assert!(cadence.should_send());
        assert!(cadence.should_send());
    }

    #[test]
    fn force_next_fires_on_following_check() {
        let mut cadence = SnapshotCadence::new(6);
        cadence.should_send();
        cadence.force_next();
        assert!(cadence.should_send());
        assert!(!cadence.should_send());
    }

    #[test]
    fn inbox_keeps_newest_state_and_all_events() {
        let inbox = SnapshotInbox::new();
        inbox.publish(record(1.0, Some(Event::Jump)));
        inbox.publish(record(2.0, None));

        let taken = inbox.take().unwrap();
        assert_eq!(taken.state.position.x, 2.0);
        assert!(taken.events.contains(Event::Jump));
        assert!(inbox.take().is_none());
    }

    #[test]
    fn stats_track_running_average() {
        let mut stats = SnapshotStats::default();
        stats.record(100);
        stats.record(200);
        assert_eq!(stats.total_snapshots, 2);
        assert_eq!(stats.total_bytes, 300);
        assert!((stats.avg_bytes_per_snapshot - 150.0).abs() < 1e-3);
    }
}
