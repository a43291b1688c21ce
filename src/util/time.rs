//! Time utilities for the per-entity simulation tick

/// Default simulation rate
pub const DEFAULT_SIMULATION_TPS: u32 = 60; // 60 ticks per second
/// Default serialization rate (snapshots per second)
pub const DEFAULT_SERIALIZATION_RATE: u32 = 10;

/// Delta time for one simulation tick (in seconds)
pub fn tick_delta(simulation_tps: u32) -> f32 {
    1.0 / simulation_tps.max(1) as f32
}

/// Time between two scheduled snapshots (in seconds)
pub fn serialization_interval(serialization_rate: u32) -> f32 {
    1.0 / serialization_rate.max(1) as f32
}

/// Number of simulation ticks between two snapshots (at least one)
pub fn ticks_per_snapshot(simulation_tps: u32, serialization_rate: u32) -> u32 {
    (simulation_tps / serialization_rate.max(1)).max(1)
}

/// Simulation clock, advanced once per tick.
///
/// Stands in for engine frame time: `now()` is the elapsed simulated time,
/// used for cooldowns, and `dt()` is the fixed tick duration.
#[derive(Debug, Clone)]
pub struct SimClock {
    tick: u64,
    dt: f32,
    elapsed: f64,
}

impl SimClock {
    pub fn new(simulation_tps: u32) -> Self {
        Self::with_delta(tick_delta(simulation_tps))
    }

    /// Clock with an explicit tick duration
    pub fn with_delta(dt: f32) -> Self {
        Self {
            tick: 0,
            dt: dt.max(0.0),
            elapsed: 0.0,
        }
    }

    /// Advance by one tick
    pub fn advance(&mut self) {
        self.tick += 1;
        self.elapsed += self.dt as f64;
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// Elapsed simulated seconds
    pub fn now(&self) -> f64 {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_per_snapshot_never_zero() {
        assert_eq!(ticks_per_snapshot(60, 10), 6);
        assert_eq!(ticks_per_snapshot(30, 20), 1);
        assert_eq!(ticks_per_snapshot(10, 60), 1);
        assert_eq!(ticks_per_snapshot(60, 0), 60);
    }

    #[test]
    fn clock_accumulates_fixed_steps() {
        let mut clock = SimClock::with_delta(0.02);
        for _ in 0..10 {
            clock.advance();
        }
        assert_eq!(clock.tick(), 10);
        assert!((clock.now() - 0.2).abs() < 1e-6);
    }
}
