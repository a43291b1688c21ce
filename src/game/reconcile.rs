//! Remote state reconstruction for observer entities
//!
//! Snapshots arrive at the serialization cadence while the reconciler runs
//! every simulation tick, so the displayed state chases the latest snapshot
//! rather than jumping to it.

use nalgebra::Vector3;

use crate::config::Capabilities;
use crate::net::SnapshotRecord;
use crate::util::math::{blend_factor, lerp, lerp_vec3, move_towards, slerp_towards};

use super::{EntityState, EventSet};

/// Rate for rotation smoothing and the exponential position approach
pub const SMOOTHING_RATE: f32 = 10.0;

/// How displayed position chases the latest snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionMode {
    /// Bounded-speed move toward the vy-extrapolated target
    Extrapolated,
    /// Rate-based lerp, for layouts without vertical velocity
    Exponential,
}

impl PositionMode {
    pub fn for_capabilities(caps: Capabilities) -> Self {
        if caps.replicates_vertical_velocity {
            PositionMode::Extrapolated
        } else {
            PositionMode::Exponential
        }
    }
}

pub struct Reconciler {
    mode: PositionMode,
    serialization_interval: f32,
    crouch_transition_rate: f32,
    latest: Option<EntityState>,
    displayed: EntityState,
    crouch_blend: f32,
    pending: EventSet,
}

impl Reconciler {
    /// Start displaying `initial` (the spawn pose) until a snapshot arrives
    pub fn new(
        initial: EntityState,
        caps: Capabilities,
        serialization_interval: f32,
        crouch_transition_rate: f32,
    ) -> Self {
        Self {
            mode: PositionMode::for_capabilities(caps),
            serialization_interval,
            crouch_transition_rate,
            latest: None,
            displayed: initial,
            crouch_blend: 0.0,
            pending: EventSet::default(),
        }
    }

    /// Accept a fully decoded snapshot.
    ///
    /// Discrete fields are applied at once; continuous ones become the new
    /// target for [`Reconciler::tick`].
    pub fn apply(&mut self, record: SnapshotRecord) {
        let SnapshotRecord { state, events } = record;
        self.displayed.blend = state.blend;
        self.displayed.grounded = state.grounded;
        self.displayed.crouching = state.crouching;
        self.displayed.vertical_velocity = state.vertical_velocity;
        self.pending.merge(events);
        self.latest = Some(state);
    }

    /// Advance the displayed state one tick toward the latest snapshot
    pub fn tick(&mut self, dt: f32) {
        let target_crouch = if self.displayed.crouching { 1.0 } else { 0.0 };
        self.crouch_blend = lerp(
            self.crouch_blend,
            target_crouch,
            blend_factor(self.crouch_transition_rate, dt),
        );

        let Some(latest) = self.latest.as_ref() else {
            return;
        };

        self.displayed.position = match self.mode {
            PositionMode::Extrapolated => {
                let target = latest.position + Vector3::y() * latest.vertical_velocity * dt;
                let distance = (target - self.displayed.position).norm();
                let speed = distance / self.serialization_interval;
                move_towards(&self.displayed.position, &target, speed * dt)
            }
            PositionMode::Exponential => lerp_vec3(
                &self.displayed.position,
                &latest.position,
                blend_factor(SMOOTHING_RATE, dt),
            ),
        };

        let t = blend_factor(SMOOTHING_RATE, dt);
        self.displayed.rotation = slerp_towards(&self.displayed.rotation, &latest.rotation, t);
        for (shown, target) in self.displayed.parts.iter_mut().zip(&latest.parts) {
            *shown = slerp_towards(shown, target, t);
        }
    }

    pub fn displayed(&self) -> &EntityState {
        &self.displayed
    }

    pub fn crouch_blend(&self) -> f32 {
        self.crouch_blend
    }

    /// Events received but not yet consumed by the animation projector
    pub fn pending_events(&mut self) -> &mut EventSet {
        &mut self.pending
    }

    /// Distance between the displayed and the latest received position
    pub fn tracking_error(&self) -> Option<f32> {
        self.latest
            .as_ref()
            .map(|latest| (latest.position - self.displayed.position).norm())
    }
}
