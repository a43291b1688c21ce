//! Authoritative motion model
//!
//! Advances one avatar per tick: grounded check, planar move, jump impulse
//! with cooldown, gravity, animation blend smoothing, crouch and look.

use nalgebra::{UnitQuaternion, Vector2, Vector3};

use crate::config::{Capabilities, MovementConfig};
use crate::util::math::{blend_factor, lerp};

use super::body::CharacterBody;
use super::{ControlInput, Event, EventSet};

/// Vertical velocity kept while grounded so the next ground probe still hits
pub const GROUND_STICK_VELOCITY: f32 = -2.0;

/// Axis magnitude at or below which the avatar counts as idle
pub const IDLE_DEADZONE: f32 = 0.1;

/// Simulated fields owned by the authority
#[derive(Debug, Clone, PartialEq)]
pub struct MotionState {
    pub rotation: UnitQuaternion<f32>,
    pub vertical_velocity: f32,
    pub grounded: bool,
    pub crouching: bool,
    /// Smoothed local move direction (x = strafe, y = forward)
    pub blend: Vector2<f32>,
    /// 0 standing, 1 crouched; follows `crouching` smoothly
    pub crouch_blend: f32,
    /// Camera pitch in degrees
    pub pitch: f32,
}

pub struct MotionSimulator {
    config: MovementConfig,
    caps: Capabilities,
    state: MotionState,
    last_jump_at: Option<f64>,
}

impl MotionSimulator {
    pub fn new(config: MovementConfig, caps: Capabilities, rotation: UnitQuaternion<f32>) -> Self {
        Self {
            config,
            caps,
            state: MotionState {
                rotation,
                vertical_velocity: 0.0,
                grounded: false,
                crouching: false,
                blend: Vector2::zeros(),
                crouch_blend: 0.0,
                pitch: 0.0,
            },
            last_jump_at: None,
        }
    }

    pub fn state(&self) -> &MotionState {
        &self.state
    }

    /// Advance one tick at simulated time `now`.
    ///
    /// Returns the one-shot events raised during the tick.
    pub fn step(
        &mut self,
        body: &mut dyn CharacterBody,
        input: &ControlInput,
        now: f64,
        dt: f32,
    ) -> EventSet {
        let mut events = EventSet::default();

        self.state.grounded = body.is_grounded();
        if self.caps.supports_crouch {
            self.update_crouch(body, input, dt);
        }

        if self.state.grounded && self.state.vertical_velocity < 0.0 {
            self.state.vertical_velocity = GROUND_STICK_VELOCITY;
        }

        let forward = self.state.rotation * Vector3::z();
        let right = self.state.rotation * Vector3::x();
        let mut move_dir = forward * input.forward + right * input.horizontal;
        if move_dir.norm() > 1.0 {
            move_dir.normalize_mut();
        }

        let speed = if self.caps.supports_crouch && self.state.crouching {
            self.config.crouch_speed
        } else {
            self.config.move_speed
        };
        body.move_by(move_dir * speed * dt);

        if input.jump_pressed && self.can_jump(now) {
            self.state.vertical_velocity = self.config.jump_velocity();
            self.last_jump_at = Some(now);
            events.raise(Event::Jump);
        }

        self.state.vertical_velocity += self.config.gravity * dt;
        body.move_by(Vector3::y() * self.state.vertical_velocity * dt);

        if self.caps.supports_attack && input.attack_pressed {
            events.raise(Event::Attack);
        }

        let local = self.state.rotation.inverse_transform_vector(&move_dir);
        let t = blend_factor(self.config.animation_smoothing, dt);
        self.state.blend.x = lerp(self.state.blend.x, local.x, t);
        self.state.blend.y = lerp(self.state.blend.y, local.z, t);

        self.apply_look(input.look);

        events
    }

    /// Camera pivot rotation for the current pitch
    pub fn pivot_rotation(&self) -> UnitQuaternion<f32> {
        UnitQuaternion::from_euler_angles(self.state.pitch.to_radians(), 0.0, 0.0)
    }

    fn can_jump(&self, now: f64) -> bool {
        let crouch_blocked = self.caps.supports_crouch && self.state.crouching;
        let cooled_down = self
            .last_jump_at
            .map_or(true, |at| now - at >= self.config.jump_cooldown as f64);
        self.state.grounded && !crouch_blocked && cooled_down
    }

    fn update_crouch(&mut self, body: &mut dyn CharacterBody, input: &ControlInput, dt: f32) {
        let moving =
            input.horizontal.abs() > IDLE_DEADZONE || input.forward.abs() > IDLE_DEADZONE;

        if !self.state.crouching && input.crouch_held && !moving && self.state.grounded {
            self.state.crouching = true;
        }
        if self.state.crouching && !input.crouch_held {
            self.state.crouching = false;
        }

        let t = blend_factor(self.config.crouch_transition_rate, dt);
        let target_height = if self.state.crouching {
            self.config.crouch_height
        } else {
            self.config.standing_height
        };
        let height = lerp(body.height(), target_height, t);
        body.set_height(height);
        body.set_center(Vector3::new(0.0, height / 2.0, 0.0));

        let target_blend = if self.state.crouching { 1.0 } else { 0.0 };
        self.state.crouch_blend = lerp(self.state.crouch_blend, target_blend, t);
    }

    fn apply_look(&mut self, look: Vector2<f32>) {
        if look.x != 0.0 {
            let yaw = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), look.x.to_radians());
            self.state.rotation *= yaw;
            self.state.rotation.renormalize_fast();
        }
        self.state.pitch =
            (self.state.pitch - look.y).clamp(self.config.min_pitch, self.config.max_pitch);
    }
}

/// First-person camera mount on the authoritative side.
///
/// Optional wiring: entities without one simply skip camera updates.
#[derive(Debug, Clone)]
pub struct CameraRig {
    pub pivot: UnitQuaternion<f32>,
    pub local_height: f32,
    default_height: f32,
    crouch_offset: f32,
    follow_rate: f32,
}

impl CameraRig {
    pub fn new(local_height: f32, config: &MovementConfig) -> Self {
        Self {
            pivot: UnitQuaternion::identity(),
            local_height,
            default_height: local_height,
            crouch_offset: config.camera_crouch_offset,
            follow_rate: config.camera_follow_rate,
        }
    }

    /// Follow the pivot pitch and ease toward the crouch height
    pub fn update(&mut self, pivot: UnitQuaternion<f32>, crouching: bool, dt: f32) {
        self.pivot = pivot;
        let target = if crouching {
            self.default_height + self.crouch_offset
        } else {
            self.default_height
        };
        self.local_height = lerp(self.local_height, target, blend_factor(self.follow_rate, dt));
    }
}
