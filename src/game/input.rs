//! Input sampling for the authoritative side

use std::collections::VecDeque;

use nalgebra::Vector2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::ControlInput;

/// Raw device state at the moment of polling
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawInput {
    pub horizontal: f32,
    pub vertical: f32,
    pub jump_held: bool,
    pub crouch_held: bool,
    pub attack_held: bool,
    /// Unscaled look motion (x = yaw, y = pitch)
    pub look: Vector2<f32>,
}

/// Source of raw control state (keyboard, gamepad, bot, replay)
pub trait InputDevice: Send {
    fn poll(&mut self) -> RawInput;
}

/// Turns raw device state into per-tick control intents.
///
/// Only ever constructed for entities this process has authority over.
pub struct InputSampler {
    device: Box<dyn InputDevice>,
    look_sensitivity: f32,
    jump_was_held: bool,
    attack_was_held: bool,
}

impl InputSampler {
    pub fn new(device: Box<dyn InputDevice>, look_sensitivity: f32) -> Self {
        Self {
            device,
            look_sensitivity,
            jump_was_held: false,
            attack_was_held: false,
        }
    }

    /// Read the device once for this tick
    pub fn sample(&mut self, dt: f32) -> ControlInput {
        let raw = self.device.poll();

        let jump_pressed = raw.jump_held && !self.jump_was_held;
        let attack_pressed = raw.attack_held && !self.attack_was_held;
        self.jump_was_held = raw.jump_held;
        self.attack_was_held = raw.attack_held;

        ControlInput {
            horizontal: raw.horizontal,
            forward: raw.vertical,
            jump_pressed,
            crouch_held: raw.crouch_held,
            attack_pressed,
            look: raw.look * self.look_sensitivity * dt,
        }
    }
}

/// Plays back a fixed list of frames, then reports released controls
#[derive(Debug, Default)]
pub struct ScriptedDevice {
    frames: VecDeque<RawInput>,
}

impl ScriptedDevice {
    pub fn new(frames: impl IntoIterator<Item = RawInput>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    /// Hold `input` for `ticks` consecutive polls
    pub fn hold(mut self, input: RawInput, ticks: usize) -> Self {
        self.frames.extend(std::iter::repeat(input).take(ticks));
        self
    }
}

impl InputDevice for ScriptedDevice {
    fn poll(&mut self) -> RawInput {
        self.frames.pop_front().unwrap_or_default()
    }
}

/// Seeded bot that wanders around, occasionally jumping, crouching and attacking
pub struct WanderBot {
    rng: ChaCha8Rng,
    current: RawInput,
    ticks_left: u32,
}

impl WanderBot {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            current: RawInput::default(),
            ticks_left: 0,
        }
    }

    fn pick_intent(&mut self) {
        let idle = self.rng.gen_bool(0.25);
        self.current = RawInput {
            horizontal: if idle { 0.0 } else { self.rng.gen_range(-1..=1) as f32 },
            vertical: if idle { 0.0 } else { self.rng.gen_range(-1..=1) as f32 },
            jump_held: !idle && self.rng.gen_bool(0.2),
            crouch_held: idle && self.rng.gen_bool(0.5),
            attack_held: self.rng.gen_bool(0.15),
            look: Vector2::new(self.rng.gen_range(-0.5..0.5), self.rng.gen_range(-0.2..0.2)),
        };
        self.ticks_left = self.rng.gen_range(20..90);
    }
}

impl InputDevice for WanderBot {
    fn poll(&mut self) -> RawInput {
        if self.ticks_left == 0 {
            self.pick_intent();
        }
        self.ticks_left -= 1;

        let raw = self.current;
        // Buttons are tapped on the first tick of an intent, not held.
        self.current.jump_held = false;
        self.current.attack_held = false;
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jump() -> RawInput {
        RawInput {
            jump_held: true,
            ..RawInput::default()
        }
    }

    #[test]
    fn jump_edge_fires_only_on_press() {
        let device = ScriptedDevice::default()
            .hold(jump(), 3)
            .hold(RawInput::default(), 1)
            .hold(jump(), 1);
        let mut sampler = InputSampler::new(Box::new(device), 120.0);

        let edges: Vec<bool> = (0..5).map(|_| sampler.sample(0.02).jump_pressed).collect();
        assert_eq!(edges, vec![true, false, false, false, true]);
    }

    #[test]
    fn attack_edge_and_crouch_hold() {
        let held = RawInput {
            attack_held: true,
            crouch_held: true,
            ..RawInput::default()
        };
        let mut sampler = InputSampler::new(Box::new(ScriptedDevice::default().hold(held, 2)), 1.0);

        let first = sampler.sample(0.02);
        let second = sampler.sample(0.02);
        assert!(first.attack_pressed && first.crouch_held);
        assert!(!second.attack_pressed && second.crouch_held);
    }

    #[test]
    fn look_is_scaled_by_sensitivity_and_tick() {
        let device = ScriptedDevice::new([RawInput {
            look: Vector2::new(1.0, -0.5),
            ..RawInput::default()
        }]);
        let mut sampler = InputSampler::new(Box::new(device), 120.0);
        let input = sampler.sample(0.5);
        assert_eq!(input.look, Vector2::new(60.0, -30.0));
    }

    #[test]
    fn axes_pass_through_unfiltered() {
        let device = ScriptedDevice::new([RawInput {
            horizontal: 1.0,
            vertical: 1.0,
            ..RawInput::default()
        }]);
        let input = InputSampler::new(Box::new(device), 1.0).sample(0.02);
        assert_eq!((input.horizontal, input.forward), (1.0, 1.0));
    }

    #[test]
    fn wander_bot_is_deterministic_per_seed() {
        let mut a = WanderBot::new(42);
        let mut b = WanderBot::new(42);
        for _ in 0..200 {
            assert_eq!(a.poll(), b.poll());
        }
    }
}
