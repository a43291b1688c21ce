//! Per-entity movement tunables and variant capabilities

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::net::schema::MAX_PART_COUNT;

/// Immutable movement tunables supplied by the spawner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Horizontal speed (m/s)
    pub move_speed: f32,
    /// Horizontal speed while crouching (m/s)
    pub crouch_speed: f32,
    /// Apex height of a jump (m), strictly positive
    pub jump_height: f32,
    /// Vertical acceleration (m/s²), strictly negative
    pub gravity: f32,
    /// Minimum time between two honored jumps (seconds)
    pub jump_cooldown: f32,
    /// Rate at which the animation blend coordinates follow the move direction
    pub animation_smoothing: f32,

    /// Look speed in degrees per second per unit of raw look delta
    pub look_sensitivity: f32,
    /// Lowest camera pitch (degrees)
    pub min_pitch: f32,
    /// Highest camera pitch (degrees)
    pub max_pitch: f32,

    /// Collider height while standing (m)
    pub standing_height: f32,
    /// Collider height while crouching (m)
    pub crouch_height: f32,
    /// Rate for collider height and crouch blend transitions
    pub crouch_transition_rate: f32,

    /// Camera height change while crouching (m)
    pub camera_crouch_offset: f32,
    /// Rate at which the camera follows the crouch height
    pub camera_follow_rate: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            move_speed: 5.0,
            crouch_speed: 2.0,
            jump_height: 2.0,
            gravity: -9.81,
            jump_cooldown: 0.5,
            animation_smoothing: 15.0,
            look_sensitivity: 120.0,
            min_pitch: -75.0,
            max_pitch: 85.0,
            standing_height: 2.0,
            crouch_height: 1.0,
            crouch_transition_rate: 8.0,
            camera_crouch_offset: -1.0,
            camera_follow_rate: 5.0,
        }
    }
}

impl MovementConfig {
    /// Load tunables from a JSON file; missing keys keep their defaults
    pub fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::MovementFile { path, source })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Check the physical invariants of the tunables
    pub fn validate(&self) -> Result<(), ConfigError> {
        let values = [
            self.move_speed,
            self.crouch_speed,
            self.jump_height,
            self.gravity,
            self.jump_cooldown,
            self.animation_smoothing,
            self.look_sensitivity,
            self.min_pitch,
            self.max_pitch,
            self.standing_height,
            self.crouch_height,
            self.crouch_transition_rate,
            self.camera_crouch_offset,
            self.camera_follow_rate,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::InvalidMovement("values must be finite"));
        }
        if self.gravity >= 0.0 {
            return Err(ConfigError::InvalidMovement("gravity must be negative"));
        }
        if self.jump_height <= 0.0 {
            return Err(ConfigError::InvalidMovement("jump height must be positive"));
        }
        if self.jump_cooldown < 0.0 {
            return Err(ConfigError::InvalidMovement("jump cooldown must not be negative"));
        }
        if self.min_pitch > self.max_pitch {
            return Err(ConfigError::InvalidMovement("pitch bounds are inverted"));
        }
        if self.crouch_height <= 0.0 || self.standing_height <= 0.0 {
            return Err(ConfigError::InvalidMovement("collider heights must be positive"));
        }
        Ok(())
    }

    /// Initial vertical velocity that reaches `jump_height` under `gravity`
    pub fn jump_velocity(&self) -> f32 {
        (self.jump_height * -2.0 * self.gravity).sqrt()
    }
}

/// Feature set of a controller variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub supports_crouch: bool,
    pub supports_attack: bool,
    /// Cosmetic parts replicated in addition to the body model
    pub extra_part_count: u8,
    /// Whether snapshots carry vertical velocity for extrapolation
    pub replicates_vertical_velocity: bool,
}

impl Capabilities {
    /// Replicated part rotations (body model plus extras), capped so the
    /// widest snapshot still fits in one frame
    pub fn part_count(&self) -> usize {
        (1 + self.extra_part_count as usize).min(MAX_PART_COUNT)
    }
}

/// Controller presets used by the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Plain walker (civilians)
    Generic,
    /// Adds a hat part and a melee attack
    Police,
    /// Adds crouching, replicates no vertical velocity
    Thief,
}

impl Variant {
    pub fn capabilities(self) -> Capabilities {
        match self {
            Variant::Generic => Capabilities {
                supports_crouch: false,
                supports_attack: false,
                extra_part_count: 0,
                replicates_vertical_velocity: true,
            },
            Variant::Police => Capabilities {
                supports_crouch: false,
                supports_attack: true,
                extra_part_count: 1,
                replicates_vertical_velocity: true,
            },
            Variant::Thief => Capabilities {
                supports_crouch: true,
                supports_attack: false,
                extra_part_count: 0,
                replicates_vertical_velocity: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(MovementConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_upward_gravity_and_flat_jumps() {
        let up = MovementConfig {
            gravity: 9.81,
            ..MovementConfig::default()
        };
        assert!(matches!(up.validate(), Err(ConfigError::InvalidMovement(_))));

        let flat = MovementConfig {
            jump_height: 0.0,
            ..MovementConfig::default()
        };
        assert!(matches!(flat.validate(), Err(ConfigError::InvalidMovement(_))));

        let negative_cooldown = MovementConfig {
            jump_cooldown: -0.1,
            ..MovementConfig::default()
        };
        assert!(negative_cooldown.validate().is_err());
    }

    #[test]
    fn jump_velocity_matches_apex_law() {
        let config = MovementConfig::default();
        assert!((config.jump_velocity() - 6.264).abs() < 1e-3);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: MovementConfig = serde_json::from_str(r#"{ "move_speed": 7.5 }"#).unwrap();
        assert_eq!(config.move_speed, 7.5);
        assert_eq!(config.gravity, -9.81);
    }

    #[test]
    fn police_carries_hat_part() {
        assert_eq!(Variant::Police.capabilities().part_count(), 2);
        assert!(!Variant::Thief.capabilities().replicates_vertical_velocity);
    }
}
