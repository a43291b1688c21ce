//! Physics surface consumed by the motion model

use nalgebra::Vector3;

/// Collision-aware character body supplied by the physics engine.
///
/// `position` is the feet position. `is_grounded` reports contact from the
/// most recent `move_by`, like a kinematic character controller.
pub trait CharacterBody: Send {
    fn position(&self) -> Vector3<f32>;

    /// Sweep by `delta`, resolving collisions
    fn move_by(&mut self, delta: Vector3<f32>);

    fn is_grounded(&self) -> bool;

    fn height(&self) -> f32;

    fn set_height(&mut self, height: f32);

    fn set_center(&mut self, center: Vector3<f32>);
}

/// Below this gap the body counts as standing on the floor
const GROUND_CONTACT_EPS: f32 = 1.0e-4;

/// Capsule over an infinite horizontal floor
#[derive(Debug, Clone)]
pub struct FlatGroundBody {
    position: Vector3<f32>,
    floor_y: f32,
    height: f32,
    center: Vector3<f32>,
    grounded: bool,
}

impl FlatGroundBody {
    pub fn new(position: Vector3<f32>, floor_y: f32, height: f32) -> Self {
        let mut position = position;
        position.y = position.y.max(floor_y);
        Self {
            grounded: position.y <= floor_y + GROUND_CONTACT_EPS,
            position,
            floor_y,
            height,
            center: Vector3::new(0.0, height / 2.0, 0.0),
        }
    }

    pub fn center(&self) -> Vector3<f32> {
        self.center
    }
}

impl CharacterBody for FlatGroundBody {
    fn position(&self) -> Vector3<f32> {
        self.position
    }

    fn move_by(&mut self, delta: Vector3<f32>) {
        let mut next = self.position + delta;
        if next.y <= self.floor_y {
            next.y = self.floor_y;
        }
        self.grounded = delta.y <= 0.0 && next.y <= self.floor_y + GROUND_CONTACT_EPS;
        self.position = next;
    }

    fn is_grounded(&self) -> bool {
        self.grounded
    }

    fn height(&self) -> f32 {
        self.height
    }

    fn set_height(&mut self, height: f32) {
        self.height = height;
    }

    fn set_center(&mut self, center: Vector3<f32>) {
        self.center = center;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_stops_downward_moves() {
        let mut body = FlatGroundBody::new(Vector3::new(0.0, 1.0, 0.0), 0.0, 2.0);
        assert!(!body.is_grounded());

        body.move_by(Vector3::new(0.5, -3.0, 0.0));
        assert_eq!(body.position(), Vector3::new(0.5, 0.0, 0.0));
        assert!(body.is_grounded());
    }

    #[test]
    fn upward_move_leaves_ground() {
        let mut body = FlatGroundBody::new(Vector3::zeros(), 0.0, 2.0);
        assert!(body.is_grounded());
        body.move_by(Vector3::new(0.0, 0.1, 0.0));
        assert!(!body.is_grounded());
    }
}
