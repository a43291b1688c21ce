//! Smoothing primitives shared by the motion model and the reconciler

use nalgebra::{UnitQuaternion, Vector3};

/// Fraction of the remaining gap to close this tick for a rate-based blend.
///
/// Clamped to `[0, 1]` so large ticks snap instead of overshooting.
#[inline]
pub fn blend_factor(rate: f32, dt: f32) -> f32 {
    (rate * dt).clamp(0.0, 1.0)
}

/// Linear interpolation with `t` clamped to `[0, 1]`.
#[inline]
pub fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t.clamp(0.0, 1.0)
}

/// Linear interpolation between two points with `t` clamped to `[0, 1]`.
#[inline]
pub fn lerp_vec3(from: &Vector3<f32>, to: &Vector3<f32>, t: f32) -> Vector3<f32> {
    from + (to - from) * t.clamp(0.0, 1.0)
}

/// Move `current` toward `target` by at most `max_delta`, never past it.
#[inline]
pub fn move_towards(current: &Vector3<f32>, target: &Vector3<f32>, max_delta: f32) -> Vector3<f32> {
    let delta = target - current;
    let dist = delta.norm();
    if dist <= max_delta.max(0.0) || dist <= f32::EPSILON {
        return *target;
    }
    current + delta / dist * max_delta
}

/// Spherical interpolation with `t` clamped to `[0, 1]`.
///
/// Opposite orientations have no unique arc; in that case the target is taken
/// directly.
#[inline]
pub fn slerp_towards(
    current: &UnitQuaternion<f32>,
    target: &UnitQuaternion<f32>,
    t: f32,
) -> UnitQuaternion<f32> {
    current
        .try_slerp(target, t.clamp(0.0, 1.0), 1.0e-6)
        .unwrap_or(*target)
}
