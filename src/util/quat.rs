//! Quaternion helpers for joint targets
//!
//! Joint targets are kept as raw (possibly non-unit) quaternions so that
//! per-tick offsets accumulate component-wise; the physics collaborator
//! normalises them when driving the joint.

use glam::{Quat, Vec3};

/// Raw quaternion from components, without normalising
#[inline]
pub fn raw(x: f32, y: f32, z: f32, w: f32) -> Quat {
    Quat::from_xyzw(x, y, z, w)
}

/// Normalise, falling back to identity for degenerate input
pub fn normalize_or_identity(q: Quat) -> Quat {
    let len_sq = q.length_squared();
    if len_sq.is_finite() && len_sq > 1e-12 {
        q * (1.0 / len_sq.sqrt())
    } else {
        Quat::IDENTITY
    }
}

/// Normalised linear interpolation along the shorter arc, `t` clamped to 0..1
pub fn nlerp(from: Quat, to: Quat, t: f32) -> Quat {
    let t = t.clamp(0.0, 1.0);
    let to = if from.dot(to) < 0.0 { -to } else { to };
    normalize_or_identity(from * (1.0 - t) + to * t)
}

/// Spherical interpolation between (normalised) orientations, `t` clamped to 0..1
pub fn slerp(from: Quat, to: Quat, t: f32) -> Quat {
    let from = normalize_or_identity(from);
    let to = normalize_or_identity(to);
    normalize_or_identity(from.slerp(to, t.clamp(0.0, 1.0)))
}

/// Yaw-only orientation facing `forward` projected on the ground plane
///
/// A zero-length projection yields identity.
pub fn look_rotation_flat(forward: Vec3) -> Quat {
    let flat = Vec3::new(forward.x, 0.0, forward.z);
    if flat.length_squared() < 1e-12 || !flat.is_finite() {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_y(flat.x.atan2(flat.z))
}

/// Angle in radians between two orientations
pub fn angle_between(a: Quat, b: Quat) -> f32 {
    normalize_or_identity(a).angle_between(normalize_or_identity(b))
}

/// Component-wise equality within `epsilon`
pub fn approx_eq(a: Quat, b: Quat, epsilon: f32) -> bool {
    (a.x - b.x).abs() <= epsilon
        && (a.y - b.y).abs() <= epsilon
        && (a.z - b.z).abs() <= epsilon
        && (a.w - b.w).abs() <= epsilon
}
