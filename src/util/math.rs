//! Math type re-exports and convention helpers.
//!
//! Files store quaternions as `x, y, z, w`, the same order as [`Quat`].
//! Non-root bone rotations are stored conjugated relative to the math
//! convention used in memory; the helpers here keep that flip in one place.

pub use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

/// Quaternion conjugate (inverse for unit quaternions).
#[inline]
pub fn conjugate(q: Quat) -> Quat {
    Quat::from_xyzw(-q.x, -q.y, -q.z, q.w)
}

/// Quaternion from a stored `[x, y, z, w]` array.
#[inline]
pub fn quat_from_array(v: [f32; 4]) -> Quat {
    Quat::from_xyzw(v[0], v[1], v[2], v[3])
}

/// Split a matrix into translation and normalized rotation.
///
/// Scale is discarded.
pub fn to_translation_rotation(m: &Mat4) -> (Vec3, Quat) {
    let (_, rotation, translation) = m.to_scale_rotation_translation();
    (translation, rotation.normalize())
}

/// Quaternions `a` and `b` describe the same rotation within `eps`.
///
/// `q` and `-q` are treated as equal.
pub fn quat_approx_eq(a: Quat, b: Quat, eps: f32) -> bool {
    a.abs_diff_eq(b, eps) || a.abs_diff_eq(-b, eps)
}

/// Linear to sRGB transfer for one channel in `[0, 1]`.
#[inline]
pub fn linear_to_srgb(c: f32) -> f32 {
    if c > 0.003_130_8 {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    } else {
        c * 12.92
    }
}

/// Inverse of [`linear_to_srgb`].
#[inline]
pub fn srgb_to_linear(c: f32) -> f32 {
    if c > 0.040_45 {
        ((c + 0.055) / 1.055).powf(2.4)
    } else {
        c / 12.92
    }
}
