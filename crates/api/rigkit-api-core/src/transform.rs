//! Rigid object transform (scale / rotate / translate) in 2D.

use glam::{Affine2, Vec2};
use serde::{Deserialize, Serialize};

/// Sampled SRT of one object at one frame.
///
/// The affine form is `T(translate) * T(pivot) * R(rotate) * S(scale) * T(-pivot)`:
/// rotation and scale happen about the object's pivot (centroid), then the
/// whole object is moved.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Srt {
    pub translate: Vec2,
    /// Radians, counter-clockwise.
    pub rotate: f32,
    pub scale: Vec2,
}

impl Default for Srt {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Srt {
    pub const IDENTITY: Srt = Srt {
        translate: Vec2::ZERO,
        rotate: 0.0,
        scale: Vec2::ONE,
    };

    pub fn new(translate: Vec2, rotate: f32, scale: Vec2) -> Self {
        Self {
            translate,
            rotate,
            scale,
        }
    }

    pub fn to_affine(&self, pivot: Vec2) -> Affine2 {
        Affine2::from_translation(self.translate + pivot)
            * Affine2::from_scale_angle_translation(self.scale, self.rotate, Vec2::ZERO)
            * Affine2::from_translation(-pivot)
    }
}

/// Rigid transform with rotation `angle` about `pivot`.
pub fn rotation_about(angle: f32, pivot: Vec2) -> Affine2 {
    Affine2::from_translation(pivot)
        * Affine2::from_angle(angle)
        * Affine2::from_translation(-pivot)
}

/// Component-wise closeness for tests and pick tolerances.
#[inline]
pub fn approx_eq(a: Vec2, b: Vec2, eps: f32) -> bool {
    (a - b).abs().max_element() <= eps
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn identity_srt_is_identity_affine() {
        let m = Srt::IDENTITY.to_affine(Vec2::new(5.0, 5.0));
        let p = Vec2::new(3.0, -2.0);
        assert!(approx_eq(m.transform_point2(p), p, 1e-6));
    }

    #[test]
    fn rotation_happens_about_pivot() {
        let srt = Srt::new(Vec2::ZERO, FRAC_PI_2, Vec2::ONE);
        let pivot = Vec2::new(10.0, 0.0);
        let m = srt.to_affine(pivot);
        // The pivot itself does not move.
        assert!(approx_eq(m.transform_point2(pivot), pivot, 1e-5));
        // A point one unit right of the pivot ends up one unit above it.
        assert!(approx_eq(
            m.transform_point2(Vec2::new(11.0, 0.0)),
            Vec2::new(10.0, 1.0),
            1e-5
        ));
    }

    #[test]
    fn rotation_about_matches_srt() {
        let a = rotation_about(0.3, Vec2::new(1.0, 2.0));
        let b = Srt::new(Vec2::ZERO, 0.3, Vec2::ONE).to_affine(Vec2::new(1.0, 2.0));
        let p = Vec2::new(-4.0, 7.0);
        assert!(approx_eq(a.transform_point2(p), b.transform_point2(p), 1e-5));
    }
}
