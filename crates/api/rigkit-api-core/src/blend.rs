//! Interpolation contract for keyed values.
//!
//! - numeric kinds blend component-wise: `from + (to - from) * t`
//! - non-interpolable kinds (resources, topology snapshots) are stepped: the
//!   blend always returns `from`, so only a new key changes the value

use glam::Vec2;

/// Linear interpolation of scalars.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// A value a keyframe can hold.
pub trait Blend: Clone {
    /// Blend from `from` toward `to` by eased progress `t`.
    ///
    /// `t` may leave [0, 1] for overshooting easings (back, elastic).
    fn blend(from: &Self, to: &Self, t: f32) -> Self;

    /// Stepped kinds never blend; they hold `from` until the next key.
    fn is_stepped() -> bool {
        false
    }
}

impl Blend for f32 {
    #[inline]
    fn blend(from: &Self, to: &Self, t: f32) -> Self {
        lerp_f32(*from, *to, t)
    }
}

impl Blend for Vec2 {
    #[inline]
    fn blend(from: &Self, to: &Self, t: f32) -> Self {
        Vec2::new(lerp_f32(from.x, to.x, t), lerp_f32(from.y, to.y, t))
    }
}

impl Blend for bool {
    fn blend(from: &Self, _to: &Self, _t: f32) -> Self {
        *from
    }

    fn is_stepped() -> bool {
        true
    }
}
