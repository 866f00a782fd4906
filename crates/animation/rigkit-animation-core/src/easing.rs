//! Progress curves for key-to-key interpolation.
//!
//! All curves map normalized time `t ∈ [0, 1]` to progress with `f(0) = 0`
//! and `f(1) = 1`. Back and elastic overshoot in between.

use std::f32::consts::{FRAC_PI_2, PI};

use rigkit_api_core::{Invalid, RigError};
use serde::{Deserialize, Serialize};

const BACK_S: f32 = 1.70158;
const BACK_INOUT_SCALE: f32 = 1.525;
const ELASTIC_PERIOD: f32 = 0.3;
const ELASTIC_INOUT_PERIOD: f32 = 0.3 * 1.5;
const BOUNCE_N: f32 = 7.5625;
const BOUNCE_D: f32 = 2.75;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EasingKind {
    /// Hold the previous key until the next one.
    None,
    #[default]
    Linear,
    Sine,
    Quad,
    Cubic,
    Quart,
    Quint,
    Expo,
    Circ,
    Back,
    Elastic,
    Bounce,
}

impl EasingKind {
    pub const ALL: [EasingKind; 12] = [
        EasingKind::None,
        EasingKind::Linear,
        EasingKind::Sine,
        EasingKind::Quad,
        EasingKind::Cubic,
        EasingKind::Quart,
        EasingKind::Quint,
        EasingKind::Expo,
        EasingKind::Circ,
        EasingKind::Back,
        EasingKind::Elastic,
        EasingKind::Bounce,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EasingKind::None => "None",
            EasingKind::Linear => "Linear",
            EasingKind::Sine => "Sine",
            EasingKind::Quad => "Quad",
            EasingKind::Cubic => "Cubic",
            EasingKind::Quart => "Quart",
            EasingKind::Quint => "Quint",
            EasingKind::Expo => "Expo",
            EasingKind::Circ => "Circ",
            EasingKind::Back => "Back",
            EasingKind::Elastic => "Elastic",
            EasingKind::Bounce => "Bounce",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EasingRange {
    In,
    Out,
    #[default]
    InOut,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Easing {
    pub kind: EasingKind,
    pub range: EasingRange,
    /// Blend between the curve (1.0) and linear progress (0.0). Ignored by
    /// `None` and `Linear`.
    #[serde(default = "full_weight")]
    pub weight: f32,
}

fn full_weight() -> f32 {
    1.0
}

impl Default for Easing {
    fn default() -> Self {
        Self::LINEAR
    }
}

impl Easing {
    pub const LINEAR: Easing = Easing {
        kind: EasingKind::Linear,
        range: EasingRange::InOut,
        weight: 1.0,
    };

    pub const HOLD: Easing = Easing {
        kind: EasingKind::None,
        range: EasingRange::InOut,
        weight: 1.0,
    };

    pub fn new(kind: EasingKind, range: EasingRange, weight: f32) -> Result<Self, RigError> {
        let easing = Self {
            kind,
            range,
            weight,
        };
        easing.validate()?;
        Ok(easing)
    }

    pub fn curve(kind: EasingKind, range: EasingRange) -> Self {
        Self {
            kind,
            range,
            weight: 1.0,
        }
    }

    pub fn validate(&self) -> Result<(), RigError> {
        if !(0.0..=1.0).contains(&self.weight) {
            return Err(Invalid::InvalidEasing(self.weight).into());
        }
        Ok(())
    }

    pub fn is_hold(&self) -> bool {
        self.kind == EasingKind::None
    }

    /// Eased progress for normalized time `t` (clamped to [0, 1]).
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self.kind {
            EasingKind::None => 0.0,
            EasingKind::Linear => t,
            kind => {
                let curve = eval(kind, self.range, t);
                curve * self.weight + t * (1.0 - self.weight)
            }
        }
    }
}

fn eval(kind: EasingKind, range: EasingRange, t: f32) -> f32 {
    match range {
        EasingRange::In => ease_in(kind, t),
        EasingRange::Out => ease_out(kind, t),
        EasingRange::InOut => match kind {
            EasingKind::Back => back_in_out(t),
            EasingKind::Elastic => elastic_in_out(t),
            EasingKind::Expo => expo_in_out(t),
            EasingKind::Sine => 0.5 * (1.0 - (PI * t).cos()),
            _ if t < 0.5 => 0.5 * ease_in(kind, 2.0 * t),
            _ => 0.5 + 0.5 * ease_out(kind, 2.0 * t - 1.0),
        },
    }
}

fn ease_in(kind: EasingKind, t: f32) -> f32 {
    match kind {
        EasingKind::None => 0.0,
        EasingKind::Linear => t,
        EasingKind::Sine => sine_in(t),
        EasingKind::Quad => t.powi(2),
        EasingKind::Cubic => t.powi(3),
        EasingKind::Quart => t.powi(4),
        EasingKind::Quint => t.powi(5),
        EasingKind::Expo => expo_in(t),
        EasingKind::Circ => circ_in(t),
        EasingKind::Back => back_in(t),
        EasingKind::Elastic => elastic_in(t),
        EasingKind::Bounce => bounce_in(t),
    }
}

fn ease_out(kind: EasingKind, t: f32) -> f32 {
    match kind {
        EasingKind::None => 0.0,
        EasingKind::Linear => t,
        EasingKind::Sine => sine_out(t),
        EasingKind::Quad => 1.0 - (1.0 - t).powi(2),
        EasingKind::Cubic => 1.0 - (1.0 - t).powi(3),
        EasingKind::Quart => 1.0 - (1.0 - t).powi(4),
        EasingKind::Quint => 1.0 - (1.0 - t).powi(5),
        EasingKind::Expo => expo_out(t),
        EasingKind::Circ => circ_out(t),
        EasingKind::Back => back_out(t),
        EasingKind::Elastic => elastic_out(t),
        EasingKind::Bounce => bounce_out(t),
    }
}

fn sine_in(t: f32) -> f32 {
    1.0 - (t * FRAC_PI_2).cos()
}

fn sine_out(t: f32) -> f32 {
    (t * FRAC_PI_2).sin()
}

fn expo_in(t: f32) -> f32 {
    if t <= 0.0 {
        0.0
    } else {
        2f32.powf(10.0 * (t - 1.0))
    }
}

fn expo_out(t: f32) -> f32 {
    if t >= 1.0 {
        1.0
    } else {
        1.0 - 2f32.powf(-10.0 * t)
    }
}

fn expo_in_out(t: f32) -> f32 {
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }
    let t = t * 2.0;
    if t < 1.0 {
        0.5 * 2f32.powf(10.0 * (t - 1.0))
    } else {
        0.5 * (2.0 - 2f32.powf(-10.0 * (t - 1.0)))
    }
}

fn circ_in(t: f32) -> f32 {
    1.0 - (1.0 - t * t).max(0.0).sqrt()
}

fn circ_out(t: f32) -> f32 {
    let u = t - 1.0;
    (1.0 - u * u).max(0.0).sqrt()
}

fn back_in(t: f32) -> f32 {
    t * t * ((BACK_S + 1.0) * t - BACK_S)
}

fn back_out(t: f32) -> f32 {
    let u = t - 1.0;
    u * u * ((BACK_S + 1.0) * u + BACK_S) + 1.0
}

fn back_in_out(t: f32) -> f32 {
    let s = BACK_S * BACK_INOUT_SCALE;
    let t = t * 2.0;
    if t < 1.0 {
        0.5 * (t * t * ((s + 1.0) * t - s))
    } else {
        let u = t - 2.0;
        0.5 * (u * u * ((s + 1.0) * u + s) + 2.0)
    }
}

fn elastic_in(t: f32) -> f32 {
    if t <= 0.0 || t >= 1.0 {
        return t.clamp(0.0, 1.0);
    }
    let s = ELASTIC_PERIOD / 4.0;
    let u = t - 1.0;
    -(2f32.powf(10.0 * u) * ((u - s) * (2.0 * PI) / ELASTIC_PERIOD).sin())
}

fn elastic_out(t: f32) -> f32 {
    if t <= 0.0 || t >= 1.0 {
        return t.clamp(0.0, 1.0);
    }
    let s = ELASTIC_PERIOD / 4.0;
    2f32.powf(-10.0 * t) * ((t - s) * (2.0 * PI) / ELASTIC_PERIOD).sin() + 1.0
}

fn elastic_in_out(t: f32) -> f32 {
    if t <= 0.0 || t >= 1.0 {
        return t.clamp(0.0, 1.0);
    }
    let p = ELASTIC_INOUT_PERIOD;
    let s = p / 4.0;
    let u = t * 2.0 - 1.0;
    let wave = ((u - s) * (2.0 * PI) / p).sin();
    if u < 0.0 {
        -0.5 * 2f32.powf(10.0 * u) * wave
    } else {
        0.5 * 2f32.powf(-10.0 * u) * wave + 1.0
    }
}

fn bounce_out(t: f32) -> f32 {
    if t < 1.0 / BOUNCE_D {
        BOUNCE_N * t * t
    } else if t < 2.0 / BOUNCE_D {
        let u = t - 1.5 / BOUNCE_D;
        BOUNCE_N * u * u + 0.75
    } else if t < 2.5 / BOUNCE_D {
        let u = t - 2.25 / BOUNCE_D;
        BOUNCE_N * u * u + 0.9375
    } else {
        let u = t - 2.625 / BOUNCE_D;
        BOUNCE_N * u * u + 0.984375
    }
}

fn bounce_in(t: f32) -> f32 {
    1.0 - bounce_out(1.0 - t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() <= eps
    }

    #[test]
    fn curves_hit_both_ends() {
        for kind in EasingKind::ALL.into_iter().skip(1) {
            for range in [EasingRange::In, EasingRange::Out, EasingRange::InOut] {
                let e = Easing::curve(kind, range);
                assert!(approx(e.apply(0.0), 0.0, 1e-3), "{kind:?} {range:?} at 0");
                assert!(approx(e.apply(1.0), 1.0, 1e-3), "{kind:?} {range:?} at 1");
            }
        }
    }

    #[test]
    fn hold_never_progresses() {
        assert_eq!(Easing::HOLD.apply(0.5), 0.0);
        assert_eq!(Easing::HOLD.apply(0.99), 0.0);
    }

    #[test]
    fn in_out_is_symmetric_at_midpoint() {
        for kind in [EasingKind::Quad, EasingKind::Cubic, EasingKind::Sine, EasingKind::Circ] {
            let e = Easing::curve(kind, EasingRange::InOut);
            assert!(approx(e.apply(0.5), 0.5, 1e-5), "{kind:?}");
        }
    }

    #[test]
    fn quad_in_matches_closed_form() {
        let e = Easing::curve(EasingKind::Quad, EasingRange::In);
        assert!(approx(e.apply(0.25), 0.0625, 1e-6));
        let e = Easing::curve(EasingKind::Quad, EasingRange::Out);
        assert!(approx(e.apply(0.25), 0.4375, 1e-6));
    }

    #[test]
    fn back_overshoots() {
        let e = Easing::curve(EasingKind::Back, EasingRange::In);
        assert!(e.apply(0.2) < 0.0);
    }

    #[test]
    fn weight_blends_toward_linear() {
        let full = Easing::curve(EasingKind::Cubic, EasingRange::In);
        let half = Easing::new(EasingKind::Cubic, EasingRange::In, 0.5).unwrap();
        let t = 0.5;
        assert!(approx(half.apply(t), 0.5 * full.apply(t) + 0.5 * t, 1e-6));
        assert!(Easing::new(EasingKind::Cubic, EasingRange::In, 1.5).is_err());
    }
}
