//! Lattice brush: pushes or relaxes control points under a round brush.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::ffd::{BasisOrder, FfdDisplacement, FfdLattice};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrushKind {
    /// Move control points along the stroke.
    #[default]
    Deform,
    /// Pull displacements back toward zero.
    Erase,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FfdBrush {
    pub kind: BrushKind,
    pub radius: f32,
    /// 0..=1, scaled by pointer pressure per stroke step.
    pub pressure: f32,
    /// Kernel used for the brush falloff.
    pub hardness: BasisOrder,
}

impl Default for FfdBrush {
    fn default() -> Self {
        Self {
            kind: BrushKind::Deform,
            radius: 32.0,
            pressure: 1.0,
            hardness: BasisOrder::Quadratic,
        }
    }
}

impl FfdBrush {
    fn strength(&self, distance: f32, pressure: f32) -> f32 {
        if self.radius <= 0.0 {
            return 0.0;
        }
        self.hardness.falloff(distance / self.radius) * (self.pressure * pressure).clamp(0.0, 1.0)
    }

    /// One stroke step at `center` (in deformed space) moving by `velocity`.
    ///
    /// Returns `(index, old, new)` for every control point that changed.
    pub fn stroke(
        &self,
        lattice: &FfdLattice,
        disp: &mut FfdDisplacement,
        center: Vec2,
        velocity: Vec2,
        pressure: f32,
    ) -> Vec<(usize, Vec2, Vec2)> {
        let mut changed = Vec::new();
        for index in 0..disp.offsets.len().min(lattice.len()) {
            let old = disp.offsets[index];
            let point = lattice.control_point(index) + old;
            let s = self.strength(point.distance(center), pressure);
            if s <= 0.0 {
                continue;
            }
            let new = match self.kind {
                BrushKind::Deform => old + velocity * s,
                BrushKind::Erase => old * (1.0 - s),
            };
            if new != old {
                disp.offsets[index] = new;
                changed.push((index, old, new));
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (FfdLattice, FfdDisplacement) {
        let l = FfdLattice::fit((Vec2::ZERO, Vec2::new(40.0, 40.0)), 10.0, BasisOrder::Quadratic).unwrap();
        let d = FfdDisplacement::zero(&l);
        (l, d)
    }

    #[test]
    fn deform_moves_only_points_under_brush() {
        let (l, mut d) = setup();
        let brush = FfdBrush {
            radius: 12.0,
            ..FfdBrush::default()
        };
        let changed = brush.stroke(&l, &mut d, Vec2::new(20.0, 20.0), Vec2::new(4.0, 0.0), 1.0);
        // centre point plus its four direct neighbours
        assert_eq!(changed.len(), 5);
        assert_eq!(d.get(l.index(2, 2)), Vec2::new(4.0, 0.0));
        assert_eq!(d.get(l.index(0, 0)), Vec2::ZERO);
    }

    #[test]
    fn erase_relaxes_toward_zero() {
        let (l, mut d) = setup();
        let i = l.index(1, 1);
        d.set(i, Vec2::new(2.0, 0.0));
        let brush = FfdBrush {
            kind: BrushKind::Erase,
            radius: 5.0,
            ..FfdBrush::default()
        };
        let changed = brush.stroke(&l, &mut d, Vec2::new(12.0, 10.0), Vec2::ZERO, 1.0);
        assert_eq!(changed.len(), 1);
        assert_eq!(d.get(i), Vec2::ZERO);
    }

    #[test]
    fn zero_pressure_changes_nothing() {
        let (l, mut d) = setup();
        let changed = FfdBrush::default().stroke(&l, &mut d, Vec2::new(20.0, 20.0), Vec2::ONE, 0.0);
        assert!(changed.is_empty());
        assert!(d.is_zero());
    }
}
