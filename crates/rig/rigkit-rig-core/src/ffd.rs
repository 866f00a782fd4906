//! Free-form deformation lattice.
//!
//! The lattice is a regular grid of control points. A point is displaced by
//! the normalized kernel-weighted sum of the displacements of the control
//! points within the basis order's support radius:
//!
//! - kernel `(1 − q²)ⁿ` with `q = d / (support · cell)`
//! - Quadratic: n = 1, support 1 cell
//! - Quartic: n = 2, support 1.5 cells
//! - Octic: n = 4, support 2 cells
//!
//! Weights are normalized, so displacing every control point by `v` moves
//! every covered point by exactly `v`.

use glam::Vec2;
use rigkit_api_core::{Blend, Invalid, RigError};
use serde::{Deserialize, Serialize};

const MATCH_EPS: f32 = 1e-3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasisOrder {
    #[default]
    Quadratic,
    Quartic,
    Octic,
}

impl BasisOrder {
    fn exponent(self) -> i32 {
        match self {
            BasisOrder::Quadratic => 1,
            BasisOrder::Quartic => 2,
            BasisOrder::Octic => 4,
        }
    }

    /// Support radius in cells.
    pub fn support(self) -> f32 {
        match self {
            BasisOrder::Quadratic => 1.0,
            BasisOrder::Quartic => 1.5,
            BasisOrder::Octic => 2.0,
        }
    }

    /// Kernel value at normalized distance `q` (0 at the centre, 1 at the
    /// support edge).
    pub fn falloff(self, q: f32) -> f32 {
        if !(0.0..1.0).contains(&q) {
            return 0.0;
        }
        (1.0 - q * q).powi(self.exponent())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum RemapPolicy {
    /// Discard every authored displacement key.
    Drop,
    /// Carry offsets over to control points at the same position.
    Remap,
}

/// What a structural lattice change did to the authored keys.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LatticeRemap {
    pub remapped_keys: usize,
    pub dropped_keys: usize,
    /// Displaced control points with no counterpart in the new grid, summed
    /// over all keys.
    pub orphaned_points: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FfdLattice {
    pub origin: Vec2,
    pub cell_size: f32,
    pub cols: u32,
    pub rows: u32,
    pub basis: BasisOrder,
}

impl FfdLattice {
    pub fn new(origin: Vec2, cell_size: f32, cols: u32, rows: u32, basis: BasisOrder) -> Result<Self, RigError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(Invalid::InvalidCellSize(cell_size).into());
        }
        Ok(Self {
            origin,
            cell_size,
            cols: cols.max(2),
            rows: rows.max(2),
            basis,
        })
    }

    /// Smallest lattice of `cell_size` cells covering `bounds`.
    pub fn fit(bounds: (Vec2, Vec2), cell_size: f32, basis: BasisOrder) -> Result<Self, RigError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(Invalid::InvalidCellSize(cell_size).into());
        }
        let (lo, hi) = bounds;
        let extent = (hi - lo).max(Vec2::ZERO);
        let cols = (extent.x / cell_size).ceil() as u32 + 1;
        let rows = (extent.y / cell_size).ceil() as u32 + 1;
        Self::new(lo, cell_size, cols, rows, basis)
    }

    pub fn len(&self) -> usize {
        (self.cols * self.rows) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn signature(&self) -> (u32, u32) {
        (self.cols, self.rows)
    }

    pub fn index(&self, col: u32, row: u32) -> usize {
        (row * self.cols + col) as usize
    }

    pub fn control_point(&self, index: usize) -> Vec2 {
        let col = index as u32 % self.cols;
        let row = index as u32 / self.cols;
        self.origin + Vec2::new(col as f32, row as f32) * self.cell_size
    }

    pub fn control_points(&self) -> impl Iterator<Item = Vec2> + '_ {
        (0..self.len()).map(|i| self.control_point(i))
    }

    /// Normalized `(control point, weight)` pairs for a rest-space point.
    pub fn weights_at(&self, pos: Vec2) -> Vec<(usize, f32)> {
        let radius = self.basis.support() * self.cell_size;
        let local = (pos - self.origin) / self.cell_size;
        let reach = self.basis.support().ceil() as i64;
        let (ci, cj) = (local.x.floor() as i64, local.y.floor() as i64);

        let mut out = Vec::new();
        let mut total = 0.0;
        for j in (cj - reach + 1).max(0)..=(cj + reach).min(self.rows as i64 - 1) {
            for i in (ci - reach + 1).max(0)..=(ci + reach).min(self.cols as i64 - 1) {
                let index = self.index(i as u32, j as u32);
                let d = self.control_point(index).distance(pos);
                let w = self.basis.falloff(d / radius);
                if w > 0.0 {
                    out.push((index, w));
                    total += w;
                }
            }
        }
        if total > 0.0 {
            for (_, w) in &mut out {
                *w /= total;
            }
        }
        out
    }

    pub fn check(&self, disp: &FfdDisplacement) -> Result<(), RigError> {
        if disp.signature() != self.signature() || disp.offsets.len() != self.len() {
            return Err(Invalid::LatticeMismatch {
                expected: self.signature(),
                found: disp.signature(),
            }
            .into());
        }
        Ok(())
    }

    /// Displacement of a rest-space point under `disp`.
    pub fn displacement_at(&self, pos: Vec2, disp: &FfdDisplacement) -> Result<Vec2, RigError> {
        self.check(disp)?;
        Ok(self
            .weights_at(pos)
            .into_iter()
            .map(|(i, w)| disp.offsets[i] * w)
            .sum())
    }

    pub fn deform(&self, points: &mut [Vec2], disp: &FfdDisplacement) -> Result<(), RigError> {
        self.check(disp)?;
        if disp.is_zero() {
            return Ok(());
        }
        for p in points.iter_mut() {
            let offset: Vec2 = self
                .weights_at(*p)
                .into_iter()
                .map(|(i, w)| disp.offsets[i] * w)
                .sum();
            *p += offset;
        }
        Ok(())
    }

    /// Nearest deformed control point within `radius`.
    pub fn pick(&self, point: Vec2, radius: f32, disp: &FfdDisplacement) -> Option<usize> {
        (0..self.len())
            .map(|i| {
                let offset = disp.offsets.get(i).copied().unwrap_or(Vec2::ZERO);
                (i, (self.control_point(i) + offset).distance(point))
            })
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    /// Same grid with a different cell size or basis, anchored at the same
    /// origin and covering at least the same area.
    pub fn restructured(&self, cell_size: f32, basis: BasisOrder) -> Result<Self, RigError> {
        let hi = self.control_point(self.len().saturating_sub(1));
        Self::fit((self.origin, hi), cell_size, basis)
    }

    /// Carry `disp` over to `target`. Returns the new displacement and the
    /// number of displaced points that had no counterpart.
    pub fn remap(&self, target: &FfdLattice, disp: &FfdDisplacement) -> (FfdDisplacement, usize) {
        let mut out = FfdDisplacement::zero(target);
        let mut matched = vec![false; self.len()];
        for (ti, slot) in out.offsets.iter_mut().enumerate() {
            let p = target.control_point(ti);
            let hit = (0..self.len()).find(|&i| self.control_point(i).distance(p) <= MATCH_EPS);
            if let Some(i) = hit {
                *slot = disp.offsets.get(i).copied().unwrap_or(Vec2::ZERO);
                matched[i] = true;
            }
        }
        let orphans = disp
            .offsets
            .iter()
            .zip(&matched)
            .filter(|(o, m)| !**m && **o != Vec2::ZERO)
            .count();
        (out, orphans)
    }
}

/// Per-control-point offsets for one lattice shape. Keys carry their grid
/// signature so a key authored for another grid is detected, never
/// reinterpreted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FfdDisplacement {
    pub cols: u32,
    pub rows: u32,
    pub offsets: Vec<Vec2>,
}

impl FfdDisplacement {
    pub fn zero(lattice: &FfdLattice) -> Self {
        Self {
            cols: lattice.cols,
            rows: lattice.rows,
            offsets: vec![Vec2::ZERO; lattice.len()],
        }
    }

    pub fn signature(&self) -> (u32, u32) {
        (self.cols, self.rows)
    }

    pub fn is_zero(&self) -> bool {
        self.offsets.iter().all(|o| *o == Vec2::ZERO)
    }

    pub fn get(&self, index: usize) -> Vec2 {
        self.offsets.get(index).copied().unwrap_or(Vec2::ZERO)
    }

    /// Set one offset. Returns the previous value, `None` when out of range.
    pub fn set(&mut self, index: usize, offset: Vec2) -> Option<Vec2> {
        let slot = self.offsets.get_mut(index)?;
        Some(std::mem::replace(slot, offset))
    }
}

impl Blend for FfdDisplacement {
    /// Component-wise between keys of the same grid; keys of different
    /// grids step.
    fn blend(from: &Self, to: &Self, t: f32) -> Self {
        if from.signature() != to.signature() || from.offsets.len() != to.offsets.len() {
            return from.clone();
        }
        Self {
            cols: from.cols,
            rows: from.rows,
            offsets: from
                .offsets
                .iter()
                .zip(&to.offsets)
                .map(|(a, b)| Vec2::blend(a, b, t))
                .collect(),
        }
    }
}
