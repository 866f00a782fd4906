use rigkit_rig_core::FfdBrush;
use serde::{Deserialize, Serialize};

/// Paint / erase settings for bone influence.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluenceBrush {
    pub radius: f32,
    /// Weight added or removed per pointer step at the brush centre.
    pub strength: f32,
}

impl Default for InfluenceBrush {
    fn default() -> Self {
        Self {
            radius: 24.0,
            strength: 0.1,
        }
    }
}

impl InfluenceBrush {
    /// Linear falloff from full strength at the centre to zero at `radius`.
    pub fn amount_at(&self, distance: f32) -> f32 {
        if self.radius <= 0.0 || distance >= self.radius {
            return 0.0;
        }
        self.strength * (1.0 - distance / self.radius)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// History entries kept; the oldest are dropped past this.
    pub undo_limit: usize,
    /// World-space distance for picking vertices, bones and control points.
    pub pick_radius: f32,
    pub brush: FfdBrush,
    pub influence_brush: InfluenceBrush,
    /// Cell size used when a lattice is fitted on first FFD edit.
    pub lattice_cell: f32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            undo_limit: 32,
            pick_radius: 8.0,
            brush: FfdBrush::default(),
            influence_brush: InfluenceBrush::default(),
            lattice_cell: 32.0,
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = EditorConfig::from_json(r#"{ "undo_limit": 5 }"#).unwrap();
        assert_eq!(cfg.undo_limit, 5);
        assert_eq!(cfg.pick_radius, 8.0);
        assert_eq!(cfg.influence_brush, InfluenceBrush::default());
    }

    #[test]
    fn influence_falls_off_to_zero() {
        let brush = InfluenceBrush::default();
        assert!((brush.amount_at(0.0) - 0.1).abs() < 1e-6);
        assert_eq!(brush.amount_at(24.0), 0.0);
        assert!(brush.amount_at(12.0) < brush.amount_at(6.0));
    }
}
