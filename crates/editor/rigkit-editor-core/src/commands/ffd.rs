//! Lattice edits. Offsets are written to the FFD key at a frame (or the
//! default for `None`); the lattice shape itself is swapped as a whole.

use glam::Vec2;
use rigkit_animation_core::KeyedAttribute;
use rigkit_api_core::{Frame, Invalid, ObjectId, RigError};
use rigkit_posture_core::Document;
use rigkit_rig_core::{BasisOrder, FfdBrush, FfdDisplacement, FfdLattice, LatticeRemap, RemapPolicy};

use super::not_applied;
use crate::command::Command;

fn ffd_parts(
    doc: &mut Document,
    object: ObjectId,
    target: Option<Frame>,
) -> Result<(&FfdLattice, &mut FfdDisplacement), RigError> {
    let obj = doc.object_mut(object)?;
    let lattice = obj
        .lattice
        .as_ref()
        .ok_or_else(|| RigError::precondition("ffd", format!("{object} has no lattice")))?;
    let disp = obj.timeline.ffd.target_mut(target).ok_or_else(|| Invalid::KeyNotFound {
        frame: target.unwrap_or_default(),
    })?;
    lattice.check(disp)?;
    Ok((lattice, disp))
}

fn set_offset(disp: &mut FfdDisplacement, index: usize, offset: Vec2) -> Result<Vec2, RigError> {
    disp.set(index, offset)
        .ok_or_else(|| Invalid::Other(format!("control point {index} is outside the lattice")).into())
}

/// Drag one control point to a new offset.
#[derive(Debug)]
pub struct SetFfdOffset {
    object: ObjectId,
    target: Option<Frame>,
    index: usize,
    offset: Vec2,
    old: Option<Vec2>,
}

impl SetFfdOffset {
    pub fn new(object: ObjectId, target: Option<Frame>, index: usize, offset: Vec2) -> Self {
        Self {
            object,
            target,
            index,
            offset,
            old: None,
        }
    }
}

impl Command for SetFfdOffset {
    fn label(&self) -> String {
        format!("move control point {}", self.index)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let (_, disp) = ffd_parts(doc, self.object, self.target)?;
        self.old = Some(set_offset(disp, self.index, self.offset)?);
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let old = self.old.take().ok_or_else(|| not_applied("move control point"))?;
        let (_, disp) = ffd_parts(doc, self.object, self.target)?;
        set_offset(disp, self.index, old)?;
        Ok(())
    }
}

/// One brush step. The first apply runs the brush; redo replays the exact
/// offsets it produced.
#[derive(Debug)]
pub struct FfdStroke {
    object: ObjectId,
    target: Option<Frame>,
    brush: FfdBrush,
    center: Vec2,
    velocity: Vec2,
    pressure: f32,
    changes: Option<Vec<(usize, Vec2, Vec2)>>,
}

impl FfdStroke {
    pub fn new(
        object: ObjectId,
        target: Option<Frame>,
        brush: FfdBrush,
        center: Vec2,
        velocity: Vec2,
        pressure: f32,
    ) -> Self {
        Self {
            object,
            target,
            brush,
            center,
            velocity,
            pressure,
            changes: None,
        }
    }

    /// Control points moved by the last apply.
    pub fn changed(&self) -> usize {
        self.changes.as_ref().map_or(0, Vec::len)
    }
}

impl Command for FfdStroke {
    fn label(&self) -> String {
        "lattice brush".to_string()
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let (lattice, disp) = ffd_parts(doc, self.object, self.target)?;
        match &self.changes {
            Some(changes) => {
                for (index, _, new) in changes {
                    set_offset(disp, *index, *new)?;
                }
            }
            None => {
                let changes = self
                    .brush
                    .stroke(lattice, disp, self.center, self.velocity, self.pressure);
                self.changes = Some(changes);
            }
        }
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let changes = self.changes.as_ref().ok_or_else(|| not_applied("lattice brush"))?;
        let (_, disp) = ffd_parts(doc, self.object, self.target)?;
        for (index, old, _) in changes.iter().rev() {
            set_offset(disp, *index, *old)?;
        }
        Ok(())
    }
}

/// Swap an object's lattice together with its whole FFD attribute.
#[derive(Debug)]
pub struct ReplaceLattice {
    object: ObjectId,
    label: &'static str,
    lattice: Option<FfdLattice>,
    ffd: KeyedAttribute<FfdDisplacement>,
    old: Option<(Option<FfdLattice>, KeyedAttribute<FfdDisplacement>)>,
}

impl ReplaceLattice {
    /// Fit a fresh lattice to the base mesh. Existing FFD keys are dropped.
    pub fn fit(doc: &Document, object: ObjectId, cell_size: f32, basis: BasisOrder) -> Result<Self, RigError> {
        let lattice = doc.fit_lattice(object, cell_size, basis)?;
        let ffd = KeyedAttribute::new(FfdDisplacement::zero(&lattice));
        Ok(Self {
            object,
            label: "fit lattice",
            lattice: Some(lattice),
            ffd,
            old: None,
        })
    }

    /// Change cell size or basis, carrying keys over per `policy`.
    pub fn restructure(
        doc: &Document,
        object: ObjectId,
        cell_size: f32,
        basis: BasisOrder,
        policy: RemapPolicy,
    ) -> Result<(Self, LatticeRemap), RigError> {
        let (lattice, ffd, report) = doc.restructure_lattice(object, cell_size, basis, policy)?;
        let cmd = Self {
            object,
            label: "restructure lattice",
            lattice: Some(lattice),
            ffd,
            old: None,
        };
        Ok((cmd, report))
    }

    pub fn remove(object: ObjectId) -> Self {
        Self {
            object,
            label: "remove lattice",
            lattice: None,
            ffd: KeyedAttribute::default(),
            old: None,
        }
    }
}

impl Command for ReplaceLattice {
    fn label(&self) -> String {
        self.label.to_string()
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let old = doc.replace_lattice(self.object, self.lattice.clone(), self.ffd.clone())?;
        self.old = Some(old);
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let (lattice, ffd) = self.old.take().ok_or_else(|| not_applied("lattice change"))?;
        doc.replace_lattice(self.object, lattice, ffd)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigkit_rig_core::MeshTopology;

    fn fitted_doc() -> (Document, ObjectId) {
        let mut doc = Document::default();
        let mesh = MeshTopology::grid(Vec2::new(20.0, 20.0), 10.0).unwrap();
        let id = doc.add_object_with_mesh("sheet", mesh);
        let mut fit = ReplaceLattice::fit(&doc, id, 10.0, BasisOrder::Quadratic).unwrap();
        fit.apply(&mut doc).unwrap();
        (doc, id)
    }

    #[test]
    fn fit_installs_zero_displacement() {
        let (doc, id) = fitted_doc();
        let object = doc.object(id).unwrap();
        let lattice = object.lattice.as_ref().unwrap();
        let disp = object.timeline.ffd.default_value();
        assert!(lattice.check(disp).is_ok());
        assert!(disp.is_zero());
    }

    #[test]
    fn stroke_reverts_and_replays_exactly() {
        let (mut doc, id) = fitted_doc();
        let center = doc.object(id).unwrap().lattice.as_ref().unwrap().control_point(0);
        let before = doc.clone();

        let mut stroke = FfdStroke::new(id, None, FfdBrush::default(), center, Vec2::new(3.0, 0.0), 1.0);
        stroke.apply(&mut doc).unwrap();
        assert!(stroke.changed() > 0);
        assert_eq!(doc.object(id).unwrap().timeline.ffd.default_value().get(0), Vec2::new(3.0, 0.0));
        let after = doc.clone();

        stroke.revert(&mut doc).unwrap();
        assert_eq!(doc, before);
        stroke.apply(&mut doc).unwrap();
        assert_eq!(doc, after);
    }

    #[test]
    fn offset_outside_lattice_is_rejected() {
        let (mut doc, id) = fitted_doc();
        let err = SetFfdOffset::new(id, None, 10_000, Vec2::ONE)
            .apply(&mut doc)
            .unwrap_err();
        assert_eq!(err.category(), "structural");
    }

    #[test]
    fn removing_lattice_is_undoable() {
        let (mut doc, id) = fitted_doc();
        let before = doc.clone();
        let mut remove = ReplaceLattice::remove(id);
        remove.apply(&mut doc).unwrap();
        assert!(doc.object(id).unwrap().lattice.is_none());
        remove.revert(&mut doc).unwrap();
        assert_eq!(doc, before);
    }

    #[test]
    fn editing_without_lattice_is_a_precondition() {
        let mut doc = Document::default();
        let id = doc.add_object("bare");
        let err = SetFfdOffset::new(id, None, 0, Vec2::ONE).apply(&mut doc).unwrap_err();
        assert_eq!(err.category(), "precondition");
    }
}
