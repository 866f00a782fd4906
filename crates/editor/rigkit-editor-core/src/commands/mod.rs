//! Concrete commands, one module per area of the document.
//!
//! Commands that create something allocate its id on first `apply`; `revert`
//! removes it and keeps the removal record so redo puts back the same id at
//! the same position.

mod bone;
mod ffd;
mod influence;
mod mesh;
mod object;
mod timeline;

pub use bone::{AddBone, MoveJoint, RemoveBone, RenameBone, SetBoneParent, SetBoneRange, SetBoneRest};
pub use ffd::{FfdStroke, ReplaceLattice, SetFfdOffset};
pub use influence::{GenerateInfluence, NormalizeVertex, PaintInfluence, SetWeight, TransferBone};
pub use mesh::{AddTriangle, AddVertex, MoveVertex, RemoveTriangle, RemoveVertex, SplitTriangle};
pub use object::{AddObject, RemoveObject, SetBinding, SetBlendMode, SetPivot};
pub use timeline::{DeleteKey, MoveKey, PushKey, SetBonePose, SetDefault, SetKeyEasing};

use rigkit_animation_core::{AttrValue, AttributeKind, Easing};
use rigkit_api_core::{Frame, ObjectId, RigError};
use rigkit_posture_core::Document;
use rigkit_rig_core::FfdDisplacement;

/// A `PushKey` that keys `kind` at `frame` with its current sample, or `None`
/// when `frame` already holds a key. Continuous edits run this first so they
/// always change a key, never the interpolated in-between.
pub fn key_current(
    doc: &Document,
    object: ObjectId,
    kind: AttributeKind,
    frame: Frame,
) -> Result<Option<PushKey>, RigError> {
    let obj = doc.object(object)?;
    if obj.timeline.has_key(kind, frame) {
        return Ok(None);
    }
    let mut value = obj.timeline.sample(kind, frame);
    if let (AttrValue::Ffd(disp), Some(lattice)) = (&mut value, &obj.lattice) {
        if lattice.check(disp).is_err() {
            *disp = FfdDisplacement::zero(lattice);
        }
    }
    Ok(Some(PushKey::new(object, frame, value, Easing::LINEAR)))
}

fn not_applied(what: &str) -> RigError {
    RigError::precondition("history", format!("{what} was reverted before it was applied"))
}
