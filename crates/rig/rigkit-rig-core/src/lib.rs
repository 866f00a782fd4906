//! rigkit-rig-core: deformation data for one animatable object.
//!
//! - `BoneRig`: bone forest stored as an id arena with a cached
//!   parent-before-child order
//! - `InfluenceMap` + `skinning`: per-vertex bone weights and linear blend
//!   skinning with an explicit rigid remainder
//! - `MeshTopology`: vertex/triangle soup with atomic structural edits
//! - `FfdLattice` + `FfdBrush`: control-point lattice deformation

pub mod bone;
pub mod brush;
pub mod ffd;
pub mod influence;
pub mod mesh;
pub mod rig;
pub mod skinning;

pub use bone::{Bone, BonePose, BoneRest, InfluenceRange, PoseValue};
pub use brush::{BrushKind, FfdBrush};
pub use ffd::{BasisOrder, FfdDisplacement, FfdLattice, LatticeRemap, RemapPolicy};
pub use influence::{BoneWeight, InfluenceMap};
pub use mesh::{Adjacency, MeshTopology, RemovedTriangle, RemovedVertex, SplitRecord};
pub use rig::{BoneRig, BoneTransform, PoseTransforms, RemovedBone};
pub use skinning::{skin_mesh, skin_point};
