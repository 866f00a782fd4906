//! rigkit-posture-core: the document and the per-frame posture solver.
//!
//! A `Document` owns every animatable object together with its timeline,
//! rig, influence map and lattice. `PostureSolver` turns a document and a
//! frame into render-ready geometry, composing skin → FFD → rigid SRT.

pub mod config;
pub mod document;
pub mod object;
pub mod resource;
pub mod solver;

pub use config::DocumentConfig;
pub use document::{Document, RemovedBoneRecord, RemovedObject};
pub use object::{AnimObject, BlendMode, BoneBinding};
pub use resource::ResourceRegistry;
pub use solver::{ObjectPosture, Posture, PostureSolver, SolveDiagnostic};
