//! Per-frame posture solving.
//!
//! For each object, in binding order:
//! 1. sample the timeline
//! 2. pose the rig and skin the mesh
//! 3. displace the skinned points through the FFD lattice
//! 4. apply the object's rigid SRT (about its pivot), preceded by the owner
//!    bone's transform for bound objects
//! 5. attach opacity, depth, blend mode and image
//!
//! The order is fixed for every object.

use glam::{Affine2, Vec2};
use hashbrown::HashMap;
use rigkit_animation_core::ImageValue;
use rigkit_api_core::{BoneId, Frame, ObjectId, ResourceId, RigError, Srt};
use rigkit_rig_core::{skin_mesh, PoseTransforms};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::object::{AnimObject, BlendMode};

/// Render-ready state of one object at one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectPosture {
    pub object: ObjectId,
    pub visible: bool,
    /// Final positions, in the sampled mesh's vertex order.
    pub vertices: Vec<Vec2>,
    pub indices: Vec<[u32; 3]>,
    pub opacity: f32,
    pub depth: f32,
    pub blend_mode: BlendMode,
    pub image: Option<ResourceId>,
    pub image_offset: Vec2,
    /// Object-to-world transform (binding included).
    pub transform: Affine2,
    /// Posed bone segments in world space, for overlays and picking.
    pub bones: Vec<(BoneId, Vec2, Vec2)>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Posture {
    pub frame: Frame,
    pub objects: Vec<ObjectPosture>,
}

impl Posture {
    pub fn get(&self, id: ObjectId) -> Option<&ObjectPosture> {
        self.objects.iter().find(|o| o.object == id)
    }

    /// Objects back to front: ascending depth, ties keep solve order.
    pub fn by_depth(&self) -> Vec<&ObjectPosture> {
        let mut out: Vec<_> = self.objects.iter().collect();
        out.sort_by(|a, b| a.depth.total_cmp(&b.depth));
        out
    }
}

/// Non-fatal problem found while solving.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolveDiagnostic {
    pub object: ObjectId,
    pub frame: Frame,
    pub error: RigError,
}

/// Solved state kept while later objects may still bind to it.
struct Solved {
    transform: Affine2,
    pose: PoseTransforms,
}

#[derive(Debug, Default)]
pub struct PostureSolver {
    last_good: HashMap<ObjectId, ImageValue>,
    diagnostics: Vec<SolveDiagnostic>,
}

impl PostureSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Problems from the most recent `solve`.
    pub fn diagnostics(&self) -> &[SolveDiagnostic] {
        &self.diagnostics
    }

    /// Forget cached images that used `resource`, so the next solve reads
    /// fresh availability.
    pub fn on_resource_changed(&mut self, resource: &ResourceId) {
        self.last_good
            .retain(|_, image| image.resource.as_ref() != Some(resource));
    }

    pub fn solve(&mut self, doc: &Document, frame: Frame) -> Posture {
        self.diagnostics.clear();
        let mut solved: HashMap<ObjectId, Solved> = HashMap::new();
        let mut objects = Vec::with_capacity(doc.len());
        for id in doc.solve_order() {
            let Ok(object) = doc.object(id) else {
                continue;
            };
            let (posture, state) = self.solve_object(doc, object, frame, &solved);
            solved.insert(id, state);
            objects.push(posture);
        }
        Posture { frame, objects }
    }

    fn report(&mut self, object: ObjectId, frame: Frame, error: RigError) {
        log::warn!("{object} at frame {frame}: {error}");
        self.diagnostics.push(SolveDiagnostic {
            object,
            frame,
            error,
        });
    }

    fn solve_object(
        &mut self,
        doc: &Document,
        object: &AnimObject,
        frame: Frame,
        solved: &HashMap<ObjectId, Solved>,
    ) -> (ObjectPosture, Solved) {
        let id = object.id;
        let sample = object.timeline.sample_all(frame);
        let mesh = sample.mesh;

        // 2. skin
        let pose = match &object.rig {
            Some(rig) if !rig.is_empty() => rig.compute_pose(&sample.pose),
            _ => PoseTransforms::default(),
        };
        let mut vertices: Vec<Vec2> = if pose.is_empty() || object.influence.is_empty() {
            mesh.vertices().map(|(_, p)| p).collect()
        } else {
            skin_mesh(mesh, &object.influence, &pose)
                .into_iter()
                .map(|(_, p)| p)
                .collect()
        };

        // 3. FFD
        if let Some(lattice) = &object.lattice {
            if !sample.ffd.offsets.is_empty() {
                if let Err(err) = lattice.deform(&mut vertices, &sample.ffd) {
                    self.report(id, frame, err);
                }
            }
        }

        // 4. rigid SRT, after the owner bone for bound objects
        let srt = Srt::new(sample.movement, sample.rotation, sample.scaling);
        let mut transform = srt.to_affine(object.pivot);
        if let Some(binding) = object.binding {
            let owner = solved.get(&binding.owner).and_then(|owner| {
                owner
                    .pose
                    .skin(binding.bone)
                    .map(|skin| owner.transform * skin)
            });
            match owner {
                Some(parent) => transform = parent * transform,
                None => log::warn!("{id} is bound to missing {}/{}", binding.owner, binding.bone),
            }
        }
        for p in &mut vertices {
            *p = transform.transform_point2(*p);
        }

        let bones = pose
            .iter()
            .map(|(bone, t)| {
                let (a, b) = t.segment();
                (bone, transform.transform_point2(a), transform.transform_point2(b))
            })
            .collect();

        // 5. render attributes
        let image = self.resolve_image(doc, id, frame, sample.image);

        let posture = ObjectPosture {
            object: id,
            visible: object.visible,
            vertices,
            indices: mesh.index_buffer(),
            opacity: sample.opacity,
            depth: sample.depth,
            blend_mode: object.blend_mode,
            image: image.resource.clone(),
            image_offset: image.offset,
            transform,
            bones,
        };
        (posture, Solved { transform, pose })
    }

    /// The keyed image if available, else the last image that was.
    fn resolve_image(&mut self, doc: &Document, id: ObjectId, frame: Frame, keyed: &ImageValue) -> ImageValue {
        let Some(resource) = &keyed.resource else {
            return keyed.clone();
        };
        if doc.resources.is_available(resource) {
            self.last_good.insert(id, keyed.clone());
            return keyed.clone();
        }
        self.report(
            id,
            frame,
            RigError::ResourceUnavailable {
                resource: resource.clone(),
            },
        );
        self.last_good.get(&id).cloned().unwrap_or_default()
    }
}
