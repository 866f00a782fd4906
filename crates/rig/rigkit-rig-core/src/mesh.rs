//! Vertex / triangle soup with incremental, reversible edits.
//!
//! Every triangle references three distinct live vertices. Each structural
//! edit returns a record that is enough to undo it exactly, including the
//! position of the entity in iteration order.

use glam::Vec2;
use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;
use rigkit_api_core::{Blend, IdAllocator, Invalid, RigError, TriangleId, VertexId};
use serde::{Deserialize, Serialize};

const AREA_EPS: f32 = 1e-6;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemovedTriangle {
    pub id: TriangleId,
    pub index: usize,
    pub vertices: [VertexId; 3],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemovedVertex {
    pub id: VertexId,
    pub index: usize,
    pub position: Vec2,
    /// Triangles removed by the cascade, in removal order.
    pub triangles: Vec<RemovedTriangle>,
}

/// Result of a split: the inserted vertex, the triangles rewritten in place
/// (with their previous corners) and the triangles appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitRecord {
    pub vertex: VertexId,
    pub vertex_index: usize,
    pub position: Vec2,
    /// The cut edge, as corner ids of the original triangle.
    pub edge: (VertexId, VertexId),
    pub rewritten: Vec<(TriangleId, [VertexId; 3])>,
    pub created: Vec<(TriangleId, [VertexId; 3])>,
}

/// Derived connectivity. Edge keys are ordered `(low, high)`.
#[derive(Clone, Debug, Default)]
pub struct Adjacency {
    pub edges: HashMap<(VertexId, VertexId), Vec<TriangleId>>,
    pub neighbours: HashMap<VertexId, Vec<VertexId>>,
}

impl Adjacency {
    pub fn triangles_on_edge(&self, a: VertexId, b: VertexId) -> &[TriangleId] {
        self.edges
            .get(&edge_key(a, b))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Edges used by exactly one triangle.
    pub fn boundary_edges(&self) -> Vec<(VertexId, VertexId)> {
        let mut out: Vec<_> = self
            .edges
            .iter()
            .filter(|(_, tris)| tris.len() == 1)
            .map(|(edge, _)| *edge)
            .collect();
        out.sort();
        out
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshTopology {
    vertices: IndexMap<VertexId, Vec2>,
    triangles: IndexMap<TriangleId, [VertexId; 3]>,
    vertex_ids: IdAllocator,
    triangle_ids: IdAllocator,
}

fn edge_key(a: VertexId, b: VertexId) -> (VertexId, VertexId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn signed_area(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    0.5 * (b - a).perp_dot(c - a)
}

fn same_corners(a: &[VertexId; 3], b: &[VertexId; 3]) -> bool {
    let mut a = *a;
    let mut b = *b;
    a.sort();
    b.sort();
    a == b
}

impl MeshTopology {
    pub fn new() -> Self {
        Self::default()
    }

    /// A `size` rectangle anchored at the origin, cut into `cell` squares,
    /// each split into two counter-clockwise triangles.
    pub fn grid(size: Vec2, cell: f32) -> Result<Self, RigError> {
        if !(cell.is_finite() && cell > 0.0) {
            return Err(Invalid::InvalidCellSize(cell).into());
        }
        let cols = (size.x / cell).ceil().max(1.0) as u32;
        let rows = (size.y / cell).ceil().max(1.0) as u32;
        let mut mesh = Self::new();
        let mut ids = Vec::with_capacity(((cols + 1) * (rows + 1)) as usize);
        for j in 0..=rows {
            for i in 0..=cols {
                let p = Vec2::new(
                    (i as f32 * cell).min(size.x.max(cell)),
                    (j as f32 * cell).min(size.y.max(cell)),
                );
                ids.push(mesh.add_vertex(p));
            }
        }
        let at = |i: u32, j: u32| ids[(j * (cols + 1) + i) as usize];
        for j in 0..rows {
            for i in 0..cols {
                let (a, b, c, d) = (at(i, j), at(i + 1, j), at(i + 1, j + 1), at(i, j + 1));
                mesh.add_triangle([a, b, c])?;
                mesh.add_triangle([a, c, d])?;
            }
        }
        Ok(mesh)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn has_triangles(&self) -> bool {
        !self.triangles.is_empty()
    }

    pub fn position(&self, id: VertexId) -> Option<Vec2> {
        self.vertices.get(&id).copied()
    }

    pub fn triangle(&self, id: TriangleId) -> Option<[VertexId; 3]> {
        self.triangles.get(&id).copied()
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, Vec2)> + '_ {
        self.vertices.iter().map(|(id, p)| (*id, *p))
    }

    pub fn triangles(&self) -> impl Iterator<Item = (TriangleId, [VertexId; 3])> + '_ {
        self.triangles.iter().map(|(id, t)| (*id, *t))
    }

    pub fn vertex_index(&self, id: VertexId) -> Option<usize> {
        self.vertices.get_index_of(&id)
    }

    /// Triangles as dense indices into `vertices()` order, for renderers.
    pub fn index_buffer(&self) -> Vec<[u32; 3]> {
        self.triangles
            .values()
            .filter_map(|t| {
                let a = self.vertices.get_index_of(&t[0])?;
                let b = self.vertices.get_index_of(&t[1])?;
                let c = self.vertices.get_index_of(&t[2])?;
                Some([a as u32, b as u32, c as u32])
            })
            .collect()
    }

    /// Raw id the next added vertex will get.
    pub fn next_vertex_id(&self) -> u32 {
        self.vertex_ids.peek()
    }

    /// Never hand out a vertex id below `next`.
    pub fn reserve_vertex_ids(&mut self, next: u32) {
        if let Some(last) = next.checked_sub(1) {
            self.vertex_ids.reserve(last);
        }
    }

    pub fn add_vertex(&mut self, position: Vec2) -> VertexId {
        let id: VertexId = self.vertex_ids.alloc();
        self.vertices.insert(id, position);
        id
    }

    /// Re-insert a vertex under a known id, at `index` in iteration order.
    pub fn insert_vertex(&mut self, id: VertexId, position: Vec2, index: usize) -> Result<(), RigError> {
        if self.vertices.contains_key(&id) {
            return Err(Invalid::DuplicateVertex(id).into());
        }
        self.vertex_ids.reserve(id.raw());
        let index = index.min(self.vertices.len());
        self.vertices.shift_insert(index, id, position);
        Ok(())
    }

    /// Move a vertex's rest position. Returns the previous one.
    pub fn move_vertex(&mut self, id: VertexId, position: Vec2) -> Result<Vec2, RigError> {
        let slot = self
            .vertices
            .get_mut(&id)
            .ok_or(Invalid::MissingVertex(id))?;
        Ok(std::mem::replace(slot, position))
    }

    /// Remove a vertex and every triangle that uses it.
    pub fn remove_vertex(&mut self, id: VertexId) -> Result<RemovedVertex, RigError> {
        if !self.vertices.contains_key(&id) {
            return Err(Invalid::MissingVertex(id).into());
        }
        let dependent: Vec<TriangleId> = self
            .triangles
            .iter()
            .filter(|(_, t)| t.contains(&id))
            .map(|(tid, _)| *tid)
            .collect();
        let mut triangles = Vec::with_capacity(dependent.len());
        for tid in dependent {
            triangles.push(self.remove_triangle(tid)?);
        }
        let (index, _, position) = self
            .vertices
            .shift_remove_full(&id)
            .ok_or(Invalid::MissingVertex(id))?;
        Ok(RemovedVertex {
            id,
            index,
            position,
            triangles,
        })
    }

    pub fn restore_vertex(&mut self, removed: &RemovedVertex) -> Result<(), RigError> {
        self.insert_vertex(removed.id, removed.position, removed.index)?;
        for tri in removed.triangles.iter().rev() {
            self.restore_triangle(tri)?;
        }
        Ok(())
    }

    fn check_triangle(&self, corners: [VertexId; 3], ignore: Option<TriangleId>) -> Result<(), RigError> {
        let [a, b, c] = corners;
        if a == b || b == c || a == c {
            return Err(Invalid::DegenerateTriangle(corners).into());
        }
        let mut points = [Vec2::ZERO; 3];
        for (slot, v) in points.iter_mut().zip(corners) {
            *slot = self.position(v).ok_or(Invalid::MissingVertex(v))?;
        }
        if signed_area(points[0], points[1], points[2]).abs() <= AREA_EPS {
            return Err(Invalid::DegenerateTriangle(corners).into());
        }
        let duplicate = self
            .triangles
            .iter()
            .any(|(tid, t)| Some(*tid) != ignore && same_corners(t, &corners));
        if duplicate {
            return Err(Invalid::DuplicateTriangle(corners).into());
        }
        Ok(())
    }

    /// Add a triangle. Rejects repeated, missing or collinear corners and a
    /// corner set that already forms a triangle; nothing changes on error.
    pub fn add_triangle(&mut self, corners: [VertexId; 3]) -> Result<TriangleId, RigError> {
        self.check_triangle(corners, None)?;
        let id: TriangleId = self.triangle_ids.alloc();
        self.triangles.insert(id, corners);
        Ok(id)
    }

    pub fn insert_triangle(
        &mut self,
        id: TriangleId,
        corners: [VertexId; 3],
        index: usize,
    ) -> Result<(), RigError> {
        if self.triangles.contains_key(&id) {
            return Err(Invalid::DuplicateTriangle(corners).into());
        }
        self.check_triangle(corners, None)?;
        self.triangle_ids.reserve(id.raw());
        let index = index.min(self.triangles.len());
        self.triangles.shift_insert(index, id, corners);
        Ok(())
    }

    pub fn remove_triangle(&mut self, id: TriangleId) -> Result<RemovedTriangle, RigError> {
        let (index, _, vertices) = self
            .triangles
            .shift_remove_full(&id)
            .ok_or(Invalid::MissingTriangle(id))?;
        Ok(RemovedTriangle {
            id,
            index,
            vertices,
        })
    }

    pub fn restore_triangle(&mut self, removed: &RemovedTriangle) -> Result<(), RigError> {
        self.insert_triangle(removed.id, removed.vertices, removed.index)
    }

    /// Insert a vertex at parameter `t` along edge `edge` of a triangle
    /// (edge `i` runs from corner `i` to corner `i + 1`). The triangle and the
    /// neighbour across that edge, if any, are each cut in two with their
    /// winding kept, so the mesh stays free of T-junctions and the covered
    /// area is unchanged.
    pub fn split_triangle(&mut self, id: TriangleId, edge: u8, t: f32) -> Result<SplitRecord, RigError> {
        let (corners, a, b, position) = self.split_site(id, edge, t)?;

        let neighbour = self
            .triangles
            .iter()
            .find(|(tid, tri)| **tid != id && tri.contains(&a) && tri.contains(&b))
            .map(|(tid, tri)| (*tid, *tri));

        let vertex = self.add_vertex(position);
        let mut record = SplitRecord {
            vertex,
            vertex_index: self.vertices.len() - 1,
            position,
            edge: (a, b),
            rewritten: Vec::new(),
            created: Vec::new(),
        };
        let targets = std::iter::once((id, corners)).chain(neighbour);
        for (tid, tri) in targets {
            let (first, second) = halves(tri, a, b, vertex);
            record.rewritten.push((tid, tri));
            self.triangles.insert(tid, first);
            let new_id: TriangleId = self.triangle_ids.alloc();
            self.triangles.insert(new_id, second);
            record.created.push((new_id, second));
        }
        log::trace!("split {id} edge {edge} at {t}: {} triangles cut", record.rewritten.len());
        Ok(record)
    }

    /// Fails exactly when `split_triangle` with the same arguments would.
    pub fn check_split(&self, id: TriangleId, edge: u8, t: f32) -> Result<(), RigError> {
        self.split_site(id, edge, t).map(|_| ())
    }

    fn split_site(
        &self,
        id: TriangleId,
        edge: u8,
        t: f32,
    ) -> Result<([VertexId; 3], VertexId, VertexId, Vec2), RigError> {
        if edge > 2 {
            return Err(Invalid::InvalidEdge(edge).into());
        }
        if !(t > 0.0 && t < 1.0) {
            return Err(Invalid::InvalidSplit(t).into());
        }
        let corners = self.triangle(id).ok_or(Invalid::MissingTriangle(id))?;
        let a = corners[edge as usize];
        let b = corners[(edge as usize + 1) % 3];
        let pa = self.position(a).ok_or(Invalid::MissingVertex(a))?;
        let pb = self.position(b).ok_or(Invalid::MissingVertex(b))?;
        Ok((corners, a, b, pa.lerp(pb, t)))
    }

    /// Re-apply a split with the ids it produced the first time.
    pub fn redo_split(&mut self, record: &SplitRecord) -> Result<(), RigError> {
        self.insert_vertex(record.vertex, record.position, record.vertex_index)?;
        let (a, b) = record.edge;
        for (tid, tri) in &record.rewritten {
            let (first, _) = halves(*tri, a, b, record.vertex);
            let slot = self
                .triangles
                .get_mut(tid)
                .ok_or(Invalid::MissingTriangle(*tid))?;
            *slot = first;
        }
        for (tid, tri) in &record.created {
            self.triangle_ids.reserve(tid.raw());
            self.triangles.insert(*tid, *tri);
        }
        Ok(())
    }

    pub fn undo_split(&mut self, record: &SplitRecord) -> Result<(), RigError> {
        for (tid, _) in record.created.iter().rev() {
            self.triangles
                .shift_remove(tid)
                .ok_or(Invalid::MissingTriangle(*tid))?;
        }
        for (tid, tri) in &record.rewritten {
            let slot = self
                .triangles
                .get_mut(tid)
                .ok_or(Invalid::MissingTriangle(*tid))?;
            *slot = *tri;
        }
        self.vertices
            .shift_remove(&record.vertex)
            .ok_or(Invalid::MissingVertex(record.vertex))?;
        Ok(())
    }

    pub fn adjacency(&self) -> Adjacency {
        let mut adj = Adjacency::default();
        let mut seen: HashSet<(VertexId, VertexId)> = HashSet::new();
        for (tid, tri) in &self.triangles {
            for i in 0..3 {
                let (a, b) = (tri[i], tri[(i + 1) % 3]);
                let key = edge_key(a, b);
                adj.edges.entry(key).or_default().push(*tid);
                if seen.insert(key) {
                    adj.neighbours.entry(a).or_default().push(b);
                    adj.neighbours.entry(b).or_default().push(a);
                }
            }
        }
        adj
    }

    /// Axis-aligned bounds of all vertices, `None` when empty.
    pub fn bounds(&self) -> Option<(Vec2, Vec2)> {
        let mut iter = self.vertices.values();
        let first = *iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p))))
    }

    pub fn centroid(&self) -> Option<Vec2> {
        let (lo, hi) = self.bounds()?;
        Some((lo + hi) * 0.5)
    }

    /// Nearest vertex within `radius` of `point`.
    pub fn pick_vertex(&self, point: Vec2, radius: f32) -> Option<VertexId> {
        self.vertices
            .iter()
            .map(|(id, p)| (*id, p.distance(point)))
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// Triangle containing `point`, plus the edge closest to it.
    pub fn pick_edge(&self, point: Vec2) -> Option<(TriangleId, u8, f32)> {
        for (tid, tri) in &self.triangles {
            let p: Vec<Vec2> = tri.iter().filter_map(|v| self.position(*v)).collect();
            if p.len() != 3 || !point_in_triangle(point, p[0], p[1], p[2]) {
                continue;
            }
            let mut best: Option<(u8, f32, f32)> = None;
            for e in 0..3u8 {
                let (a, b) = (p[e as usize], p[(e as usize + 1) % 3]);
                let ab = b - a;
                let t = ((point - a).dot(ab) / ab.length_squared()).clamp(0.0, 1.0);
                let d = point.distance(a + ab * t);
                if best.map_or(true, |(_, bd, _)| d < bd) {
                    best = Some((e, d, t));
                }
            }
            return best.map(|(e, _, t)| (*tid, e, t.clamp(0.05, 0.95)));
        }
        None
    }

    pub fn validate(&self) -> Result<(), RigError> {
        for tri in self.triangles.values() {
            let [a, b, c] = *tri;
            if a == b || b == c || a == c {
                return Err(Invalid::DegenerateTriangle(*tri).into());
            }
            for v in tri {
                if !self.vertices.contains_key(v) {
                    return Err(Invalid::MissingVertex(*v).into());
                }
            }
        }
        Ok(())
    }
}

/// Mesh keys are topology snapshots and never blend.
impl Blend for MeshTopology {
    fn blend(from: &Self, _to: &Self, _t: f32) -> Self {
        from.clone()
    }

    fn is_stepped() -> bool {
        true
    }
}

fn point_in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let d1 = signed_area(p, a, b);
    let d2 = signed_area(p, b, c);
    let d3 = signed_area(p, c, a);
    let neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(neg && pos)
}

/// Cut `tri` along its `a`-`b` edge at `m`, keeping winding.
fn halves(tri: [VertexId; 3], a: VertexId, b: VertexId, m: VertexId) -> ([VertexId; 3], [VertexId; 3]) {
    let start = (0..3)
        .find(|&i| {
            let (x, y) = (tri[i], tri[(i + 1) % 3]);
            (x == a && y == b) || (x == b && y == a)
        })
        .unwrap_or(0);
    let x = tri[start];
    let y = tri[(start + 1) % 3];
    let z = tri[(start + 2) % 3];
    ([x, m, z], [m, y, z])
}
