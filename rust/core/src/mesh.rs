// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Indexed triangle-mesh data structure
//!
//! Support volumes are constructed, intersected and queried in double
//! precision throughout, so positions are stored as `f64` rather than the
//! GPU-friendly flat `f32` layout. Faces index into the vertex list with
//! counter-clockwise winding when viewed from outside.

use nalgebra::{Matrix4, Point3, Vector3};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

/// Minimum squared cross-product norm below which a face is degenerate.
const DEGENERATE_FACE_EPS: f64 = 1e-12;

/// Indexed triangle mesh.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    /// Vertex positions.
    pub vertices: Vec<Point3<f64>>,
    /// Triangle vertex indices, counter-clockwise seen from outside.
    pub faces: Vec<[u32; 3]>,
}

impl TriangleMesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    /// Create a mesh with reserved capacity.
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
        }
    }

    /// Build a mesh from vertex and face lists.
    pub fn from_parts(vertices: Vec<Point3<f64>>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// Add a vertex and return its index.
    #[inline]
    pub fn add_vertex(&mut self, position: Point3<f64>) -> u32 {
        self.vertices.push(position);
        (self.vertices.len() - 1) as u32
    }

    /// Add a triangle.
    #[inline]
    pub fn add_face(&mut self, i0: u32, i1: u32, i2: u32) {
        self.faces.push([i0, i1, i2]);
    }

    /// Number of vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if the mesh has no geometry.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Corner positions of a face.
    #[inline]
    pub fn face_points(&self, face: usize) -> [Point3<f64>; 3] {
        let [i0, i1, i2] = self.faces[face];
        [
            self.vertices[i0 as usize],
            self.vertices[i1 as usize],
            self.vertices[i2 as usize],
        ]
    }

    /// Unit normal of a face, or `None` for a degenerate face.
    #[inline]
    pub fn face_normal(&self, face: usize) -> Option<Vector3<f64>> {
        let [p0, p1, p2] = self.face_points(face);
        (p1 - p0).cross(&(p2 - p0)).try_normalize(1e-12)
    }

    /// Unit normals for all faces; degenerate faces yield the zero vector.
    pub fn face_normals(&self) -> Vec<Vector3<f64>> {
        (0..self.faces.len())
            .map(|f| self.face_normal(f).unwrap_or_else(Vector3::zeros))
            .collect()
    }

    /// Areas of all faces.
    pub fn face_areas(&self) -> Vec<f64> {
        self.faces
            .iter()
            .map(|&[i0, i1, i2]| {
                let p0 = self.vertices[i0 as usize];
                let p1 = self.vertices[i1 as usize];
                let p2 = self.vertices[i2 as usize];
                (p1 - p0).cross(&(p2 - p0)).norm() * 0.5
            })
            .collect()
    }

    /// Total surface area.
    pub fn area(&self) -> f64 {
        self.face_areas().iter().sum()
    }

    /// Area-weighted vertex normals.
    pub fn vertex_normals(&self) -> Vec<Vector3<f64>> {
        let mut normals = vec![Vector3::zeros(); self.vertices.len()];
        for &[i0, i1, i2] in &self.faces {
            let p0 = self.vertices[i0 as usize];
            let p1 = self.vertices[i1 as usize];
            let p2 = self.vertices[i2 as usize];
            // Cross product magnitude carries the area weighting.
            let n = (p1 - p0).cross(&(p2 - p0));
            normals[i0 as usize] += n;
            normals[i1 as usize] += n;
            normals[i2 as usize] += n;
        }
        for n in &mut normals {
            if let Some(unit) = n.try_normalize(1e-12) {
                *n = unit;
            }
        }
        normals
    }

    /// Vertex-to-vertex adjacency over shared edges.
    pub fn vertex_neighbors(&self) -> Vec<SmallVec<[u32; 8]>> {
        let mut neighbors: Vec<SmallVec<[u32; 8]>> =
            vec![SmallVec::new(); self.vertices.len()];
        let mut push = |a: u32, b: u32| {
            let list = &mut neighbors[a as usize];
            if !list.contains(&b) {
                list.push(b);
            }
        };
        for &[i0, i1, i2] in &self.faces {
            push(i0, i1);
            push(i1, i0);
            push(i1, i2);
            push(i2, i1);
            push(i2, i0);
            push(i0, i2);
        }
        neighbors
    }

    /// Axis-aligned bounds, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = *self.vertices.first()?;
        let mut min = first;
        let mut max = first;
        for v in &self.vertices[1..] {
            min.x = min.x.min(v.x);
            min.y = min.y.min(v.y);
            min.z = min.z.min(v.z);
            max.x = max.x.max(v.x);
            max.y = max.y.max(v.y);
            max.z = max.z.max(v.z);
        }
        Some((min, max))
    }

    /// Translate all vertices.
    pub fn translate(&mut self, offset: Vector3<f64>) {
        for v in &mut self.vertices {
            *v += offset;
        }
    }

    /// Apply a homogeneous transformation to all vertices.
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        for v in &mut self.vertices {
            *v = matrix.transform_point(v);
        }
    }

    /// Signed volume via the divergence theorem. Positive for a closed,
    /// outward-oriented mesh.
    pub fn volume(&self) -> f64 {
        let mut volume = 0.0;
        for &[i0, i1, i2] in &self.faces {
            let p0 = self.vertices[i0 as usize].coords;
            let p1 = self.vertices[i1 as usize].coords;
            let p2 = self.vertices[i2 as usize].coords;
            volume += p0.dot(&p1.cross(&p2));
        }
        volume / 6.0
    }

    /// A mesh is watertight when every undirected edge is referenced by
    /// exactly two faces.
    pub fn is_watertight(&self) -> bool {
        if self.is_empty() {
            return false;
        }
        let mut edge_count: FxHashMap<(u32, u32), u32> = FxHashMap::default();
        for &[i0, i1, i2] in &self.faces {
            for (a, b) in [(i0, i1), (i1, i2), (i2, i0)] {
                let key = if a < b { (a, b) } else { (b, a) };
                *edge_count.entry(key).or_insert(0) += 1;
            }
        }
        edge_count.values().all(|&count| count == 2)
    }

    /// Append another mesh.
    pub fn merge(&mut self, other: &TriangleMesh) {
        if other.is_empty() {
            return;
        }
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.faces.reserve(other.faces.len());
        self.faces
            .extend(other.faces.iter().map(|&[a, b, c]| [a + offset, b + offset, c + offset]));
    }

    /// Merge vertices whose positions agree to `digits` decimal places and
    /// remap faces. Faces collapsing onto fewer than three distinct
    /// vertices are dropped.
    pub fn weld(&mut self, digits: i32) {
        let scale = 10f64.powi(digits);
        let quantize = |p: &Point3<f64>| -> (i64, i64, i64) {
            (
                (p.x * scale).round() as i64,
                (p.y * scale).round() as i64,
                (p.z * scale).round() as i64,
            )
        };

        let mut lookup: FxHashMap<(i64, i64, i64), u32> = FxHashMap::default();
        let mut remap = vec![0u32; self.vertices.len()];
        let mut new_vertices: Vec<Point3<f64>> = Vec::with_capacity(self.vertices.len());

        for (i, v) in self.vertices.iter().enumerate() {
            let key = quantize(v);
            let index = *lookup.entry(key).or_insert_with(|| {
                new_vertices.push(*v);
                (new_vertices.len() - 1) as u32
            });
            remap[i] = index;
        }

        self.vertices = new_vertices;
        self.faces.retain_mut(|face| {
            for idx in face.iter_mut() {
                *idx = remap[*idx as usize];
            }
            face[0] != face[1] && face[1] != face[2] && face[2] != face[0]
        });
    }

    /// Drop faces with (near) zero area.
    pub fn remove_degenerate_faces(&mut self) {
        let vertices = &self.vertices;
        self.faces.retain(|&[i0, i1, i2]| {
            let p0 = vertices[i0 as usize];
            let p1 = vertices[i1 as usize];
            let p2 = vertices[i2 as usize];
            (p1 - p0).cross(&(p2 - p0)).norm_squared() > DEGENERATE_FACE_EPS
        });
    }

    /// Drop vertices not referenced by any face.
    pub fn remove_unreferenced_vertices(&mut self) {
        let mut used = vec![false; self.vertices.len()];
        for face in &self.faces {
            for &idx in face {
                used[idx as usize] = true;
            }
        }
        let mut remap = vec![u32::MAX; self.vertices.len()];
        let mut new_vertices = Vec::with_capacity(self.vertices.len());
        for (i, v) in self.vertices.iter().enumerate() {
            if used[i] {
                remap[i] = new_vertices.len() as u32;
                new_vertices.push(*v);
            }
        }
        self.vertices = new_vertices;
        for face in &mut self.faces {
            for idx in face.iter_mut() {
                *idx = remap[*idx as usize];
            }
        }
    }

    /// Weld, drop degenerate faces and unreferenced vertices. Applied to
    /// every CSG result before it is used further.
    pub fn repair(&mut self) {
        self.weld(6);
        self.remove_degenerate_faces();
        self.remove_unreferenced_vertices();
    }

    /// Extract the faces selected by `mask` into a new mesh.
    pub fn submesh(&self, mask: &[bool]) -> TriangleMesh {
        let mut out = TriangleMesh::new();
        let mut remap: FxHashMap<u32, u32> = FxHashMap::default();
        for (face, &keep) in self.faces.iter().zip(mask) {
            if !keep {
                continue;
            }
            let mut indices = [0u32; 3];
            for (slot, &idx) in indices.iter_mut().zip(face) {
                *slot = *remap
                    .entry(idx)
                    .or_insert_with(|| out.add_vertex(self.vertices[idx as usize]));
            }
            out.add_face(indices[0], indices[1], indices[2]);
        }
        out
    }

    /// Split into connected components over shared undirected edges.
    pub fn split_components(&self) -> Vec<TriangleMesh> {
        if self.is_empty() {
            return Vec::new();
        }

        // Union-find over faces joined by shared edges.
        let mut parent: Vec<usize> = (0..self.faces.len()).collect();
        fn find(parent: &mut [usize], x: usize) -> usize {
            let mut root = x;
            while parent[root] != root {
                root = parent[root];
            }
            let mut cur = x;
            while parent[cur] != root {
                let next = parent[cur];
                parent[cur] = root;
                cur = next;
            }
            root
        }

        let mut edge_face: FxHashMap<(u32, u32), usize> = FxHashMap::default();
        for (f, &[i0, i1, i2]) in self.faces.iter().enumerate() {
            for (a, b) in [(i0, i1), (i1, i2), (i2, i0)] {
                let key = if a < b { (a, b) } else { (b, a) };
                match edge_face.get(&key).copied() {
                    Some(other) => {
                        let ra = find(&mut parent, f);
                        let rb = find(&mut parent, other);
                        if ra != rb {
                            parent[ra] = rb;
                        }
                    }
                    None => {
                        edge_face.insert(key, f);
                    }
                }
            }
        }

        let mut groups: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        for f in 0..self.faces.len() {
            let root = find(&mut parent, f);
            groups.entry(root).or_default().push(f);
        }

        let mut components: Vec<TriangleMesh> = groups
            .into_values()
            .map(|faces| {
                let mut mask = vec![false; self.faces.len()];
                for f in faces {
                    mask[f] = true;
                }
                self.submesh(&mask)
            })
            .collect();
        // Deterministic order: largest component first.
        components.sort_by(|a, b| b.triangle_count().cmp(&a.triangle_count()));
        components
    }

    /// Boundary loops of an open mesh: directed edges referenced exactly
    /// once, chained into closed 3D polylines. The face winding is
    /// preserved, so loops of an upward-facing patch run counter-clockwise
    /// seen from above.
    pub fn outline(&self) -> Vec<Vec<Point3<f64>>> {
        // Directed edge (a, b) is a boundary edge when (b, a) never occurs.
        let mut directed: FxHashSet<(u32, u32)> = FxHashSet::default();
        for &[i0, i1, i2] in &self.faces {
            for (a, b) in [(i0, i1), (i1, i2), (i2, i0)] {
                directed.insert((a, b));
            }
        }
        let mut successor: FxHashMap<u32, u32> = FxHashMap::default();
        for &(a, b) in &directed {
            if !directed.contains(&(b, a)) {
                successor.insert(a, b);
            }
        }

        let mut loops = Vec::new();
        loop {
            let start = match successor.keys().next().copied() {
                Some(start) => start,
                None => break,
            };
            let mut ring = vec![start];
            let mut current = start;
            loop {
                match successor.remove(&current) {
                    Some(next) => {
                        if next == start {
                            break;
                        }
                        ring.push(next);
                        current = next;
                    }
                    // Open chain: the patch boundary is not a closed loop.
                    None => {
                        ring.clear();
                        break;
                    }
                }
            }
            if ring.len() >= 3 {
                loops.push(
                    ring.iter()
                        .map(|&idx| self.vertices[idx as usize])
                        .collect(),
                );
            }
        }
        loops
    }

    /// One 4:1 midpoint subdivision pass with welded edge midpoints.
    pub fn subdivide(&self) -> TriangleMesh {
        let mut out = TriangleMesh::with_capacity(
            self.vertices.len() + self.faces.len() * 3 / 2,
            self.faces.len() * 4,
        );
        out.vertices.extend_from_slice(&self.vertices);

        let mut midpoints: FxHashMap<(u32, u32), u32> = FxHashMap::default();
        let mut midpoint = |mesh: &mut TriangleMesh, a: u32, b: u32| -> u32 {
            let key = if a < b { (a, b) } else { (b, a) };
            *midpoints.entry(key).or_insert_with(|| {
                let pa = mesh.vertices[a as usize];
                let pb = mesh.vertices[b as usize];
                mesh.add_vertex(Point3::from((pa.coords + pb.coords) * 0.5))
            })
        };

        for &[i0, i1, i2] in &self.faces {
            let m01 = midpoint(&mut out, i0, i1);
            let m12 = midpoint(&mut out, i1, i2);
            let m20 = midpoint(&mut out, i2, i0);
            out.add_face(i0, m01, m20);
            out.add_face(i1, m12, m01);
            out.add_face(i2, m20, m12);
            out.add_face(m01, m12, m20);
        }
        out
    }
}

/// Axis-aligned box mesh between `min` and `max`, outward-oriented.
pub fn box_mesh(min: Point3<f64>, max: Point3<f64>) -> TriangleMesh {
    let mut mesh = TriangleMesh::with_capacity(8, 12);
    let v = [
        Point3::new(min.x, min.y, min.z),
        Point3::new(max.x, min.y, min.z),
        Point3::new(max.x, max.y, min.z),
        Point3::new(min.x, max.y, min.z),
        Point3::new(min.x, min.y, max.z),
        Point3::new(max.x, min.y, max.z),
        Point3::new(max.x, max.y, max.z),
        Point3::new(min.x, max.y, max.z),
    ];
    for p in v {
        mesh.add_vertex(p);
    }
    let quads = [
        [0u32, 3, 2, 1], // bottom (-Z)
        [4, 5, 6, 7],    // top (+Z)
        [0, 1, 5, 4],    // front (-Y)
        [2, 3, 7, 6],    // back (+Y)
        [0, 4, 7, 3],    // left (-X)
        [1, 2, 6, 5],    // right (+X)
    ];
    for [a, b, c, d] in quads {
        mesh.add_face(a, b, c);
        mesh.add_face(a, c, d);
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_mesh() {
        let mesh = TriangleMesh::new();
        assert!(mesh.is_empty());
        assert!(!mesh.is_watertight());
        assert_eq!(mesh.bounds(), None);
    }

    #[test]
    fn test_box_volume_and_watertight() {
        let mesh = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 3.0, 4.0));
        assert!(mesh.is_watertight());
        assert_relative_eq!(mesh.volume(), 24.0, epsilon = 1e-9);
        assert_relative_eq!(mesh.area(), 2.0 * (6.0 + 8.0 + 12.0), epsilon = 1e-9);
    }

    #[test]
    fn test_box_normals_outward() {
        let mesh = box_mesh(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        for (f, normal) in mesh.face_normals().iter().enumerate() {
            let [p0, p1, p2] = mesh.face_points(f);
            let centroid = (p0.coords + p1.coords + p2.coords) / 3.0;
            // Outward orientation: the normal points away from the origin.
            assert!(normal.dot(&centroid) > 0.0);
        }
    }

    #[test]
    fn test_merge_offsets_indices() {
        let mut a = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let b = box_mesh(Point3::new(5.0, 0.0, 0.0), Point3::new(6.0, 1.0, 1.0));
        a.merge(&b);
        assert_eq!(a.triangle_count(), 24);
        assert!(a.faces.iter().all(|f| f.iter().all(|&i| (i as usize) < a.vertex_count())));
        assert_relative_eq!(a.volume(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_weld_merges_duplicates() {
        let mut mesh = TriangleMesh::new();
        let a = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let c = mesh.add_vertex(Point3::new(0.0, 1.0, 0.0));
        mesh.add_face(a, b, c);
        let b2 = mesh.add_vertex(Point3::new(1.0 + 1e-8, 0.0, 0.0));
        let d = mesh.add_vertex(Point3::new(1.0, 1.0, 0.0));
        mesh.add_face(b2, d, c);
        mesh.weld(4);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn test_split_components() {
        let mut mesh = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        mesh.merge(&box_mesh(Point3::new(10.0, 0.0, 0.0), Point3::new(11.0, 1.0, 1.0)));
        let components = mesh.split_components();
        assert_eq!(components.len(), 2);
        assert!(components.iter().all(|c| c.is_watertight()));
    }

    #[test]
    fn test_outline_of_single_triangle() {
        let mut mesh = TriangleMesh::new();
        let a = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let c = mesh.add_vertex(Point3::new(0.0, 1.0, 0.0));
        mesh.add_face(a, b, c);
        let loops = mesh.outline();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].len(), 3);
    }

    #[test]
    fn test_outline_closed_mesh_has_no_boundary() {
        let mesh = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        assert!(mesh.outline().is_empty());
    }

    #[test]
    fn test_subdivide_preserves_surface() {
        let mesh = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let fine = mesh.subdivide();
        assert_eq!(fine.triangle_count(), mesh.triangle_count() * 4);
        assert_relative_eq!(fine.area(), mesh.area(), epsilon = 1e-9);
        assert_relative_eq!(fine.volume(), mesh.volume(), epsilon = 1e-9);
    }

    #[test]
    fn test_vertex_neighbors() {
        let mesh = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let adjacency = mesh.vertex_neighbors();
        assert_eq!(adjacency.len(), 8);
        // Every cube corner connects to at least its three edge neighbors.
        assert!(adjacency.iter().all(|n| n.len() >= 3));
    }

    #[test]
    fn test_submesh() {
        let mesh = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let normals = mesh.face_normals();
        let mask: Vec<bool> = normals.iter().map(|n| n.z < -0.5).collect();
        let bottom = mesh.submesh(&mask);
        assert_eq!(bottom.triangle_count(), 2);
        assert!(bottom.vertices.iter().all(|v| v.z.abs() < 1e-12));
    }
}
