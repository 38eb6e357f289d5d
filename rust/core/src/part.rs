// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Input part wrapper
//!
//! A [`Part`] owns the watertight mesh supplied by the host application and
//! caches the derived per-face and per-vertex data the support pipeline
//! queries repeatedly. The convention is Z-up with overhang surfaces facing
//! −Z; the build plate is the plane z = 0.

use nalgebra::{Point3, Vector3};
use smallvec::SmallVec;

use crate::mesh::TriangleMesh;

/// A part to generate support structures for.
#[derive(Debug, Clone)]
pub struct Part {
    name: String,
    mesh: TriangleMesh,
    face_normals: Vec<Vector3<f64>>,
    vertex_normals: Vec<Vector3<f64>>,
    vertex_neighbors: Vec<SmallVec<[u32; 8]>>,
}

impl Part {
    /// Wrap a mesh, caching face normals, vertex normals and adjacency.
    pub fn new(name: impl Into<String>, mesh: TriangleMesh) -> Self {
        let face_normals = mesh.face_normals();
        let vertex_normals = mesh.vertex_normals();
        let vertex_neighbors = mesh.vertex_neighbors();
        Self {
            name: name.into(),
            mesh,
            face_normals,
            vertex_normals,
            vertex_neighbors,
        }
    }

    /// The part name, used in log messages.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The part mesh.
    #[inline]
    pub fn geometry(&self) -> &TriangleMesh {
        &self.mesh
    }

    /// Cached per-face unit normals.
    #[inline]
    pub fn face_normals(&self) -> &[Vector3<f64>] {
        &self.face_normals
    }

    /// Cached per-vertex area-weighted unit normals.
    #[inline]
    pub fn vertex_normals(&self) -> &[Vector3<f64>] {
        &self.vertex_normals
    }

    /// Cached vertex adjacency.
    #[inline]
    pub fn vertex_neighbors(&self) -> &[SmallVec<[u32; 8]>] {
        &self.vertex_neighbors
    }

    /// Axis-aligned bounds of the part.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        self.mesh.bounds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::box_mesh;

    #[test]
    fn test_part_caches() {
        let mesh = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 2.0));
        let part = Part::new("cube", mesh);
        assert_eq!(part.face_normals().len(), 12);
        assert_eq!(part.vertex_normals().len(), 8);
        assert_eq!(part.vertex_neighbors().len(), 8);
        let (min, max) = part.bounds().unwrap();
        assert!(min.z.abs() < 1e-12);
        assert!((max.z - 2.0).abs() < 1e-12);
    }
}
