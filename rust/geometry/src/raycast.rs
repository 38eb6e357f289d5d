// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vertical ray queries against a triangle soup
//!
//! The extractor only ever casts rays along ±ẑ, so the general
//! ray/triangle test reduces to a 2D point-in-triangle check plus a plane
//! evaluation. Triangles are prefiltered by XY bounding box.

use nalgebra::{Point2, Point3};
use strut_core::TriangleMesh;

struct Triangle {
    p0: Point3<f64>,
    p1: Point3<f64>,
    p2: Point3<f64>,
    min: Point2<f64>,
    max: Point2<f64>,
}

/// Vertical ray caster over a fixed mesh.
pub struct VerticalRayCaster {
    triangles: Vec<Triangle>,
}

impl VerticalRayCaster {
    pub fn new(mesh: &TriangleMesh) -> Self {
        let triangles = mesh
            .faces
            .iter()
            .map(|&[i0, i1, i2]| {
                let p0 = mesh.vertices[i0 as usize];
                let p1 = mesh.vertices[i1 as usize];
                let p2 = mesh.vertices[i2 as usize];
                let min = Point2::new(p0.x.min(p1.x).min(p2.x), p0.y.min(p1.y).min(p2.y));
                let max = Point2::new(p0.x.max(p1.x).max(p2.x), p0.y.max(p1.y).max(p2.y));
                Triangle { p0, p1, p2, min, max }
            })
            .collect();
        Self { triangles }
    }

    /// Whether the caster holds any geometry.
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// First intersection casting +ẑ from `(x, y, z_start)`.
    pub fn first_hit_up(&self, x: f64, y: f64, z_start: f64) -> Option<f64> {
        self.hits(x, y)
            .filter(|&z| z >= z_start)
            .fold(None, |best, z| match best {
                Some(b) if b <= z => Some(b),
                _ => Some(z),
            })
    }

    /// First intersection casting −ẑ from `(x, y, z_start)`.
    pub fn first_hit_down(&self, x: f64, y: f64, z_start: f64) -> Option<f64> {
        self.hits(x, y)
            .filter(|&z| z <= z_start)
            .fold(None, |best, z| match best {
                Some(b) if b >= z => Some(b),
                _ => Some(z),
            })
    }

    /// Z values of all triangle crossings of the vertical line at (x, y).
    fn hits<'a>(&'a self, x: f64, y: f64) -> impl Iterator<Item = f64> + 'a {
        let eps = 1e-12;
        self.triangles.iter().filter_map(move |tri| {
            if x < tri.min.x - eps
                || x > tri.max.x + eps
                || y < tri.min.y - eps
                || y > tri.max.y + eps
            {
                return None;
            }
            // 2D barycentric coordinates in the XY projection.
            let v0 = (tri.p1.x - tri.p0.x, tri.p1.y - tri.p0.y);
            let v1 = (tri.p2.x - tri.p0.x, tri.p2.y - tri.p0.y);
            let v2 = (x - tri.p0.x, y - tri.p0.y);
            let denom = v0.0 * v1.1 - v1.0 * v0.1;
            if denom.abs() < eps {
                // Vertical triangle: no well-defined vertical crossing.
                return None;
            }
            let b1 = (v2.0 * v1.1 - v1.0 * v2.1) / denom;
            let b2 = (v0.0 * v2.1 - v2.0 * v0.1) / denom;
            let b0 = 1.0 - b1 - b2;
            let tol = -1e-9;
            if b0 < tol || b1 < tol || b2 < tol {
                return None;
            }
            Some(b0 * tri.p0.z + b1 * tri.p1.z + b2 * tri.p2.z)
        })
    }
}
