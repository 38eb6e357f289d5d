// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Prismatic extrusion between cap surfaces
//!
//! Support candidates and reconstructed sub-blocks are prisms whose caps
//! are not flat: each 2D vertex carries its own top and bottom height from
//! a vertical projection. The side walls stay exactly vertical, which the
//! downstream skin generator relies on to separate walls from caps.

use nalgebra::{Point2, Point3};
use rustc_hash::FxHashSet;
use strut_core::TriangleMesh;

use crate::error::{Error, Result};
use crate::triangulation::{triangulate_polygon, Triangulation2};

/// Extrude a triangulated 2D region into a closed prism with per-vertex
/// cap heights. `top_z[i]` and `bottom_z[i]` give the cap heights above
/// the 2D vertex `i`.
pub fn extrude_between_caps(
    triangulation: &Triangulation2,
    top_z: &[f64],
    bottom_z: &[f64],
) -> Result<TriangleMesh> {
    let n = triangulation.points.len();
    if n < 3 || triangulation.faces.is_empty() {
        return Err(Error::EmptyMesh("nothing to extrude".to_string()));
    }
    if top_z.len() != n || bottom_z.len() != n {
        return Err(Error::InvalidPolygon(format!(
            "cap height count mismatch: {} points, {} top, {} bottom",
            n,
            top_z.len(),
            bottom_z.len()
        )));
    }

    let mut mesh = TriangleMesh::with_capacity(n * 2, triangulation.faces.len() * 2 + n * 2);

    // Bottom vertices [0, n), top vertices [n, 2n).
    for (p, &z) in triangulation.points.iter().zip(bottom_z) {
        mesh.add_vertex(Point3::new(p.x, p.y, z));
    }
    for (p, &z) in triangulation.points.iter().zip(top_z) {
        mesh.add_vertex(Point3::new(p.x, p.y, z));
    }

    // Caps: 2D faces are counter-clockwise, so the top cap keeps the
    // winding (+z) and the bottom cap reverses it (−z).
    for &[i0, i1, i2] in &triangulation.faces {
        mesh.add_face(i0, i2, i1);
        mesh.add_face(n as u32 + i0, n as u32 + i1, n as u32 + i2);
    }

    // Side walls along boundary edges (directed edges used exactly once).
    for (a, b) in boundary_edges(triangulation) {
        let (b0, b1) = (a, b);
        let (t0, t1) = (n as u32 + a, n as u32 + b);
        mesh.add_face(b0, b1, t1);
        mesh.add_face(b0, t1, t0);
    }

    Ok(mesh)
}

/// Prismatic extrusion of a polygon with holes: flat bottom at z = 0 and
/// flat top at z = `height`.
pub fn extrude_polygon(
    outer: &[Point2<f64>],
    holes: &[Vec<Point2<f64>>],
    height: f64,
) -> Result<TriangleMesh> {
    if height <= 0.0 {
        return Err(Error::InvalidPolygon(
            "extrusion height must be positive".to_string(),
        ));
    }
    let triangulation = triangulate_polygon(outer, holes)?;
    let n = triangulation.points.len();
    extrude_between_caps(&triangulation, &vec![height; n], &vec![0.0; n])
}

/// Directed boundary edges of a 2D triangulation, in face winding order.
fn boundary_edges(triangulation: &Triangulation2) -> Vec<(u32, u32)> {
    let mut directed: FxHashSet<(u32, u32)> = FxHashSet::default();
    for &[i0, i1, i2] in &triangulation.faces {
        for (a, b) in [(i0, i1), (i1, i2), (i2, i0)] {
            directed.insert((a, b));
        }
    }
    directed
        .iter()
        .filter(|&&(a, b)| !directed.contains(&(b, a)))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(size: f64) -> Vec<Point2<f64>> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(size, 0.0),
            Point2::new(size, size),
            Point2::new(0.0, size),
        ]
    }

    #[test]
    fn test_extrude_square_volume() {
        let mesh = extrude_polygon(&square(10.0), &[], 5.0).unwrap();
        assert!(mesh.is_watertight());
        assert_relative_eq!(mesh.volume(), 500.0, epsilon = 1e-9);
    }

    #[test]
    fn test_extrude_with_hole() {
        let hole = vec![
            Point2::new(4.0, 4.0),
            Point2::new(6.0, 4.0),
            Point2::new(6.0, 6.0),
            Point2::new(4.0, 6.0),
        ];
        let mesh = extrude_polygon(&square(10.0), &[hole], 2.0).unwrap();
        assert!(mesh.is_watertight());
        assert_relative_eq!(mesh.volume(), (100.0 - 4.0) * 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_extrude_between_slanted_caps() {
        let tri = triangulate_polygon(&square(10.0), &[]).unwrap();
        // Slanted top: z = 5 + x / 10, flat bottom at z = 1.
        let top: Vec<f64> = tri.points.iter().map(|p| 5.0 + p.x / 10.0).collect();
        let bottom = vec![1.0; tri.points.len()];
        let mesh = extrude_between_caps(&tri, &top, &bottom).unwrap();
        assert!(mesh.is_watertight());
        // Average height 4.5 over a 100 mm² footprint.
        assert_relative_eq!(mesh.volume(), 450.0, epsilon = 1e-9);
        // Side faces are vertical.
        for (f, normal) in mesh.face_normals().iter().enumerate() {
            let [p0, p1, p2] = mesh.face_points(f);
            let on_side = [p0, p1, p2].iter().all(|p| {
                p.x.abs() < 1e-9
                    || (p.x - 10.0).abs() < 1e-9
                    || p.y.abs() < 1e-9
                    || (p.y - 10.0).abs() < 1e-9
            });
            if on_side && normal.z.abs() < 0.9 {
                assert!(normal.z.abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_cap_count_mismatch() {
        let tri = triangulate_polygon(&square(1.0), &[]).unwrap();
        let result = extrude_between_caps(&tri, &[1.0], &[0.0]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_height() {
        assert!(extrude_polygon(&square(1.0), &[], 0.0).is_err());
    }
}
