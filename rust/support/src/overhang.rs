// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Overhang classification
//!
//! Identifies the unsupported features of a part: downward-facing surface
//! regions, isolated low points, and sharp downward ridges. Surfaces feed
//! the block-support extractor; points and edges are reported for the
//! host application to treat separately (pin or cone supports).

use rustc_hash::FxHashMap;
use strut_core::{Part, TriangleMesh};
use strut_geometry::support_angles;

use crate::config::CoreTolerances;

/// Faces whose normals satisfy `n · ẑ < −cos(angle)` — steeper downward
/// than the overhang threshold — returned as connected surface patches.
/// The inequality is strict so a zero threshold classifies nothing.
/// With `split_into_components = false` the mask is returned as a single
/// patch.
pub fn find_overhang_surfaces(
    part: &Part,
    overhang_angle: f64,
    split_into_components: bool,
) -> Vec<TriangleMesh> {
    let mesh = part.geometry();
    let threshold = -overhang_angle.to_radians().cos();
    let mask: Vec<bool> = part.face_normals().iter().map(|n| n.z < threshold).collect();

    if !mask.iter().any(|&m| m) {
        return Vec::new();
    }

    let overhang = mesh.submesh(&mask);
    if split_into_components {
        overhang.split_components()
    } else {
        vec![overhang]
    }
}

/// Vertices that require point support: every connected neighbour lies
/// above them (within the point-overhang tolerance) and the vertex normal
/// points downward.
pub fn find_overhang_points(part: &Part, tolerances: &CoreTolerances) -> Vec<u32> {
    let mesh = part.geometry();
    let normals = part.vertex_normals();
    let mut points = Vec::new();

    for (i, neighbors) in part.vertex_neighbors().iter().enumerate() {
        if neighbors.is_empty() {
            continue;
        }
        let z = mesh.vertices[i].z;
        let all_above = neighbors
            .iter()
            .all(|&n| mesh.vertices[n as usize].z - z > -tolerances.point_overhang);
        if all_above && normals[i].z < 0.0 {
            points.push(i as u32);
        }
    }

    points
}

/// Edges that require support: near-horizontal edges forming a sharp
/// downward ridge. An edge qualifies when its inclination magnitude is
/// below `edge_overhang_angle`, the dihedral angle between its two faces
/// exceeds `overhang_angle`, and both faces are themselves steep
/// (inclination from +ẑ above 89°).
pub fn find_overhang_edges(
    part: &Part,
    overhang_angle: f64,
    edge_overhang_angle: f64,
) -> Vec<(u32, u32)> {
    let mesh = part.geometry();
    let theta = support_angles(mesh);
    let normals = part.face_normals();

    // Unique undirected edges with their incident faces.
    let mut edge_faces: FxHashMap<(u32, u32), (usize, Option<usize>)> = FxHashMap::default();
    for (f, &[i0, i1, i2]) in mesh.faces.iter().enumerate() {
        for (a, b) in [(i0, i1), (i1, i2), (i2, i0)] {
            let key = if a < b { (a, b) } else { (b, a) };
            edge_faces
                .entry(key)
                .and_modify(|entry| entry.1 = Some(f))
                .or_insert((f, None));
        }
    }

    let mut edges = Vec::new();
    for (&(a, b), &(f0, f1)) in &edge_faces {
        let f1 = match f1 {
            Some(f1) => f1,
            None => continue,
        };

        let delta = mesh.vertices[a as usize] - mesh.vertices[b as usize];
        let mag = delta.norm();
        if mag < 1e-12 {
            continue;
        }
        let inclination = (delta.z / mag).clamp(-1.0, 1.0).asin().to_degrees();
        if inclination.abs() >= edge_overhang_angle {
            continue;
        }

        let dihedral = normals[f0]
            .dot(&normals[f1])
            .clamp(-1.0, 1.0)
            .acos()
            .to_degrees();
        if dihedral > overhang_angle && theta[f0] > 89.0 && theta[f1] > 89.0 {
            edges.push((a, b));
        }
    }

    edges.sort_unstable();
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;
    use strut_core::box_mesh;

    fn elevated_box() -> Part {
        Part::new(
            "box",
            box_mesh(Point3::new(0.0, 0.0, 10.0), Point3::new(20.0, 10.0, 15.0)),
        )
    }

    #[test]
    fn test_box_bottom_is_one_overhang() {
        let part = elevated_box();
        let regions = find_overhang_surfaces(&part, 45.0, true);
        assert_eq!(regions.len(), 1);
        // Both bottom triangles, 200 mm².
        assert_eq!(regions[0].triangle_count(), 2);
        assert!((regions[0].area() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_angle_classifies_nothing() {
        let part = elevated_box();
        let regions = find_overhang_surfaces(&part, 0.0, true);
        assert!(regions.is_empty());
        // A vertical side wall never qualifies at any threshold.
        let steep = find_overhang_surfaces(&part, 89.0, true);
        let total: f64 = steep.iter().map(|r| r.area()).sum();
        assert!((total - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_overhang_points_of_inverted_pyramid() {
        // Four triangles meeting at a single lowest apex.
        let mut mesh = TriangleMesh::new();
        let apex = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let c0 = mesh.add_vertex(Point3::new(-1.0, -1.0, 2.0));
        let c1 = mesh.add_vertex(Point3::new(1.0, -1.0, 2.0));
        let c2 = mesh.add_vertex(Point3::new(1.0, 1.0, 2.0));
        let c3 = mesh.add_vertex(Point3::new(-1.0, 1.0, 2.0));
        // Wound so the surface faces downward/outward.
        mesh.add_face(apex, c1, c0);
        mesh.add_face(apex, c2, c1);
        mesh.add_face(apex, c3, c2);
        mesh.add_face(apex, c0, c3);

        let part = Part::new("funnel", mesh);
        let points = find_overhang_points(&part, &CoreTolerances::default());
        assert_eq!(points, vec![0]);
    }

    #[test]
    fn test_overhang_edges_of_wedge() {
        // A tent/wedge with a sharp horizontal ridge at the BOTTOM: two
        // steep faces meeting at a downward knife edge.
        let mut mesh = TriangleMesh::new();
        let r0 = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let r1 = mesh.add_vertex(Point3::new(10.0, 0.0, 0.0));
        let a0 = mesh.add_vertex(Point3::new(0.0, -0.2, 5.0));
        let a1 = mesh.add_vertex(Point3::new(10.0, -0.2, 5.0));
        let b0 = mesh.add_vertex(Point3::new(0.0, 0.2, 5.0));
        let b1 = mesh.add_vertex(Point3::new(10.0, 0.2, 5.0));
        // Side A (faces -y), side B (faces +y).
        mesh.add_face(r0, r1, a1);
        mesh.add_face(r0, a1, a0);
        mesh.add_face(r0, b1, r1);
        mesh.add_face(r0, b0, b1);

        let part = Part::new("wedge", mesh);
        let edges = find_overhang_edges(&part, 45.0, 10.0);
        assert_eq!(edges, vec![(0, 1)]);
    }
}
