// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CSG boolean operations over closed triangle meshes
//!
//! Thin adapter around csgrs. The backend occasionally returns non-manifold
//! output for awkward inputs, so every result is passed through the mesh
//! repair pass before it reaches a caller.

use nalgebra::{Point2, Point3, Vector3};
use strut_core::TriangleMesh;

use crate::error::Result;

type CsgMesh = csgrs::mesh::Mesh<()>;

/// Boolean intersection A ∩ B.
pub fn intersect(a: &TriangleMesh, b: &TriangleMesh) -> Result<TriangleMesh> {
    use csgrs::traits::CSG;
    if a.is_empty() || b.is_empty() {
        return Ok(TriangleMesh::new());
    }
    let result = to_csgrs(a).intersection(&to_csgrs(b));
    Ok(from_csgrs(&result))
}

/// Boolean difference A − B.
pub fn difference(a: &TriangleMesh, b: &TriangleMesh) -> Result<TriangleMesh> {
    use csgrs::traits::CSG;
    if a.is_empty() {
        return Ok(TriangleMesh::new());
    }
    if b.is_empty() {
        let mut out = a.clone();
        out.repair();
        return Ok(out);
    }
    let result = to_csgrs(a).difference(&to_csgrs(b));
    Ok(from_csgrs(&result))
}

/// Boolean union A ∪ B.
pub fn union(a: &TriangleMesh, b: &TriangleMesh) -> Result<TriangleMesh> {
    use csgrs::traits::CSG;
    if a.is_empty() {
        let mut out = b.clone();
        out.repair();
        return Ok(out);
    }
    if b.is_empty() {
        let mut out = a.clone();
        out.repair();
        return Ok(out);
    }
    let result = to_csgrs(a).union(&to_csgrs(b));
    Ok(from_csgrs(&result))
}

/// Normalize a possibly messy mesh: round-trip through the backend's
/// polygon soup (re-triangulating any non-triangular output) and repair.
pub fn resolve_self_intersections(mesh: &TriangleMesh) -> TriangleMesh {
    if mesh.is_empty() {
        return TriangleMesh::new();
    }
    from_csgrs(&to_csgrs(mesh))
}

/// Convert the core mesh into csgrs polygon soup.
fn to_csgrs(mesh: &TriangleMesh) -> CsgMesh {
    use csgrs::mesh::{polygon::Polygon, vertex::Vertex};

    let mut polygons = Vec::with_capacity(mesh.faces.len());
    for face in 0..mesh.faces.len() {
        let [p0, p1, p2] = mesh.face_points(face);
        // Skip degenerate triangles to avoid NaN propagation in the BSP.
        let normal = match (p1 - p0).cross(&(p2 - p0)).try_normalize(1e-12) {
            Some(n) => n,
            None => continue,
        };
        let vertices = vec![
            Vertex::new(p0, normal),
            Vertex::new(p1, normal),
            Vertex::new(p2, normal),
        ];
        polygons.push(Polygon::new(vertices, None));
    }
    CsgMesh::from_polygons(&polygons, None)
}

/// Convert csgrs output back into the core mesh, triangulating any
/// non-triangular polygons, and repair.
fn from_csgrs(csg: &CsgMesh) -> TriangleMesh {
    let mut mesh = TriangleMesh::new();

    for polygon in &csg.polygons {
        let vertices = &polygon.vertices;
        if vertices.len() < 3 {
            continue;
        }
        let points: Vec<Point3<f64>> = vertices
            .iter()
            .map(|v| Point3::new(v.pos[0], v.pos[1], v.pos[2]))
            .collect();

        if points.len() == 3 {
            add_triangle(&mut mesh, points[0], points[1], points[2]);
            continue;
        }

        // The polygon's intended orientation, falling back to Newell's
        // method when the stored normal is degenerate.
        let raw_normal = Vector3::new(
            vertices[0].normal[0],
            vertices[0].normal[1],
            vertices[0].normal[2],
        );
        let normal = match raw_normal.try_normalize(1e-10) {
            Some(n) if n.iter().all(|c| c.is_finite()) => n,
            _ => match newell_normal(&points).try_normalize(1e-12) {
                Some(n) => n,
                None => continue,
            },
        };

        let projected = project_to_plane(&points, &normal);
        let triangulated = match crate::triangulation::triangulate_polygon(&projected, &[]) {
            Ok(t) => t,
            Err(_) => continue,
        };
        for &[a, b, c] in &triangulated.faces {
            let (pa, pb, pc) = (
                points[a as usize],
                points[b as usize],
                points[c as usize],
            );
            // Keep the polygon's intended orientation.
            if (pb - pa).cross(&(pc - pa)).dot(&normal) >= 0.0 {
                add_triangle(&mut mesh, pa, pb, pc);
            } else {
                add_triangle(&mut mesh, pa, pc, pb);
            }
        }
    }

    mesh.repair();
    mesh
}

fn add_triangle(mesh: &mut TriangleMesh, p0: Point3<f64>, p1: Point3<f64>, p2: Point3<f64>) {
    let i0 = mesh.add_vertex(p0);
    let i1 = mesh.add_vertex(p1);
    let i2 = mesh.add_vertex(p2);
    mesh.add_face(i0, i1, i2);
}

/// Robust polygon normal (Newell's method).
fn newell_normal(points: &[Point3<f64>]) -> Vector3<f64> {
    let mut normal = Vector3::zeros();
    let n = points.len();
    for i in 0..n {
        let current = &points[i];
        let next = &points[(i + 1) % n];
        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }
    normal
}

/// Project polygon points onto the plane orthonormal basis of `normal`.
fn project_to_plane(points: &[Point3<f64>], normal: &Vector3<f64>) -> Vec<Point2<f64>> {
    // Reference axis least parallel to the normal for a stable basis.
    let abs = [normal.x.abs(), normal.y.abs(), normal.z.abs()];
    let reference = if abs[0] <= abs[1] && abs[0] <= abs[2] {
        Vector3::x()
    } else if abs[1] <= abs[2] {
        Vector3::y()
    } else {
        Vector3::z()
    };
    let u_axis = normal.cross(&reference).normalize();
    let v_axis = normal.cross(&u_axis).normalize();
    let origin = points[0];
    points
        .iter()
        .map(|p| {
            let d = p - origin;
            Point2::new(d.dot(&u_axis), d.dot(&v_axis))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strut_core::box_mesh;

    #[test]
    fn test_intersection_of_overlapping_boxes() {
        let a = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 10.0, 10.0));
        let b = box_mesh(Point3::new(5.0, 0.0, 0.0), Point3::new(15.0, 10.0, 10.0));
        let result = intersect(&a, &b).unwrap();
        assert!(!result.is_empty());
        assert_relative_eq!(result.volume(), 500.0, epsilon = 1.0);
    }

    #[test]
    fn test_intersection_of_disjoint_boxes_is_empty() {
        let a = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let b = box_mesh(Point3::new(10.0, 0.0, 0.0), Point3::new(11.0, 1.0, 1.0));
        let result = intersect(&a, &b).unwrap();
        assert!(result.volume().abs() < 1e-6);
    }

    #[test]
    fn test_difference_removes_overlap() {
        let a = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 10.0, 10.0));
        let b = box_mesh(Point3::new(5.0, 0.0, 0.0), Point3::new(15.0, 10.0, 10.0));
        let result = difference(&a, &b).unwrap();
        assert_relative_eq!(result.volume(), 500.0, epsilon = 1.0);
    }

    #[test]
    fn test_union_of_disjoint_boxes() {
        let a = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let b = box_mesh(Point3::new(10.0, 0.0, 0.0), Point3::new(11.0, 1.0, 1.0));
        let result = union(&a, &b).unwrap();
        assert_relative_eq!(result.volume(), 2.0, epsilon = 1e-3);
    }

    #[test]
    fn test_empty_inputs() {
        let a = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let empty = TriangleMesh::new();
        assert!(intersect(&a, &empty).unwrap().is_empty());
        assert!(difference(&empty, &a).unwrap().is_empty());
        let kept = difference(&a, &empty).unwrap();
        assert_relative_eq!(kept.volume(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_resolve_keeps_volume() {
        let a = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 2.0));
        let resolved = resolve_self_intersections(&a);
        assert_relative_eq!(resolved.volume(), 8.0, epsilon = 1e-6);
    }
}
