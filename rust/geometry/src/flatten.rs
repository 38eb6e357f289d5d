// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Flattening of 3D surface patches into 2D polygons

use nalgebra::Point2;
use strut_core::TriangleMesh;

use crate::bool2d::{ensure_ccw, ensure_cw, signed_area, Ring};
use crate::error::{Error, Result};

/// Project a 3D surface patch to z = 0 and extract its boundary as a 2D
/// polygon with holes. The largest loop by area becomes the exterior;
/// loops contained in it become holes.
///
/// Fails when the patch boundary does not chain into any simple closed
/// loop.
pub fn flatten_support_region(patch: &TriangleMesh) -> Result<(Ring, Vec<Ring>)> {
    let loops = patch.outline();
    if loops.is_empty() {
        return Err(Error::InvalidPolygon(
            "patch boundary is not a simple closed loop".to_string(),
        ));
    }

    let mut rings: Vec<Ring> = loops
        .iter()
        .map(|loop3| {
            loop3
                .iter()
                .map(|p| Point2::new(p.x, p.y))
                .collect::<Ring>()
        })
        .filter(|ring| ring.len() >= 3 && signed_area(ring).abs() > 1e-9)
        .collect();

    if rings.is_empty() {
        return Err(Error::InvalidPolygon(
            "patch outline collapses under projection".to_string(),
        ));
    }

    // Largest ring is the exterior, the rest its holes.
    rings.sort_by(|a, b| {
        signed_area(b)
            .abs()
            .partial_cmp(&signed_area(a).abs())
            .unwrap()
    });
    let outer = ensure_ccw(&rings[0]);
    let holes = rings[1..].iter().map(|r| ensure_cw(r)).collect();
    Ok((outer, holes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;
    use strut_core::box_mesh;

    #[test]
    fn test_flatten_bottom_of_box() {
        let mesh = box_mesh(Point3::new(0.0, 0.0, 5.0), Point3::new(4.0, 3.0, 8.0));
        let normals = mesh.face_normals();
        let mask: Vec<bool> = normals.iter().map(|n| n.z < -0.5).collect();
        let bottom = mesh.submesh(&mask);

        let (outer, holes) = flatten_support_region(&bottom).unwrap();
        assert!(holes.is_empty());
        assert!((signed_area(&outer) - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_flatten_closed_mesh_fails() {
        let mesh = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        assert!(flatten_support_region(&mesh).is_err());
    }
}
