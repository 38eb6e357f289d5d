// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Face orientation queries
//!
//! Two per-face measures drive both overhang classification and the
//! separation of cap and wall faces of extruded volumes: the projection
//! weight `sin(angle(n, ẑ))` (1 for vertical walls, 0 for horizontal
//! caps) and the inclination from +ẑ in degrees (0 = facing up,
//! 180 = facing straight down).

use strut_core::TriangleMesh;

/// `sin` of the angle between each face normal and the +ẑ axis.
/// Vertical side walls weigh ~1, horizontal caps ~0.
pub fn face_z_projection_weight(mesh: &TriangleMesh) -> Vec<f64> {
    mesh.face_normals()
        .iter()
        .map(|n| {
            let nz = n.z.clamp(-1.0, 1.0);
            (1.0 - nz * nz).sqrt()
        })
        .collect()
}

/// Per-face inclination from the +ẑ axis in degrees.
pub fn support_angles(mesh: &TriangleMesh) -> Vec<f64> {
    mesh.face_normals()
        .iter()
        .map(|n| n.z.clamp(-1.0, 1.0).acos().to_degrees())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use strut_core::box_mesh;

    #[test]
    fn test_box_face_weights() {
        let mesh = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let weights = face_z_projection_weight(&mesh);
        let angles = support_angles(&mesh);
        let mut caps = 0;
        let mut sides = 0;
        for (w, a) in weights.iter().zip(&angles) {
            if *w < 1e-9 {
                caps += 1;
                assert!(*a < 1e-6 || (*a - 180.0).abs() < 1e-6);
            } else {
                sides += 1;
                assert_relative_eq!(*w, 1.0, epsilon = 1e-9);
                assert_relative_eq!(*a, 90.0, epsilon = 1e-6);
            }
        }
        assert_eq!(caps, 4);
        assert_eq!(sides, 8);
    }
}
