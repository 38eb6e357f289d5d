// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Depth-map rasterization
//!
//! A CPU scanline rasterizer stands in for a GPU depth read-back: every
//! triangle is sampled at pixel centres of a regular XY grid and the
//! per-pixel extreme Z is kept. `Up` keeps the lowest surface (first hit
//! casting +ẑ from below), `Down` the highest (first hit casting −ẑ from
//! above). Coverage is tracked per pixel: real heights near the
//! background value (z = 0 is a legitimate height for anything touching
//! the build plate) never masquerade as "no hit".

use nalgebra::{Point2, Point3};
use rayon::prelude::*;
use strut_core::TriangleMesh;

/// Value held by pixels no triangle covers. Coverage is tracked
/// separately in [`HeightMap::covered`]; this is only the fill value.
pub const HEIGHT_MAP_BACKGROUND: f64 = 0.0;

/// Vertical projection direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionDirection {
    /// First hit casting +ẑ: keep the minimum surface height.
    Up,
    /// First hit casting −ẑ: keep the maximum surface height.
    Down,
}

/// A sampled height field over an XY window.
#[derive(Debug, Clone)]
pub struct HeightMap {
    /// World position of the (0, 0) pixel centre.
    pub origin: Point2<f64>,
    /// Pixel size in mm.
    pub resolution: f64,
    pub width: usize,
    pub height: usize,
    /// Row-major samples, index `y * width + x`.
    pub data: Vec<f64>,
    /// Whether the sample at the same index holds real data (a triangle
    /// covered the pixel, or the value was assigned explicitly).
    pub covered: Vec<bool>,
}

impl HeightMap {
    /// Create a constant-valued map; every pixel counts as covered.
    pub fn filled(
        origin: Point2<f64>,
        resolution: f64,
        width: usize,
        height: usize,
        value: f64,
    ) -> Self {
        Self {
            origin,
            resolution,
            width,
            height,
            data: vec![value; width * height],
            covered: vec![true; width * height],
        }
    }

    /// Create a map with no coverage; pixels hold the background value.
    pub fn empty(origin: Point2<f64>, resolution: f64, width: usize, height: usize) -> Self {
        Self {
            origin,
            resolution,
            width,
            height,
            data: vec![HEIGHT_MAP_BACKGROUND; width * height],
            covered: vec![false; width * height],
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.data[y * self.width + x]
    }

    /// Assign a sample, marking the pixel covered.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f64) {
        self.data[y * self.width + x] = value;
        self.covered[y * self.width + x] = true;
    }

    /// Whether the pixel holds real data.
    #[inline]
    pub fn is_covered(&self, x: usize, y: usize) -> bool {
        self.covered[y * self.width + x]
    }

    /// World coordinates of a pixel centre.
    #[inline]
    pub fn pixel_to_world(&self, x: f64, y: f64) -> Point2<f64> {
        Point2::new(
            self.origin.x + x * self.resolution,
            self.origin.y + y * self.resolution,
        )
    }

    /// Copy surrounded by a constant margin of `margin` pixels. The
    /// margin counts as covered; interior coverage is preserved.
    pub fn padded(&self, margin: usize, value: f64) -> HeightMap {
        let width = self.width + margin * 2;
        let height = self.height + margin * 2;
        let mut out = HeightMap::filled(
            Point2::new(
                self.origin.x - margin as f64 * self.resolution,
                self.origin.y - margin as f64 * self.resolution,
            ),
            self.resolution,
            width,
            height,
            value,
        );
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = (y + margin) * width + (x + margin);
                out.data[idx] = self.get(x, y);
                out.covered[idx] = self.is_covered(x, y);
            }
        }
        out
    }
}

/// Rasterize a height field of `mesh` over the XY window `[min, max]` at
/// `resolution` mm per pixel.
pub fn project_height_map(
    mesh: &TriangleMesh,
    resolution: f64,
    direction: ProjectionDirection,
    min: Point3<f64>,
    max: Point3<f64>,
) -> HeightMap {
    let width = (((max.x - min.x) / resolution).ceil() as usize).max(1);
    let height = (((max.y - min.y) / resolution).ceil() as usize).max(1);
    let origin = Point2::new(min.x + resolution * 0.5, min.y + resolution * 0.5);

    let mut map = HeightMap::empty(origin, resolution, width, height);

    struct RasterTriangle {
        p0: [f64; 3],
        e1: [f64; 2],
        e2: [f64; 2],
        dz1: f64,
        dz2: f64,
        inv_denom: f64,
        min: [f64; 2],
        max: [f64; 2],
    }

    let triangles: Vec<RasterTriangle> = mesh
        .faces
        .iter()
        .filter_map(|&[i0, i1, i2]| {
            let p0 = mesh.vertices[i0 as usize];
            let p1 = mesh.vertices[i1 as usize];
            let p2 = mesh.vertices[i2 as usize];
            let e1 = [p1.x - p0.x, p1.y - p0.y];
            let e2 = [p2.x - p0.x, p2.y - p0.y];
            let denom = e1[0] * e2[1] - e2[0] * e1[1];
            if denom.abs() < 1e-12 {
                // Vertical triangles project to a line and never own a pixel.
                return None;
            }
            Some(RasterTriangle {
                p0: [p0.x, p0.y, p0.z],
                e1,
                e2,
                dz1: p1.z - p0.z,
                dz2: p2.z - p0.z,
                inv_denom: 1.0 / denom,
                min: [p0.x.min(p1.x).min(p2.x), p0.y.min(p1.y).min(p2.y)],
                max: [p0.x.max(p1.x).max(p2.x), p0.y.max(p1.y).max(p2.y)],
            })
        })
        .collect();

    let HeightMap { data, covered, .. } = &mut map;
    data.par_chunks_mut(width)
        .zip(covered.par_chunks_mut(width))
        .enumerate()
        .for_each(|(iy, (row, seen_row))| {
            let py = origin.y + iy as f64 * resolution;
            for tri in &triangles {
                if py < tri.min[1] || py > tri.max[1] {
                    continue;
                }
                let x_start = (((tri.min[0] - origin.x) / resolution).floor() as isize).max(0);
                let x_end =
                    (((tri.max[0] - origin.x) / resolution).ceil() as isize).min(width as isize - 1);
                for ix in x_start..=x_end {
                    let px = origin.x + ix as f64 * resolution;
                    let dx = px - tri.p0[0];
                    let dy = py - tri.p0[1];
                    let b1 = (dx * tri.e2[1] - tri.e2[0] * dy) * tri.inv_denom;
                    let b2 = (tri.e1[0] * dy - dx * tri.e1[1]) * tri.inv_denom;
                    if b1 < -1e-9 || b2 < -1e-9 || b1 + b2 > 1.0 + 1e-9 {
                        continue;
                    }
                    let z = tri.p0[2] + b1 * tri.dz1 + b2 * tri.dz2;
                    let cell = &mut row[ix as usize];
                    let seen = &mut seen_row[ix as usize];
                    let keep = match direction {
                        ProjectionDirection::Up => !*seen || z < *cell,
                        ProjectionDirection::Down => !*seen || z > *cell,
                    };
                    if keep {
                        *cell = z;
                        *seen = true;
                    }
                }
            }
        });

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strut_core::box_mesh;

    #[test]
    fn test_project_box_down() {
        let mesh = box_mesh(Point3::new(0.0, 0.0, 2.0), Point3::new(10.0, 10.0, 8.0));
        let map = project_height_map(
            &mesh,
            0.5,
            ProjectionDirection::Down,
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(10.0, 10.0, 9.0),
        );
        assert_eq!(map.width, 20);
        assert_eq!(map.height, 20);
        // Interior pixels see the top cap.
        assert_relative_eq!(map.get(10, 10), 8.0, epsilon = 1e-9);
    }

    #[test]
    fn test_project_box_up() {
        let mesh = box_mesh(Point3::new(0.0, 0.0, 2.0), Point3::new(10.0, 10.0, 8.0));
        let map = project_height_map(
            &mesh,
            0.5,
            ProjectionDirection::Up,
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(10.0, 10.0, 9.0),
        );
        assert_relative_eq!(map.get(10, 10), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_height_is_not_background() {
        // Bottom cap exactly at z = 0: the first hit casting upward is
        // 0.0 and must survive the later top-cap samples at z = 5.
        let mesh = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(4.0, 4.0, 5.0));
        let map = project_height_map(
            &mesh,
            0.5,
            ProjectionDirection::Up,
            Point3::new(0.0, 0.0, -1.0),
            Point3::new(4.0, 4.0, 6.0),
        );
        assert!(map.is_covered(4, 4));
        assert_relative_eq!(map.get(4, 4), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_background_outside_footprint() {
        let mesh = box_mesh(Point3::new(4.0, 4.0, 2.0), Point3::new(6.0, 6.0, 8.0));
        let map = project_height_map(
            &mesh,
            0.5,
            ProjectionDirection::Down,
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(10.0, 10.0, 9.0),
        );
        assert!(!map.is_covered(1, 1));
        assert_eq!(map.get(1, 1), HEIGHT_MAP_BACKGROUND);
        assert!(map.is_covered(10, 10));
        assert_relative_eq!(map.get(10, 10), 8.0, epsilon = 1e-9);
    }

    #[test]
    fn test_padded() {
        let mesh = box_mesh(Point3::new(0.0, 0.0, 2.0), Point3::new(4.0, 4.0, 8.0));
        let map = project_height_map(
            &mesh,
            1.0,
            ProjectionDirection::Down,
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(4.0, 4.0, 9.0),
        );
        let padded = map.padded(2, 1.0);
        assert_eq!(padded.width, map.width + 4);
        assert_eq!(padded.get(0, 0), 1.0);
        assert!(padded.is_covered(0, 0));
        assert_relative_eq!(padded.get(4, 4), map.get(2, 2), epsilon = 1e-12);
        assert_eq!(padded.is_covered(4, 4), map.is_covered(2, 2));
    }
}
