// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Height-field analysis for support-column segmentation
//!
//! The combined upper/lower height map of a support candidate is
//! differentiated, blurred and thresholded to find the closed outlines of
//! regions with continuous depth. A discontinuity steeper than the
//! gradient threshold marks the border between independently conformal
//! sub-columns.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::filter::gaussian_blur_f32;
use nalgebra::Point2;

use crate::raster::HeightMap;

/// Combine the upper and lower projections of a support candidate:
/// wherever the lower map saw geometry, it wins. Coverage is the
/// rasterizer's per-pixel flag, so lower-surface hits near the build
/// plate are kept like any other.
pub fn combine_height_maps(upper: &HeightMap, lower: &HeightMap) -> HeightMap {
    debug_assert_eq!(upper.width, lower.width);
    debug_assert_eq!(upper.height, lower.height);
    let mut out = upper.clone();
    for ((value, &low), &seen) in out
        .data
        .iter_mut()
        .zip(&lower.data)
        .zip(&lower.covered)
    {
        if seen {
            *value = low;
        }
    }
    out
}

/// Gradient magnitude with central differences in the interior and
/// one-sided differences at the borders, in height units per pixel.
pub fn gradient_magnitude(map: &HeightMap) -> HeightMap {
    let (w, h) = (map.width, map.height);
    let mut out = HeightMap::filled(map.origin, map.resolution, w, h, 0.0);
    for y in 0..h {
        for x in 0..w {
            let gx = if w == 1 {
                0.0
            } else if x == 0 {
                map.get(1, y) - map.get(0, y)
            } else if x == w - 1 {
                map.get(w - 1, y) - map.get(w - 2, y)
            } else {
                (map.get(x + 1, y) - map.get(x - 1, y)) * 0.5
            };
            let gy = if h == 1 {
                0.0
            } else if y == 0 {
                map.get(x, 1) - map.get(x, 0)
            } else if y == h - 1 {
                map.get(x, h - 1) - map.get(x, h - 2)
            } else {
                (map.get(x, y + 1) - map.get(x, y - 1)) * 0.5
            };
            out.set(x, y, (gx * gx + gy * gy).sqrt());
        }
    }
    out
}

/// Gaussian blur of a height field.
pub fn gaussian_blur(map: &HeightMap, sigma: f64) -> HeightMap {
    let buffer: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::from_raw(
        map.width as u32,
        map.height as u32,
        map.data.iter().map(|&v| v as f32).collect(),
    )
    .expect("height map dimensions match buffer length");

    let blurred = gaussian_blur_f32(&buffer, sigma as f32);

    HeightMap {
        origin: map.origin,
        resolution: map.resolution,
        width: map.width,
        height: map.height,
        data: blurred.into_raw().into_iter().map(|v| v as f64).collect(),
        covered: vec![true; map.width * map.height],
    }
}

/// Closed outlines (in pixel coordinates) of the regions where the blurred
/// gradient stays below `threshold` and the height map is above
/// `min_height`. Each outline bounds one independently conformal
/// sub-column.
pub fn smooth_region_outlines(
    gradient: &HeightMap,
    height_map: &HeightMap,
    threshold: f64,
    min_height: f64,
) -> Vec<Vec<Point2<f64>>> {
    debug_assert_eq!(gradient.width, height_map.width);
    debug_assert_eq!(gradient.height, height_map.height);

    let mask_pixels: Vec<u8> = gradient
        .data
        .iter()
        .zip(&height_map.data)
        .map(|(&g, &h)| if g < threshold && h > min_height { 255 } else { 0 })
        .collect();
    let mask = GrayImage::from_raw(gradient.width as u32, gradient.height as u32, mask_pixels)
        .expect("mask dimensions match buffer length");

    find_contours::<i32>(&mask)
        .into_iter()
        .filter(|contour| matches!(contour.border_type, BorderType::Outer))
        .map(|contour| {
            contour
                .points
                .iter()
                .map(|p| Point2::new(p.x as f64, p.y as f64))
                .collect::<Vec<_>>()
        })
        .filter(|ring: &Vec<Point2<f64>>| ring.len() >= 3)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn flat_map(width: usize, height: usize, value: f64) -> HeightMap {
        HeightMap::filled(Point2::new(0.0, 0.0), 1.0, width, height, value)
    }

    #[test]
    fn test_combine_prefers_lower_hits() {
        let upper = flat_map(4, 4, 10.0);
        let mut lower = HeightMap::empty(Point2::new(0.0, 0.0), 1.0, 4, 4);
        lower.set(1, 1, 6.0);
        let combined = combine_height_maps(&upper, &lower);
        assert_relative_eq!(combined.get(1, 1), 6.0);
        assert_relative_eq!(combined.get(2, 2), 10.0);
    }

    #[test]
    fn test_combine_keeps_hits_near_the_plate() {
        // Lower-surface hits close to z = 0 are real data and must win
        // over the upper map.
        let upper = flat_map(4, 4, 10.0);
        let mut lower = HeightMap::empty(Point2::new(0.0, 0.0), 1.0, 4, 4);
        lower.set(0, 0, 0.0);
        lower.set(1, 1, 0.4);
        let combined = combine_height_maps(&upper, &lower);
        assert_relative_eq!(combined.get(0, 0), 0.0);
        assert_relative_eq!(combined.get(1, 1), 0.4);
        assert_relative_eq!(combined.get(3, 3), 10.0);
    }

    #[test]
    fn test_gradient_of_flat_field_is_zero() {
        let map = flat_map(8, 8, 5.0);
        let grad = gradient_magnitude(&map);
        assert!(grad.data.iter().all(|&g| g.abs() < 1e-12));
    }

    #[test]
    fn test_gradient_of_step() {
        let mut map = flat_map(8, 8, 0.0);
        for y in 0..8 {
            for x in 4..8 {
                map.set(x, y, 10.0);
            }
        }
        let grad = gradient_magnitude(&map);
        // Central difference across the step sees half the jump.
        assert_relative_eq!(grad.get(4, 4), 5.0, epsilon = 1e-12);
        assert!(grad.get(1, 4) < 1e-12);
    }

    #[test]
    fn test_blur_preserves_constant() {
        let map = flat_map(10, 10, 3.0);
        let blurred = gaussian_blur(&map, 1.0);
        for &v in &blurred.data {
            assert_relative_eq!(v, 3.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_two_plateaus_give_two_outlines() {
        let mut map = flat_map(40, 40, 0.5);
        for y in 3..37 {
            for x in 3..17 {
                map.set(x, y, 10.0);
            }
            for x in 23..37 {
                map.set(x, y, 6.0);
            }
        }
        let grad = gaussian_blur(&gradient_magnitude(&map), 1.0);
        let outlines = smooth_region_outlines(&grad, &map, 0.5, 2.0);
        assert_eq!(outlines.len(), 2, "outlines = {}", outlines.len());
        // Every outline point stays on its plateau.
        for ring in &outlines {
            let xs: Vec<f64> = ring.iter().map(|p| p.x).collect();
            let on_first = xs.iter().all(|&x| x < 20.0);
            let on_second = xs.iter().all(|&x| x > 20.0);
            assert!(on_first || on_second);
        }
    }
}
