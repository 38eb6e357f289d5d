// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polyline utilities: arc-length sampling, simplification, smoothing
//!
//! These operate on open polylines; ring variants close the input first
//! where the distinction matters.

use nalgebra::Point2;

/// Arc-length parameterization of an open polyline.
///
/// Used to replicate the tooth profile along an edge run and to unroll
/// support-skin boundaries: positions are queried by distance along the
/// path, clamped to its ends.
pub struct ArcLengthSampler {
    points: Vec<Point2<f64>>,
    cumulative: Vec<f64>,
}

impl ArcLengthSampler {
    pub fn new(points: &[Point2<f64>]) -> Self {
        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0;
        cumulative.push(0.0);
        for pair in points.windows(2) {
            total += (pair[1] - pair[0]).norm();
            cumulative.push(total);
        }
        Self {
            points: points.to_vec(),
            cumulative,
        }
    }

    /// Total path length.
    #[inline]
    pub fn length(&self) -> f64 {
        *self.cumulative.last().unwrap_or(&0.0)
    }

    /// Point at distance `s` along the path, clamped to [0, length].
    pub fn sample(&self, s: f64) -> Point2<f64> {
        let n = self.points.len();
        if n == 1 {
            return self.points[0];
        }
        let s = s.clamp(0.0, self.length());
        let seg = match self
            .cumulative
            .binary_search_by(|c| c.partial_cmp(&s).unwrap())
        {
            Ok(i) => i.min(n - 2),
            Err(i) => i.saturating_sub(1).min(n - 2),
        };
        let span = self.cumulative[seg + 1] - self.cumulative[seg];
        let t = if span > 1e-12 {
            (s - self.cumulative[seg]) / span
        } else {
            0.0
        };
        let a = self.points[seg];
        let b = self.points[seg + 1];
        a + (b - a) * t
    }
}

/// Douglas–Peucker simplification of an open polyline.
pub fn simplify_polyline(points: &[Point2<f64>], tolerance: f64) -> Vec<Point2<f64>> {
    if points.len() <= 2 || tolerance <= 0.0 {
        return points.to_vec();
    }
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;
    let mut stack = vec![(0usize, points.len() - 1)];

    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }
        let a = points[start];
        let b = points[end];
        let ab = b - a;
        let ab_len = ab.norm();
        let mut max_dist = 0.0;
        let mut max_idx = start;
        for (i, p) in points.iter().enumerate().take(end).skip(start + 1) {
            let dist = if ab_len > 1e-12 {
                (ab.perp(&(p - a))).abs() / ab_len
            } else {
                (p - a).norm()
            };
            if dist > max_dist {
                max_dist = dist;
                max_idx = i;
            }
        }
        if max_dist > tolerance {
            keep[max_idx] = true;
            stack.push((start, max_idx));
            stack.push((max_idx, end));
        }
    }

    points
        .iter()
        .zip(&keep)
        .filter(|(_, &k)| k)
        .map(|(p, _)| *p)
        .collect()
}

/// Douglas–Peucker simplification of a closed ring. The ring is split at
/// its two most distant vertices so the closure does not bias the result.
pub fn simplify_ring(ring: &[Point2<f64>], tolerance: f64) -> Vec<Point2<f64>> {
    if ring.len() <= 4 || tolerance <= 0.0 {
        return ring.to_vec();
    }
    // Anchor at the vertex pair furthest apart along the ring order.
    let n = ring.len();
    let mut far = 0;
    let mut max_dist = 0.0;
    for (i, p) in ring.iter().enumerate() {
        let d = (p - ring[0]).norm_squared();
        if d > max_dist {
            max_dist = d;
            far = i;
        }
    }
    if far == 0 {
        return ring.to_vec();
    }

    let first: Vec<Point2<f64>> = ring[0..=far].to_vec();
    let mut second: Vec<Point2<f64>> = ring[far..n].to_vec();
    second.push(ring[0]);

    let mut simplified = simplify_polyline(&first, tolerance);
    let tail = simplify_polyline(&second, tolerance);
    simplified.extend_from_slice(&tail[1..tail.len() - 1]);
    simplified
}

/// One Chaikin corner-cutting pass over a closed ring.
fn chaikin_pass(ring: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let n = ring.len();
    let mut out = Vec::with_capacity(n * 2);
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        out.push(a + (b - a) * 0.25);
        out.push(a + (b - a) * 0.75);
    }
    out
}

/// Smooth a closed ring by corner cutting. Stands in for the spline fit
/// applied to raster outlines before simplification.
pub fn smooth_ring(ring: &[Point2<f64>], iterations: usize) -> Vec<Point2<f64>> {
    if ring.len() < 3 {
        return ring.to_vec();
    }
    let mut out = ring.to_vec();
    for _ in 0..iterations {
        out = chaikin_pass(&out);
    }
    out
}

/// Resample an open polyline at a fixed step, keeping the final point.
pub fn resample_polyline(points: &[Point2<f64>], step: f64) -> Vec<Point2<f64>> {
    if points.len() < 2 || step <= 0.0 {
        return points.to_vec();
    }
    let sampler = ArcLengthSampler::new(points);
    let length = sampler.length();
    if length < step {
        return points.to_vec();
    }
    let count = (length / step).floor() as usize;
    let mut out = Vec::with_capacity(count + 2);
    for i in 0..=count {
        out.push(sampler.sample(i as f64 * step));
    }
    if (length - count as f64 * step) > step * 0.25 {
        out.push(sampler.sample(length));
    }
    out
}

/// Resample a closed ring at a fixed step.
pub fn resample_ring(ring: &[Point2<f64>], step: f64) -> Vec<Point2<f64>> {
    if ring.len() < 3 || step <= 0.0 {
        return ring.to_vec();
    }
    let mut closed = ring.to_vec();
    closed.push(ring[0]);
    let sampler = ArcLengthSampler::new(&closed);
    let length = sampler.length();
    let count = ((length / step).floor() as usize).max(3);
    (0..count)
        .map(|i| sampler.sample(i as f64 * length / count as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sampler_midpoint() {
        let path = vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
        ];
        let sampler = ArcLengthSampler::new(&path);
        assert_relative_eq!(sampler.length(), 20.0);
        let p = sampler.sample(15.0);
        assert_relative_eq!(p.x, 10.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 5.0, epsilon = 1e-12);
        // Clamped beyond both ends.
        assert_relative_eq!(sampler.sample(-5.0).x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(sampler.sample(50.0).y, 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_simplify_collinear() {
        let path: Vec<Point2<f64>> =
            (0..=10).map(|i| Point2::new(i as f64, 0.0)).collect();
        let simplified = simplify_polyline(&path, 0.01);
        assert_eq!(simplified.len(), 2);
    }

    #[test]
    fn test_simplify_keeps_corner() {
        let path = vec![
            Point2::new(0.0, 0.0),
            Point2::new(5.0, 0.0),
            Point2::new(5.0, 5.0),
        ];
        let simplified = simplify_polyline(&path, 0.1);
        assert_eq!(simplified.len(), 3);
    }

    #[test]
    fn test_resample_step() {
        let path = vec![Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)];
        let resampled = resample_polyline(&path, 1.0);
        assert_eq!(resampled.len(), 11);
        assert_relative_eq!(resampled[5].x, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_smooth_ring_shrinks_corners() {
        let ring = vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ];
        let smooth = smooth_ring(&ring, 2);
        assert_eq!(smooth.len(), 16);
        // Corner cutting keeps points within the original box.
        assert!(smooth
            .iter()
            .all(|p| p.x >= 0.0 && p.x <= 10.0 && p.y >= 0.0 && p.y <= 10.0));
    }

    #[test]
    fn test_simplify_ring_square_with_noise() {
        let mut ring = Vec::new();
        for i in 0..=20 {
            ring.push(Point2::new(i as f64 * 0.5, 0.0));
        }
        for i in 0..=20 {
            ring.push(Point2::new(10.0, i as f64 * 0.5));
        }
        for i in (0..=20).rev() {
            ring.push(Point2::new(i as f64 * 0.5, 10.0));
        }
        for i in (1..=20).rev() {
            ring.push(Point2::new(0.0, i as f64 * 0.5));
        }
        let simplified = simplify_ring(&ring, 0.05);
        assert!(simplified.len() <= 6, "len = {}", simplified.len());
    }
}
