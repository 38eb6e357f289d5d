// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 2D boolean operations, offsetting and hatch clipping
//!
//! Clipping runs on the i_overlay float API over ring sets. Offsetting is
//! built on top of it: a ring is dilated by unioning it with square-capped
//! edge strokes, and eroded by subtracting the same strokes, which yields
//! square joins. Hatch lines are clipped against ring sets directly with a
//! midpoint parity test, which keeps them as open paths.

use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;
use nalgebra::{Point2, Vector2};

/// A closed 2D contour. Outer rings are counter-clockwise, holes clockwise.
pub type Ring = Vec<Point2<f64>>;

/// One polygon: an outer ring followed by its holes.
pub type Shape = Vec<Ring>;

/// Polygons smaller than this are considered degenerate.
const MIN_AREA_THRESHOLD: f64 = 1e-10;

/// Signed area of a contour. Positive = counter-clockwise.
pub fn signed_area(ring: &[Point2<f64>]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    let n = ring.len();
    for i in 0..n {
        let j = (i + 1) % n;
        area += ring[i].x * ring[j].y;
        area -= ring[j].x * ring[i].y;
    }
    area * 0.5
}

/// Ensure counter-clockwise winding (positive area).
pub fn ensure_ccw(ring: &[Point2<f64>]) -> Ring {
    if signed_area(ring) < 0.0 {
        ring.iter().rev().cloned().collect()
    } else {
        ring.to_vec()
    }
}

/// Ensure clockwise winding (for holes).
pub fn ensure_cw(ring: &[Point2<f64>]) -> Ring {
    if signed_area(ring) > 0.0 {
        ring.iter().rev().cloned().collect()
    } else {
        ring.to_vec()
    }
}

/// Check that a ring encloses a measurable area.
pub fn is_valid_ring(ring: &[Point2<f64>]) -> bool {
    ring.len() >= 3 && signed_area(ring).abs() > MIN_AREA_THRESHOLD
}

/// Point-in-contour test by ray casting.
pub fn point_in_ring(point: &Point2<f64>, ring: &[Point2<f64>]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let n = ring.len();
    let mut j = n - 1;
    for i in 0..n {
        let pi = &ring[i];
        let pj = &ring[j];
        if ((pi.y > point.y) != (pj.y > point.y))
            && (point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Even-odd containment over a full ring set (outer rings and holes mixed).
pub fn point_in_rings(point: &Point2<f64>, rings: &[Ring]) -> bool {
    let mut crossings = 0usize;
    for ring in rings {
        if point_in_ring(point, ring) {
            crossings += 1;
        }
    }
    crossings % 2 == 1
}

/// Bounding box of a ring set.
pub fn rings_bounds(rings: &[Ring]) -> Option<(Point2<f64>, Point2<f64>)> {
    let mut iter = rings.iter().flatten();
    let first = *iter.next()?;
    let mut min = first;
    let mut max = first;
    for p in iter {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    Some((min, max))
}

#[inline]
fn to_path(ring: &[Point2<f64>]) -> Vec<[f64; 2]> {
    ring.iter().map(|p| [p.x, p.y]).collect()
}

#[inline]
fn from_path(path: &[[f64; 2]]) -> Ring {
    path.iter().map(|p| Point2::new(p[0], p[1])).collect()
}

fn to_paths(rings: &[Ring]) -> Vec<Vec<[f64; 2]>> {
    rings.iter().map(|r| to_path(r)).collect()
}

fn from_shapes(shapes: Vec<Vec<Vec<[f64; 2]>>>) -> Vec<Shape> {
    shapes
        .into_iter()
        .map(|shape| {
            shape
                .iter()
                .map(|contour| from_path(contour))
                .filter(|ring| ring.len() >= 3)
                .collect::<Shape>()
        })
        .filter(|shape: &Shape| !shape.is_empty())
        .collect()
}

/// Boolean overlay of two ring sets. Returns polygons grouped as
/// outer-ring-first shapes.
pub fn clip_rings(
    subject: &[Ring],
    clip: &[Ring],
    rule: OverlayRule,
    fill: FillRule,
) -> Vec<Shape> {
    if subject.is_empty() {
        return Vec::new();
    }
    let subject_paths = to_paths(subject);
    let clip_paths = to_paths(clip);
    from_shapes(subject_paths.overlay(&clip_paths, rule, fill))
}

/// Union of two ring sets.
pub fn union_rings(subject: &[Ring], clip: &[Ring]) -> Vec<Shape> {
    if subject.is_empty() {
        return clip_rings(clip, &[], OverlayRule::Subject, FillRule::NonZero);
    }
    clip_rings(subject, clip, OverlayRule::Union, FillRule::NonZero)
}

/// Intersection of two ring sets.
pub fn intersect_rings(subject: &[Ring], clip: &[Ring]) -> Vec<Shape> {
    clip_rings(subject, clip, OverlayRule::Intersect, FillRule::NonZero)
}

/// Difference subject − clip.
pub fn difference_rings(subject: &[Ring], clip: &[Ring]) -> Vec<Shape> {
    clip_rings(subject, clip, OverlayRule::Difference, FillRule::NonZero)
}

/// Flatten shapes back into a plain ring list (outer rings CCW, holes CW).
pub fn shapes_to_rings(shapes: &[Shape]) -> Vec<Ring> {
    let mut rings = Vec::new();
    for shape in shapes {
        for (i, ring) in shape.iter().enumerate() {
            if i == 0 {
                rings.push(ensure_ccw(ring));
            } else {
                rings.push(ensure_cw(ring));
            }
        }
    }
    rings
}

/// Classify a flat ring list into exterior rings and the holes each
/// contains. A ring is a hole when it lies inside an odd number of the
/// other rings.
pub fn sort_exterior_interior(rings: &[Ring]) -> Vec<(Ring, Vec<Ring>)> {
    let valid: Vec<&Ring> = rings.iter().filter(|r| is_valid_ring(r)).collect();
    let mut depth = vec![0usize; valid.len()];
    for (i, ring) in valid.iter().enumerate() {
        // Representative point: the ring's first vertex nudged inward is
        // unnecessary; vertex-in-other-ring parity is enough for disjoint
        // clipping output.
        let probe = ring_interior_point(ring);
        for (j, other) in valid.iter().enumerate() {
            if i != j && point_in_ring(&probe, other) {
                depth[i] += 1;
            }
        }
    }

    let mut result: Vec<(Ring, Vec<Ring>)> = Vec::new();
    let mut owner: Vec<Option<usize>> = vec![None; valid.len()];
    for (i, ring) in valid.iter().enumerate() {
        if depth[i] % 2 == 0 {
            owner[i] = Some(result.len());
            result.push((ensure_ccw(ring), Vec::new()));
        }
    }
    for (i, ring) in valid.iter().enumerate() {
        if depth[i] % 2 == 1 {
            // Attach to the smallest exterior that contains it.
            let probe = ring_interior_point(ring);
            let mut best: Option<(usize, f64)> = None;
            for (j, other) in valid.iter().enumerate() {
                if depth[j] % 2 == 0 && point_in_ring(&probe, other) {
                    let area = signed_area(other).abs();
                    if best.map_or(true, |(_, a)| area < a) {
                        best = Some((j, area));
                    }
                }
            }
            if let Some((j, _)) = best {
                if let Some(slot) = owner[j] {
                    result[slot].1.push(ensure_cw(ring));
                }
            }
        }
    }
    result
}

/// A point in the interior of a ring (centroid of a fan triangle with
/// nonzero area, falling back to the vertex average).
fn ring_interior_point(ring: &[Point2<f64>]) -> Point2<f64> {
    let n = ring.len();
    for i in 1..n - 1 {
        let a = ring[0];
        let b = ring[i];
        let c = ring[i + 1];
        let area = (b - a).perp(&(c - a)) * 0.5;
        if area.abs() > MIN_AREA_THRESHOLD {
            let centroid = Point2::from((a.coords + b.coords + c.coords) / 3.0);
            if point_in_ring(&centroid, ring) {
                return centroid;
            }
        }
    }
    let sum = ring.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords);
    Point2::from(sum / n as f64)
}

/// Square-capped stroke quad around an edge, widened and extended by
/// `radius`. Returned counter-clockwise.
fn edge_stroke(p0: Point2<f64>, p1: Point2<f64>, radius: f64) -> Option<Ring> {
    let dir = (p1 - p0).try_normalize(1e-12)?;
    let normal = Vector2::new(-dir.y, dir.x);
    let a = p0 - dir * radius;
    let b = p1 + dir * radius;
    Some(vec![
        a - normal * radius,
        b - normal * radius,
        b + normal * radius,
        a + normal * radius,
    ])
}

/// Minkowski offset of a polygon ring set by `delta` (positive dilates,
/// negative erodes) with square joins.
pub fn offset_rings(rings: &[Ring], delta: f64) -> Vec<Shape> {
    if rings.is_empty() {
        return Vec::new();
    }
    if delta.abs() < 1e-12 {
        return clip_rings(rings, &[], OverlayRule::Subject, FillRule::NonZero);
    }

    let radius = delta.abs();
    let mut strokes: Vec<Ring> = Vec::new();
    for ring in rings {
        let n = ring.len();
        for i in 0..n {
            if let Some(quad) = edge_stroke(ring[i], ring[(i + 1) % n], radius) {
                strokes.push(ensure_ccw(&quad));
            }
        }
    }

    if delta > 0.0 {
        union_rings(rings, &strokes)
    } else {
        difference_rings(rings, &strokes)
    }
}

/// Thicken open polylines into solid strokes of width `2 · half_width`
/// with square caps, unioned together.
pub fn offset_open_paths(paths: &[Vec<Point2<f64>>], half_width: f64) -> Vec<Shape> {
    let mut strokes: Vec<Ring> = Vec::new();
    for path in paths {
        for pair in path.windows(2) {
            if let Some(quad) = edge_stroke(pair[0], pair[1], half_width) {
                strokes.push(ensure_ccw(&quad));
            }
        }
    }
    if strokes.is_empty() {
        return Vec::new();
    }
    let (first, rest) = strokes.split_at(1);
    union_rings(first, rest)
}

/// Clip line segments against a ring set, keeping the portions inside.
/// Holes are honoured through even-odd midpoint parity.
pub fn clip_lines(
    rings: &[Ring],
    lines: &[[Point2<f64>; 2]],
) -> Vec<[Point2<f64>; 2]> {
    let mut clipped = Vec::new();
    let eps = 1e-10;

    for line in lines {
        let origin = line[0];
        let dir = line[1] - line[0];
        if dir.norm_squared() < eps {
            continue;
        }

        // Parametric intersections with every ring edge, in [0, 1].
        let mut ts: Vec<f64> = vec![0.0, 1.0];
        for ring in rings {
            let n = ring.len();
            for i in 0..n {
                let a = ring[i];
                let b = ring[(i + 1) % n];
                let seg = b - a;
                let cross = dir.perp(&seg);
                if cross.abs() < eps {
                    continue;
                }
                let diff = a - origin;
                let t = diff.perp(&seg) / cross;
                let s = diff.perp(&dir) / cross;
                if s >= -eps && s <= 1.0 + eps && t > 0.0 && t < 1.0 {
                    ts.push(t);
                }
            }
        }

        ts.sort_by(|a, b| a.partial_cmp(b).unwrap());
        for pair in ts.windows(2) {
            let (t0, t1) = (pair[0], pair[1]);
            if t1 - t0 < eps {
                continue;
            }
            let mid = origin + dir * ((t0 + t1) * 0.5);
            if point_in_rings(&mid, rings) {
                clipped.push([origin + dir * t0, origin + dir * t1]);
            }
        }
    }

    clipped
}
