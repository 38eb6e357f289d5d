// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Conformal support-skin generation
//!
//! The vertical boundary of a block support is unrolled into a flat
//! (arc-length, z) polygon spanned between the block's upper and lower
//! boundary curves, filled with the same truss-and-border pattern as the
//! interior slices, toothed, triangulated, subdivided, and wrapped back
//! onto the block so it conforms exactly to the top and bottom curves.

use nalgebra::{Point2, Point3, Vector2};
use strut_core::TriangleMesh;
use strut_geometry::bool2d::{
    intersect_rings, offset_rings, rings_bounds, shapes_to_rings, signed_area, union_rings, Ring,
};
use strut_geometry::face_z_projection_weight;
use strut_geometry::paths::resample_ring;
use strut_geometry::triangulation::triangulate_polygon_quality;

use crate::config::{CoreTolerances, TrussConfig};
use crate::error::{Error, Result};
use crate::truss::{stamp_teeth, truss_fill};

/// Boundary resample step of the unrolled skin polygon (mm).
const SKIN_RESAMPLE_STEP: f64 = 0.25;

/// Maximum triangle area of the skin triangulation (mm²).
const SKIN_TRIANGLE_AREA: f64 = 4.0;

/// Faces smaller than this never contribute to wall isolation (mm²).
const MIN_WALL_FACE_AREA: f64 = 1e-6;

/// Generate the conformal truss skins of a support volume, one mesh per
/// matched pair of upper and lower boundary loops.
pub fn generate_support_skins(
    volume: &TriangleMesh,
    cfg: &TrussConfig,
    tolerances: &CoreTolerances,
) -> Result<Vec<TriangleMesh>> {
    // Select the cap faces: everything that is not a vertical side wall.
    let mut caps = volume.clone();
    caps.weld(3);
    let weights = face_z_projection_weight(&caps);
    let areas = caps.face_areas();
    let mask: Vec<bool> = weights
        .iter()
        .zip(&areas)
        .map(|(&w, &a)| a > MIN_WALL_FACE_AREA && w < 1.0 - tolerances.side_face)
        .collect();
    let caps = caps.submesh(&mask);

    let components: Vec<TriangleMesh> = caps
        .split_components()
        .into_iter()
        .filter(|c| c.area() > tolerances.skin_min_wall_area)
        .collect();

    if components.len() != 2 {
        return Err(Error::SkinTopologyAnomaly(format!(
            "wall isolation produced {} surface components, expected 2",
            components.len()
        )));
    }

    let (mut top, mut bottom) = (components[0].clone(), components[1].clone());
    if bottom.bounds().unwrap().0.z > top.bounds().unwrap().0.z {
        std::mem::swap(&mut top, &mut bottom);
    }

    let top_loops = top.outline();
    let bottom_loops = bottom.outline();
    if top_loops.is_empty() || bottom_loops.is_empty() {
        return Err(Error::SkinTopologyAnomaly(
            "cap surfaces have no boundary loops".to_string(),
        ));
    }
    if top_loops.len() != bottom_loops.len() {
        return Err(Error::SkinTopologyAnomaly(format!(
            "boundary loop counts differ: {} top, {} bottom",
            top_loops.len(),
            bottom_loops.len()
        )));
    }

    // Pair loops whose projected lengths agree within the pair tolerance.
    let mut pairs = Vec::new();
    for (i, top_loop) in top_loops.iter().enumerate() {
        let top_len = projected_length(top_loop);
        for (j, bottom_loop) in bottom_loops.iter().enumerate() {
            let bottom_len = projected_length(bottom_loop);
            if bottom_len > 1e-9
                && ((top_len - bottom_len) / bottom_len).abs() < tolerances.pair_matching
            {
                pairs.push((i, j));
            }
        }
    }
    if pairs.is_empty() {
        return Err(Error::SkinTopologyAnomaly(
            "no matching upper/lower boundary pair".to_string(),
        ));
    }

    let mut skins = Vec::new();
    for (i, j) in pairs {
        if let Some(skin) = build_skin(&top_loops[i], &bottom_loops[j], cfg) {
            skins.push(skin);
        }
    }
    Ok(skins)
}

/// Perimeter of a loop's XY projection, closed.
fn projected_length(loop3d: &[Point3<f64>]) -> f64 {
    let n = loop3d.len();
    (0..n)
        .map(|k| {
            let a = loop3d[k];
            let b = loop3d[(k + 1) % n];
            ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
        })
        .sum()
}

/// Unroll one loop pair, fill it, and wrap the result back onto the
/// block boundary.
fn build_skin(
    top_loop: &[Point3<f64>],
    bottom_loop: &[Point3<f64>],
    cfg: &TrussConfig,
) -> Option<TriangleMesh> {
    let top = orient_ccw(top_loop);
    let mut bottom = orient_ccw(bottom_loop);

    // Roll the bottom loop so its start sits nearest the top start.
    let top_start = Point2::new(top[0].x, top[0].y);
    let start = bottom
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            let da = (Point2::new(a.x, a.y) - top_start).norm_squared();
            let db = (Point2::new(b.x, b.y) - top_start).norm_squared();
            da.partial_cmp(&db).unwrap()
        })
        .map(|(k, _)| k)?;
    bottom.rotate_left(start);

    // Unroll: x = cumulative 2D arc length, y = z, spanning the full
    // closed perimeter.
    let top_unrolled = unroll(&top, false);
    let bottom_unrolled = unroll(&bottom, true);

    let top_path = if cfg.use_upper_teeth {
        stamp_teeth(&top_unrolled, cfg, Vector2::new(0.0, 1.0))
    } else {
        top_unrolled.clone()
    };
    // The bottom path is traversed reversed; teeth penetrate downward.
    let bottom_path = if cfg.use_lower_teeth {
        stamp_teeth(&bottom_unrolled, cfg, Vector2::new(0.0, -1.0))
    } else {
        bottom_unrolled.clone()
    };

    let mut ring: Ring = top_path;
    ring.extend(bottom_path);
    if ring.len() < 3 || signed_area(&ring).abs() < 1e-6 {
        return None;
    }
    let ring = resample_ring(&ring, SKIN_RESAMPLE_STEP);

    // Normalize before filling; tooth stamping can nick the boundary.
    let outer_flat = shapes_to_rings(&offset_rings(&[ring.clone()], 0.0));
    if outer_flat.is_empty() {
        return None;
    }

    let walls = if cfg.support_wall_thickness > 1e-5 {
        skin_wall_polygons(&top_unrolled, &bottom_unrolled, &outer_flat, cfg)
    } else {
        Vec::new()
    };

    let grid_bounds = rings_bounds(&outer_flat)?;
    let shapes = truss_fill(&outer_flat, grid_bounds, cfg, &walls);
    if shapes.is_empty() {
        return None;
    }

    // Triangulate the filled polygon in the unrolled plane.
    let mut flat = TriangleMesh::new();
    for shape in &shapes {
        if shape.is_empty() {
            continue;
        }
        let holes: Vec<Ring> = shape[1..].to_vec();
        let tri = match triangulate_polygon_quality(&shape[0], &holes, SKIN_TRIANGLE_AREA) {
            Ok(tri) => tri,
            Err(_) => continue,
        };
        let mut part = TriangleMesh::with_capacity(tri.points.len(), tri.faces.len());
        for p in &tri.points {
            part.add_vertex(Point3::new(p.x, p.y, 0.0));
        }
        for &[a, b, c] in &tri.faces {
            part.add_face(a, b, c);
        }
        flat.merge(&part);
    }
    if flat.is_empty() {
        return None;
    }
    flat.weld(6);

    // Densify so the wrap conforms at corners and apexes.
    for _ in 0..cfg.num_skin_mesh_subdivide_iterations {
        flat = flat.subdivide();
    }

    // Wrap: arc length maps back to the top curve's XY, z comes from the
    // unrolled ordinate. The closing point wraps the seam back onto the
    // loop start.
    let mut top_closed = top.clone();
    top_closed.push(top[0]);
    let arc: Vec<f64> = cumulative_lengths(&top_closed);
    let xs: Vec<f64> = top_closed.iter().map(|p| p.x).collect();
    let ys: Vec<f64> = top_closed.iter().map(|p| p.y).collect();

    let mut skin = TriangleMesh::with_capacity(flat.vertex_count(), flat.triangle_count());
    for v in &flat.vertices {
        let x = interp_clamped(&arc, &xs, v.x);
        let y = interp_clamped(&arc, &ys, v.x);
        skin.add_vertex(Point3::new(x, y, v.y));
    }
    for &face in &flat.faces {
        skin.add_face(face[0], face[1], face[2]);
    }
    skin.repair();
    Some(skin)
}

/// Orient a 3D loop counter-clockwise in its XY projection.
fn orient_ccw(loop3d: &[Point3<f64>]) -> Vec<Point3<f64>> {
    let xy: Ring = loop3d.iter().map(|p| Point2::new(p.x, p.y)).collect();
    if signed_area(&xy) < 0.0 {
        loop3d.iter().rev().cloned().collect()
    } else {
        loop3d.to_vec()
    }
}

/// Cumulative 2D arc length along an open loop traversal.
fn cumulative_lengths(loop3d: &[Point3<f64>]) -> Vec<f64> {
    let mut out = Vec::with_capacity(loop3d.len());
    let mut total = 0.0;
    out.push(0.0);
    for pair in loop3d.windows(2) {
        let d = ((pair[1].x - pair[0].x).powi(2) + (pair[1].y - pair[0].y).powi(2)).sqrt();
        total += d;
        out.push(total);
    }
    out
}

/// Unroll a closed loop into (arc length, z) over its full perimeter.
/// The bottom loop is additionally reversed so that concatenating top
/// and bottom paths forms a simple closed polygon.
fn unroll(loop3d: &[Point3<f64>], reverse: bool) -> Vec<Point2<f64>> {
    let mut points: Vec<Point3<f64>> = loop3d.to_vec();
    points.push(points[0]);
    let arc = cumulative_lengths(&points);
    let mut unrolled: Vec<Point2<f64>> = arc
        .iter()
        .zip(&points)
        .map(|(&s, p)| Point2::new(s, p.z))
        .collect();
    if reverse {
        unrolled.reverse();
    }
    unrolled
}

/// Solid bands behind the unrolled top and bottom paths, dilated by the
/// wall thickness and clipped to the skin polygon.
fn skin_wall_polygons(
    top_path: &[Point2<f64>],
    bottom_path: &[Point2<f64>],
    skin_rings: &[Ring],
    cfg: &TrussConfig,
) -> Vec<Ring> {
    if top_path.len() < 2 || bottom_path.len() < 2 {
        return Vec::new();
    }
    let band = |path: &[Point2<f64>], upward: bool| -> Ring {
        let extreme = path
            .iter()
            .map(|p| p.y)
            .fold(if upward { f64::MIN } else { f64::MAX }, |acc, y| {
                if upward {
                    acc.max(y)
                } else {
                    acc.min(y)
                }
            });
        let y = if upward { extreme + 10.0 } else { extreme - 10.0 };
        let mut ring: Ring = path.to_vec();
        ring.push(Point2::new(path.last().unwrap().x, y));
        ring.push(Point2::new(path.first().unwrap().x, y));
        strut_geometry::bool2d::ensure_ccw(&ring)
    };

    let bands = union_rings(&[band(top_path, true)], &[band(bottom_path, false)]);
    let dilated = offset_rings(&shapes_to_rings(&bands), cfg.support_wall_thickness);
    let walls = intersect_rings(&shapes_to_rings(&dilated), skin_rings);
    shapes_to_rings(&walls)
}

/// Piecewise-linear interpolation with clamped ends over a monotonic
/// abscissa.
fn interp_clamped(xs: &[f64], values: &[f64], x: f64) -> f64 {
    debug_assert_eq!(xs.len(), values.len());
    if x <= xs[0] {
        return values[0];
    }
    if x >= *xs.last().unwrap() {
        return *values.last().unwrap();
    }
    let idx = match xs.binary_search_by(|v| v.partial_cmp(&x).unwrap()) {
        Ok(i) => return values[i],
        Err(i) => i,
    };
    let (x0, x1) = (xs[idx - 1], xs[idx]);
    let t = if x1 - x0 > 1e-12 {
        (x - x0) / (x1 - x0)
    } else {
        0.0
    };
    values[idx - 1] + t * (values[idx] - values[idx - 1])
}
