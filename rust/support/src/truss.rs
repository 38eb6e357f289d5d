// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Truss slice generation
//!
//! The support volume is sliced on X- and Y-oriented planes. Each slice
//! polygon gets interlocking teeth stamped along its conformal top and
//! bottom edges, an optional solid border ring, an optional solid wall
//! backing the teeth, and a double-diagonal truss lattice clipped to its
//! interior. Slice frames share the volume's bounding-box centre, so the
//! lattice nodes line up across neighbouring slices.

use nalgebra::{Point2, Point3, Vector2};
use rayon::prelude::*;
use strut_core::TriangleMesh;
use strut_geometry::bool2d::{
    clip_lines, difference_rings, ensure_ccw, intersect_rings, offset_open_paths, offset_rings,
    shapes_to_rings, signed_area, sort_exterior_interior, union_rings, Ring, Shape,
};
use strut_geometry::section::{section_multiplane, slice_heights, CrossSection, SliceAxis};
use strut_geometry::triangulation::triangulate_polygon_quality;

use crate::config::TrussConfig;

/// Edges with a larger in-plane horizontal delta belong to a conformal
/// top or bottom cap; smaller deltas are vertical side-wall edges.
const CAP_EDGE_TOLERANCE: f64 = 1e-4;

/// Maximum triangle area of the triangulated slice polygons (mm²).
const SLICE_TRIANGLE_AREA: f64 = 4.0;

/// Displacement sense of a tooth row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToothDirection {
    /// Tips penetrate the surface above the edge.
    Upper,
    /// Tips penetrate the surface below the edge.
    Lower,
}

/// The repeating tooth profile: five vertices spanning one period
/// `c + d`, shifted down by `a − upper_penetration` so that tips
/// penetrate the adjoining surface and the base recesses from it.
pub fn tooth_profile(cfg: &TrussConfig) -> Vec<Point2<f64>> {
    let a = cfg.teeth_height;
    let b = cfg.teeth_top_length;
    let c = cfg.teeth_bottom_length;
    let d = cfg.teeth_base_interval;
    let shift = -a + cfg.teeth_upper_penetration;
    vec![
        Point2::new(0.0, shift),
        Point2::new((c - b) / 2.0, a + shift),
        Point2::new((c - b) / 2.0 + b, a + shift),
        Point2::new(c, shift),
        Point2::new(c + d, shift),
    ]
}

/// Replicate the tooth profile along an edge run and displace the
/// resampled points along `displacement`. Runs shorter than one tooth
/// period are returned unchanged.
pub fn stamp_teeth(
    run: &[Point2<f64>],
    cfg: &TrussConfig,
    displacement: Vector2<f64>,
) -> Vec<Point2<f64>> {
    let profile = tooth_profile(cfg);
    let period = cfg.tooth_period();
    if run.len() < 2 || period <= 1e-9 {
        return run.to_vec();
    }

    let sampler = strut_geometry::paths::ArcLengthSampler::new(run);
    let length = sampler.length();
    let cycles = (length / period).ceil() as usize;
    if cycles <= 1 {
        return run.to_vec();
    }

    let mut stamped = Vec::with_capacity(cycles * profile.len());
    let mut last_x = f64::NEG_INFINITY;
    for cycle in 0..cycles {
        let offset = cycle as f64 * period;
        for p in &profile {
            let x = (p.x + offset).clamp(0.0, length);
            if x - last_x < 1e-9 {
                continue;
            }
            last_x = x;
            stamped.push(sampler.sample(x) + displacement * p.y);
        }
    }
    stamped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunKind {
    Wall,
    Cap(ToothDirection),
}

/// Split a CCW ring into maximal runs of wall edges and cap edges. A CCW
/// section traverses its top cap with increasing y and its bottom cap
/// with decreasing y, which classifies each cap run.
fn classify_runs(ring: &[Point2<f64>]) -> Vec<(Vec<Point2<f64>>, RunKind)> {
    let n = ring.len();
    let mut runs: Vec<(Vec<Point2<f64>>, bool)> = Vec::new();
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        let is_cap = (b.y - a.y).abs() > CAP_EDGE_TOLERANCE;
        let extend = matches!(runs.last(), Some(&(_, kind)) if kind == is_cap);
        if extend {
            runs.last_mut().unwrap().0.push(b);
        } else {
            runs.push((vec![a, b], is_cap));
        }
    }

    runs.into_iter()
        .map(|(points, is_cap)| {
            if !is_cap {
                return (points, RunKind::Wall);
            }
            let delta = points.last().unwrap().y - points.first().unwrap().y;
            // CCW rings traverse the top cap with increasing y.
            let direction = if delta > 0.0 {
                ToothDirection::Upper
            } else {
                ToothDirection::Lower
            };
            (points, RunKind::Cap(direction))
        })
        .collect()
}

/// Result of tooth stamping on one ring.
struct ToothedRing {
    ring: Ring,
    upper_runs: Vec<Vec<Point2<f64>>>,
    lower_runs: Vec<Vec<Point2<f64>>>,
}

/// Stamp teeth along the cap runs of a slice ring. Wall runs are dropped;
/// closing the polygon between consecutive cap runs restores them.
fn stamp_ring(ring: &[Point2<f64>], cfg: &TrussConfig) -> ToothedRing {
    let ring = ensure_ccw(ring);
    let runs = classify_runs(&ring);

    let mut out: Ring = Vec::new();
    let mut upper_runs = Vec::new();
    let mut lower_runs = Vec::new();
    let mut any_cap = false;

    for (points, kind) in runs {
        let direction = match kind {
            RunKind::Wall => continue,
            RunKind::Cap(direction) => direction,
        };
        any_cap = true;

        let enabled = match direction {
            ToothDirection::Upper => cfg.use_upper_teeth,
            ToothDirection::Lower => cfg.use_lower_teeth,
        };
        // Teeth displace along slice-local x, which is world z.
        let displacement = match direction {
            ToothDirection::Upper => Vector2::new(1.0, 0.0),
            ToothDirection::Lower => Vector2::new(-1.0, 0.0),
        };

        let processed = if enabled {
            stamp_teeth(&points, cfg, displacement)
        } else {
            points.clone()
        };

        match direction {
            ToothDirection::Upper => upper_runs.push(processed.clone()),
            ToothDirection::Lower => lower_runs.push(processed.clone()),
        }
        out.extend(processed);
    }

    if !any_cap {
        return ToothedRing {
            ring,
            upper_runs,
            lower_runs,
        };
    }

    ToothedRing {
        ring: out,
        upper_runs,
        lower_runs,
    }
}

/// Solid polygons backing the teeth: half-plane-like bands behind the
/// first upper and lower runs, dilated by the wall thickness and clipped
/// to the slice polygon.
fn wall_polygons(
    toothed: &ToothedRing,
    slice_rings: &[Ring],
    wall_thickness: f64,
) -> Vec<Ring> {
    let upper = match toothed.upper_runs.first() {
        Some(run) if run.len() >= 2 => run,
        _ => return Vec::new(),
    };
    let lower = match toothed.lower_runs.first() {
        Some(run) if run.len() >= 2 => run,
        _ => return Vec::new(),
    };

    let band = |run: &[Point2<f64>], toward_positive_x: bool| -> Ring {
        let extreme = run
            .iter()
            .map(|p| p.x)
            .fold(if toward_positive_x { f64::MIN } else { f64::MAX }, |acc, x| {
                if toward_positive_x {
                    acc.max(x)
                } else {
                    acc.min(x)
                }
            });
        let x = if toward_positive_x {
            extreme + 10.0
        } else {
            extreme - 10.0
        };
        let mut ring: Ring = run.to_vec();
        ring.push(Point2::new(x, run.last().unwrap().y));
        ring.push(Point2::new(x, run.first().unwrap().y));
        ensure_ccw(&ring)
    };

    // The upper band extends above the top edge, the lower band below.
    let bands = union_rings(&[band(upper, true)], &[band(lower, false)]);
    let dilated = offset_rings(&shapes_to_rings(&bands), wall_thickness);
    let walls = intersect_rings(&shapes_to_rings(&dilated), slice_rings);
    shapes_to_rings(&walls)
}

/// Double-diagonal hatch lines covering `bounds`, with the lattice
/// centred on the bounds centre so neighbouring slices share nodes.
fn generate_mesh_grid(
    bounds: (Point2<f64>, Point2<f64>),
    pitch: f64,
    angle_deg: f64,
) -> Vec<[Point2<f64>; 2]> {
    let (min, max) = bounds;
    let centre = Point2::new((min.x + max.x) * 0.5, (min.y + max.y) * 0.5);
    let half_diag = (max - min).norm() * 0.5;
    let radius = (half_diag / pitch).ceil() * pitch;

    let theta = angle_deg.to_radians();
    let dir = Vector2::new(theta.cos(), theta.sin());
    let perp = Vector2::new(-theta.sin(), theta.cos());

    let mut lines = Vec::new();
    let mut offset = -radius;
    while offset < radius {
        let anchor = centre + perp * offset;
        lines.push([anchor - dir * radius, anchor + dir * radius]);
        offset += pitch;
    }
    lines
}

/// Fill a region with the truss-and-border pattern. `outer` is the flat
/// ring set of the region boundary, `grid_bounds` the frame the hatch
/// lattice is anchored to, `walls` optional solid polygons unioned into
/// the result.
pub(crate) fn truss_fill(
    outer: &[Ring],
    grid_bounds: (Point2<f64>, Point2<f64>),
    cfg: &TrussConfig,
    walls: &[Ring],
) -> Vec<Shape> {
    if outer.is_empty() {
        return Vec::new();
    }

    if !cfg.generate_truss_grid {
        return sort_exterior_interior(outer)
            .into_iter()
            .map(|(o, holes)| {
                let mut shape = vec![o];
                shape.extend(holes);
                shape
            })
            .collect();
    }

    let inner = offset_rings(outer, -cfg.support_border_distance);
    let inner_flat = shapes_to_rings(&inner);
    if inner_flat.is_empty() {
        // Region thinner than the border: emit the solid polygon.
        return sort_exterior_interior(outer)
            .into_iter()
            .map(|(o, holes)| {
                let mut shape = vec![o];
                shape.extend(holes);
                shape
            })
            .collect();
    }

    let pitch = cfg.grid_spacing.0 * cfg.truss_angle.to_radians().sin();
    let mut hatches = generate_mesh_grid(grid_bounds, pitch, cfg.truss_angle);
    hatches.extend(generate_mesh_grid(grid_bounds, pitch, 180.0 - cfg.truss_angle));

    let clipped = clip_lines(outer, &hatches);
    let strut_paths: Vec<Vec<Point2<f64>>> =
        clipped.iter().map(|seg| vec![seg[0], seg[1]]).collect();
    let truss = offset_open_paths(&strut_paths, cfg.truss_width / 2.0);
    let truss_flat = shapes_to_rings(&truss);

    let mut solution = if cfg.use_support_border {
        let trimmed = intersect_rings(&truss_flat, outer);
        let border = difference_rings(outer, &inner_flat);
        union_rings(&shapes_to_rings(&trimmed), &shapes_to_rings(&border))
    } else {
        intersect_rings(&truss_flat, outer)
    };

    if !walls.is_empty() {
        solution = union_rings(&shapes_to_rings(&solution), walls);
    }

    solution
}

/// Generate the final polygons for one cross-section of the support
/// volume: teeth, walls, border and truss in slice-local coordinates.
pub fn generate_slice_polygons(
    section: &CrossSection,
    grid_bounds: (Point2<f64>, Point2<f64>),
    cfg: &TrussConfig,
) -> Vec<Shape> {
    let mut outer_flat: Vec<Ring> = Vec::new();
    let mut wall_rings: Vec<Ring> = Vec::new();

    for ring in &section.rings {
        if signed_area(ring).abs() < 1e-9 {
            continue;
        }
        let toothed = stamp_ring(ring, cfg);
        // Normalize the displaced ring: tooth stamping can introduce
        // small self-intersections at run joints.
        let normalized = offset_rings(&[toothed.ring.clone()], 0.0);
        let rings = shapes_to_rings(&normalized);
        if rings.is_empty() {
            continue;
        }
        if cfg.support_wall_thickness > 1e-5 {
            wall_rings.extend(wall_polygons(&toothed, &rings, cfg.support_wall_thickness));
        }
        outer_flat.extend(rings);
    }

    if outer_flat.is_empty() {
        return Vec::new();
    }

    truss_fill(&outer_flat, grid_bounds, cfg, &wall_rings)
}

/// Triangulate slice polygons and lift them into world space.
fn polygons_to_mesh(shapes: &[Shape], section: &CrossSection) -> TriangleMesh {
    let mut mesh = TriangleMesh::new();
    for shape in shapes {
        if shape.is_empty() {
            continue;
        }
        let holes: Vec<Ring> = shape[1..].to_vec();
        let tri = match triangulate_polygon_quality(&shape[0], &holes, SLICE_TRIANGLE_AREA) {
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
        mesh.merge(&part);
    }
    mesh.transform(&section.to_world);
    mesh
}

/// Local-frame bounds of the volume for a given slice axis: x is world z,
/// y the in-plane horizontal axis.
fn local_grid_bounds(
    volume_bounds: (Point3<f64>, Point3<f64>),
    axis: SliceAxis,
) -> (Point2<f64>, Point2<f64>) {
    let (min, max) = volume_bounds;
    match axis {
        SliceAxis::X => (Point2::new(min.z, min.y), Point2::new(max.z, max.y)),
        SliceAxis::Y => (Point2::new(min.z, min.x), Point2::new(max.z, max.x)),
    }
}

/// Slice the support volume on both grid axes and return the combined
/// truss mesh (X slices then Y slices, concatenated).
pub fn generate_support_slices(volume: &TriangleMesh, cfg: &TrussConfig) -> TriangleMesh {
    let bounds = match volume.bounds() {
        Some(bounds) => bounds,
        None => return TriangleMesh::new(),
    };

    let mut combined = TriangleMesh::new();
    for (axis, spacing) in [
        (SliceAxis::X, cfg.grid_spacing.0),
        (SliceAxis::Y, cfg.grid_spacing.1),
    ] {
        let (axis_min, axis_max) = match axis {
            SliceAxis::X => (bounds.0.x, bounds.1.x),
            SliceAxis::Y => (bounds.0.y, bounds.1.y),
        };
        let heights = slice_heights(axis_min, axis_max, spacing);
        let grid_bounds = local_grid_bounds(bounds, axis);
        let sections = section_multiplane(volume, axis, &heights);

        let meshes: Vec<TriangleMesh> = sections
            .par_iter()
            .filter_map(|section| section.as_ref())
            .map(|section| {
                let shapes = generate_slice_polygons(section, grid_bounds, cfg);
                polygons_to_mesh(&shapes, section)
            })
            .collect();
        for mesh in meshes {
            combined.merge(&mesh);
        }
    }
    combined
}
