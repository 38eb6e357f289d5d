// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Multiplane cross-sections of a mesh
//!
//! Support volumes are sliced on vertical planes with X- or Y-aligned
//! normals. Each cross-section is expressed in a slice-local frame with
//! `x = world z` and `y = the in-plane horizontal axis`, so side walls of
//! an extruded volume become runs with |Δy| ≈ 0 and conformal caps become
//! runs with |Δy| > 0. The stored transform maps local (x, y, 0) back to
//! world space.

use nalgebra::{Matrix4, Point2};
use rayon::prelude::*;
use strut_core::TriangleMesh;

use crate::bool2d::Ring;

/// Axis of the slicing plane normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceAxis {
    /// Planes x = h, local y = world y.
    X,
    /// Planes y = h, local y = world x.
    Y,
}

/// One planar cross-section in slice-local coordinates.
#[derive(Debug, Clone)]
pub struct CrossSection {
    /// Closed rings chained from the plane intersection. Winding is
    /// normalized downstream.
    pub rings: Vec<Ring>,
    /// Maps local (x, y, 0) to world coordinates.
    pub to_world: Matrix4<f64>,
    /// Plane position along the slicing axis.
    pub height: f64,
}

/// Slice plane positions symmetric about the centre of `[min, max]` at
/// half-spacing offsets, so no plane passes through the centre and
/// adjacent blocks share the same grid phase.
pub fn slice_heights(min: f64, max: f64, spacing: f64) -> Vec<f64> {
    let mid = (min + max) * 0.5;
    let mut heights = Vec::new();
    let mut k = 0;
    loop {
        let offset = (k as f64 + 0.5) * spacing;
        if mid + offset >= max && mid - offset <= min {
            break;
        }
        if mid - offset > min {
            heights.push(mid - offset);
        }
        if mid + offset < max {
            heights.push(mid + offset);
        }
        k += 1;
    }
    heights.sort_by(|a, b| a.partial_cmp(b).unwrap());
    heights
}

/// Section a mesh with a family of parallel vertical planes. Returns one
/// entry per height; `None` where the plane misses the mesh.
pub fn section_multiplane(
    mesh: &TriangleMesh,
    axis: SliceAxis,
    heights: &[f64],
) -> Vec<Option<CrossSection>> {
    let triangles: Vec<[[f64; 3]; 3]> = mesh
        .faces
        .iter()
        .map(|&[i0, i1, i2]| {
            [
                mesh.vertices[i0 as usize].coords.into(),
                mesh.vertices[i1 as usize].coords.into(),
                mesh.vertices[i2 as usize].coords.into(),
            ]
        })
        .collect();

    heights
        .par_iter()
        .map(|&h| section_at(&triangles, axis, h))
        .collect()
}

fn to_world_matrix(axis: SliceAxis, height: f64) -> Matrix4<f64> {
    match axis {
        // local (u, v) -> world (h, v, u)
        SliceAxis::X => Matrix4::new(
            0.0, 0.0, -1.0, height, //
            0.0, 1.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ),
        // local (u, v) -> world (v, h, u)
        SliceAxis::Y => Matrix4::new(
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, height, //
            1.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ),
    }
}

fn section_at(triangles: &[[[f64; 3]; 3]], axis: SliceAxis, height: f64) -> Option<CrossSection> {
    let (normal_idx, horizontal_idx) = match axis {
        SliceAxis::X => (0usize, 1usize),
        SliceAxis::Y => (1usize, 0usize),
    };

    let eps = 1e-10;
    let mut segments: Vec<(Point2<f64>, Point2<f64>)> = Vec::new();

    for tri in triangles {
        let d = [
            tri[0][normal_idx] - height,
            tri[1][normal_idx] - height,
            tri[2][normal_idx] - height,
        ];
        if d.iter().all(|&x| x > eps) || d.iter().all(|&x| x < -eps) {
            continue;
        }

        let mut points: Vec<Point2<f64>> = Vec::with_capacity(2);
        let edges = [(0usize, 1usize), (1, 2), (2, 0)];
        for (a, b) in edges {
            let (da, db) = (d[a], d[b]);
            if (da > eps && db < -eps) || (da < -eps && db > eps) {
                let t = da / (da - db);
                let z = tri[a][2] + t * (tri[b][2] - tri[a][2]);
                let v = tri[a][horizontal_idx] + t * (tri[b][horizontal_idx] - tri[a][horizontal_idx]);
                points.push(Point2::new(z, v));
            } else if da.abs() <= eps && db.abs() > eps {
                points.push(Point2::new(tri[a][2], tri[a][horizontal_idx]));
            }
        }

        points.dedup_by(|a, b| (*a - *b).norm_squared() < eps * eps);
        if points.len() >= 2 && (points[0] - points[1]).norm_squared() > eps {
            segments.push((points[0], points[1]));
        }
    }

    if segments.is_empty() {
        return None;
    }

    let rings = chain_segments(segments);
    if rings.is_empty() {
        return None;
    }

    Some(CrossSection {
        rings,
        to_world: to_world_matrix(axis, height),
        height,
    })
}

/// Chain unordered segments into closed rings. Open chains are dropped.
fn chain_segments(segments: Vec<(Point2<f64>, Point2<f64>)>) -> Vec<Ring> {
    let eps = 1e-6;
    let mut remaining = segments;
    let mut rings: Vec<Ring> = Vec::new();

    while let Some((start, end)) = remaining.pop() {
        let mut chain = vec![start, end];
        let mut changed = true;
        while changed {
            changed = false;
            let chain_start = *chain.first().unwrap();
            let chain_end = *chain.last().unwrap();

            let mut i = 0;
            while i < remaining.len() {
                let (a, b) = remaining[i];
                if (b - chain_end).norm() < eps {
                    chain.push(a);
                    remaining.swap_remove(i);
                    changed = true;
                } else if (a - chain_end).norm() < eps {
                    chain.push(b);
                    remaining.swap_remove(i);
                    changed = true;
                } else if (b - chain_start).norm() < eps {
                    chain.insert(0, a);
                    remaining.swap_remove(i);
                    changed = true;
                } else if (a - chain_start).norm() < eps {
                    chain.insert(0, b);
                    remaining.swap_remove(i);
                    changed = true;
                } else {
                    i += 1;
                }
            }
        }

        if chain.len() >= 4 {
            let closed = (*chain.first().unwrap() - *chain.last().unwrap()).norm() < eps;
            if closed {
                chain.pop();
                if chain.len() >= 3 {
                    rings.push(chain);
                }
            }
        }
    }

    rings
}
