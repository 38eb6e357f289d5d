// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygon triangulation with quality refinement
//!
//! earcutr handles the polygon-with-holes triangulation; a welded 4:1
//! midpoint refinement then drives every triangle below the requested
//! maximum area. The refinement distributes interior vertices over the
//! region, which the support extractor depends on when it projects each
//! vertex vertically to form conformal caps.

use nalgebra::Point2;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

/// A 2D triangulation: points plus triangle indices.
#[derive(Debug, Clone, Default)]
pub struct Triangulation2 {
    pub points: Vec<Point2<f64>>,
    pub faces: Vec<[u32; 3]>,
}

impl Triangulation2 {
    /// Largest triangle area in the triangulation.
    pub fn max_face_area(&self) -> f64 {
        self.faces
            .iter()
            .map(|&[a, b, c]| {
                let pa = self.points[a as usize];
                let pb = self.points[b as usize];
                let pc = self.points[c as usize];
                ((pb - pa).perp(&(pc - pa)) * 0.5).abs()
            })
            .fold(0.0, f64::max)
    }

    /// One 4:1 midpoint subdivision pass with welded edge midpoints.
    pub fn subdivide(&self) -> Triangulation2 {
        let mut out = Triangulation2 {
            points: self.points.clone(),
            faces: Vec::with_capacity(self.faces.len() * 4),
        };
        let mut midpoints: FxHashMap<(u32, u32), u32> = FxHashMap::default();
        let mut midpoint = |points: &mut Vec<Point2<f64>>, a: u32, b: u32| -> u32 {
            let key = if a < b { (a, b) } else { (b, a) };
            *midpoints.entry(key).or_insert_with(|| {
                let pa = points[a as usize];
                let pb = points[b as usize];
                points.push(Point2::from((pa.coords + pb.coords) * 0.5));
                (points.len() - 1) as u32
            })
        };
        for &[i0, i1, i2] in &self.faces {
            let m01 = midpoint(&mut out.points, i0, i1);
            let m12 = midpoint(&mut out.points, i1, i2);
            let m20 = midpoint(&mut out.points, i2, i0);
            out.faces.push([i0, m01, m20]);
            out.faces.push([i1, m12, m01]);
            out.faces.push([i2, m20, m12]);
            out.faces.push([m01, m12, m20]);
        }
        out
    }
}

/// Triangulate a polygon with holes. No quality constraint.
pub fn triangulate_polygon(
    outer: &[Point2<f64>],
    holes: &[Vec<Point2<f64>>],
) -> Result<Triangulation2> {
    if outer.len() < 3 {
        return Err(Error::Triangulation(
            "Need at least 3 points in outer boundary".to_string(),
        ));
    }

    let valid_holes: Vec<&Vec<Point2<f64>>> = holes.iter().filter(|h| h.len() >= 3).collect();

    let total_points: usize = outer.len() + valid_holes.iter().map(|h| h.len()).sum::<usize>();
    let mut vertices = Vec::with_capacity(total_points * 2);
    for p in outer {
        vertices.push(p.x);
        vertices.push(p.y);
    }
    let mut hole_indices = Vec::with_capacity(valid_holes.len());
    for hole in &valid_holes {
        hole_indices.push(vertices.len() / 2);
        for p in hole.iter() {
            vertices.push(p.x);
            vertices.push(p.y);
        }
    }

    let indices = earcutr::earcut(&vertices, &hole_indices, 2)
        .map_err(|e| Error::Triangulation(format!("{:?}", e)))?;
    if indices.is_empty() {
        return Err(Error::Triangulation(
            "Polygon produced no triangles".to_string(),
        ));
    }

    let points: Vec<Point2<f64>> = vertices
        .chunks_exact(2)
        .map(|c| Point2::new(c[0], c[1]))
        .collect();
    let faces: Vec<[u32; 3]> = indices
        .chunks_exact(3)
        .map(|t| [t[0] as u32, t[1] as u32, t[2] as u32])
        .collect();

    Ok(Triangulation2 { points, faces })
}

/// Triangulate a polygon with holes, refining until every triangle area is
/// at most `max_area`.
pub fn triangulate_polygon_quality(
    outer: &[Point2<f64>],
    holes: &[Vec<Point2<f64>>],
    max_area: f64,
) -> Result<Triangulation2> {
    let mut tri = triangulate_polygon(outer, holes)?;
    if max_area <= 0.0 {
        return Ok(tri);
    }
    // Each pass quarters the largest area; bound the loop regardless.
    for _ in 0..12 {
        if tri.max_face_area() <= max_area {
            break;
        }
        tri = tri.subdivide();
    }
    Ok(tri)
}

/// Triangulate with an interior vertex spacing target: the quality bound
/// is the area of a right triangle with legs of `spacing`.
pub fn triangulate_polygon_with_spacing(
    outer: &[Point2<f64>],
    holes: &[Vec<Point2<f64>>],
    spacing: f64,
) -> Result<Triangulation2> {
    triangulate_polygon_quality(outer, holes, spacing * spacing * 0.5)
}
