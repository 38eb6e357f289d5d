// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Block-support extraction
//!
//! For every overhang surface patch a downward prism is intersected with
//! the part to decide whether the support self-intersects or reaches the
//! build plate. Intersecting candidates are rasterized into upper/lower
//! height maps, segmented into independently conformal sub-columns along
//! gradient discontinuities, and reconstructed as part-conformal block
//! volumes by per-vertex vertical projection and a final boolean
//! difference.
//!
//! Failures are local: a region that cannot be processed is logged and
//! skipped, never poisoning the returned list.

use nalgebra::{Point2, Point3};
use strut_core::{Part, TriangleMesh};
use strut_geometry::bool2d::{offset_rings, signed_area, Ring, Shape};
use strut_geometry::heightfield::{combine_height_maps, gaussian_blur, gradient_magnitude};
use strut_geometry::paths::{simplify_ring, smooth_ring};
use strut_geometry::raster::{project_height_map, ProjectionDirection};
use strut_geometry::triangulation::{triangulate_polygon_with_spacing, Triangulation2};
use strut_geometry::{csg, extrusion, flatten_support_region, support_angles, VerticalRayCaster};
use tracing::{info, warn};

use crate::block::{BlockSupport, GridBlockSupport};
use crate::config::{grad_threshold, CoreTolerances, SupportConfig, TrussConfig};
use crate::error::{Error, Result};
use crate::overhang::find_overhang_surfaces;

/// Gap between the candidate prism top and the overhang surface (mm).
const PRISM_TOP_GAP: f64 = 0.01;

/// Faces of the intersection mesh steeper than this inclination (degrees
/// from +ẑ) are excluded from the downward projection target.
const UPPER_SURFACE_MAX_ANGLE: f64 = 89.95;

/// Pixels of constant padding around the height map before gradient
/// extraction, and the padding value.
const HEIGHT_MAP_PAD: usize = 2;
const HEIGHT_MAP_PAD_VALUE: f64 = 1.0;

/// Height-map mask floor (mm): pixels at or below this height never seed
/// a sub-region. Calibrated with the padding value and the background
/// fill of uncovered pixels.
const HEIGHT_MAP_MASK_FLOOR: f64 = 2.0;

/// Corner-cutting passes applied to raster outlines before
/// simplification.
const OUTLINE_SMOOTH_ITERATIONS: usize = 2;

/// Generator for block supports.
#[derive(Debug, Clone, Default)]
pub struct BlockSupportGenerator {
    pub config: SupportConfig,
    pub tolerances: CoreTolerances,
}

impl BlockSupportGenerator {
    pub fn new(config: SupportConfig, tolerances: CoreTolerances) -> Self {
        Self { config, tolerances }
    }

    /// Extract the overhang surfaces of `part` and generate one or more
    /// block supports per overhang region.
    ///
    /// With `find_self_intersecting = false`, regions whose downward
    /// projection enters the part are dropped instead of being
    /// reconstructed, so every emitted block rests on the build plate.
    pub fn identify_support_regions(
        &self,
        part: &Part,
        overhang_angle: f64,
        find_self_intersecting: bool,
    ) -> Vec<BlockSupport> {
        let patches = find_overhang_surfaces(part, overhang_angle, true);
        info!(
            part = part.name(),
            regions = patches.len(),
            "identifying support regions"
        );

        let mut blocks = Vec::new();
        for (index, patch) in patches.iter().enumerate() {
            match self.process_region(part, patch, overhang_angle, find_self_intersecting) {
                Ok(region_blocks) => blocks.extend(region_blocks),
                Err(Error::SubthresholdArea) => {}
                Err(err) => {
                    warn!(region = index, "skipping overhang region: {err}");
                }
            }
        }
        blocks
    }

    fn process_region(
        &self,
        part: &Part,
        patch: &TriangleMesh,
        overhang_angle: f64,
        find_self_intersecting: bool,
    ) -> Result<Vec<BlockSupport>> {
        let cfg = &self.config;

        // Surfaces at or below the detector's height floor sit on the
        // build plate and never grow a column.
        let patch_top_z = patch.bounds().map(|(_, max)| max.z).unwrap_or(0.0);
        if patch_top_z <= HEIGHT_MAP_MASK_FLOOR {
            return Ok(Vec::new());
        }

        // Flatten and shrink the region outline; reject slivers early.
        let (outer, holes) = flatten_support_region(patch).map_err(|_| Error::DegenerateOutline)?;
        let mut region_rings = vec![simplify_ring(&outer, cfg.simplify_polygon_factor)];
        region_rings.extend(holes);
        let offset_shapes = offset_rings(&region_rings, -cfg.outer_support_edge_gap);
        if shapes_area(&offset_shapes) < cfg.minimum_area_threshold {
            return Err(Error::SubthresholdArea);
        }

        // Downward prism under the patch, stopping just short of it.
        let (patch_tri, patch_top) = patch_triangulation(patch);
        let prism = extrusion::extrude_between_caps(
            &patch_tri,
            &patch_top,
            &vec![0.0; patch_top.len()],
        )?;

        info!("intersecting candidate prism with part");
        let cut_mesh = csg::intersect(part.geometry(), &prism)?;
        let cut_volume = cut_mesh.volume();
        let intersects = cut_volume >= self.tolerances.intersection_volume;

        if !intersects {
            if cfg.use_approx_base_plate_support {
                // The column reaches the plate untouched: extrude the
                // shrunken footprint straight down, skipping the height
                // map entirely.
                info!("creating approximate base-plate support");
                let patch_caster = VerticalRayCaster::new(patch);
                let mut blocks = Vec::new();
                let empty = TriangleMesh::new();
                for shape in &offset_shapes {
                    match self.reconstruct_sub_block(patch, &empty, &patch_caster, None, shape) {
                        Ok(Some(block)) => blocks.push(block),
                        Ok(None) => {}
                        Err(err) => warn!("skipping base-plate sub-region: {err}"),
                    }
                }
                return Ok(blocks);
            }
        } else if !find_self_intersecting {
            return Ok(Vec::new());
        }

        // The downward projection target: upward-facing part surfaces
        // inside the candidate column.
        let angles = support_angles(&cut_mesh);
        let mask: Vec<bool> = angles.iter().map(|&a| a < UPPER_SURFACE_MAX_ANGLE).collect();
        let cut_mesh_upper = cut_mesh.submesh(&mask);

        let (mut bbox_min, mut bbox_max) = prism
            .bounds()
            .ok_or_else(|| Error::CsgFailure("candidate prism is empty".to_string()))?;
        bbox_min.z -= 1.0;
        bbox_max.z += 1.0;

        info!("generating support height map");
        let upper_map = project_height_map(
            patch,
            cfg.ray_projection_resolution,
            ProjectionDirection::Up,
            bbox_min,
            bbox_max,
        );
        let lower_map = project_height_map(
            &cut_mesh_upper,
            cfg.ray_projection_resolution,
            ProjectionDirection::Down,
            bbox_min,
            bbox_max,
        );
        let height_map =
            combine_height_maps(&upper_map, &lower_map).padded(HEIGHT_MAP_PAD, HEIGHT_MAP_PAD_VALUE);

        let grads = gaussian_blur(
            &gradient_magnitude(&height_map),
            self.tolerances.gaussian_blur_sigma,
        );
        let outlines = strut_geometry::heightfield::smooth_region_outlines(
            &grads,
            &height_map,
            grad_threshold(cfg.ray_projection_resolution, overhang_angle),
            HEIGHT_MAP_MASK_FLOOR,
        );

        // Per-vertex projection targets.
        let patch_caster = VerticalRayCaster::new(patch);
        let cut_caster = if intersects {
            Some(VerticalRayCaster::new(&cut_mesh_upper))
        } else {
            None
        };

        let mut blocks = Vec::new();
        for outline in &outlines {
            let world: Ring = outline
                .iter()
                .map(|p| height_map.pixel_to_world(p.x, p.y))
                .collect();

            for shape in self.segment_outline(&world) {
                match self.reconstruct_sub_block(
                    patch,
                    &cut_mesh,
                    &patch_caster,
                    cut_caster.as_ref(),
                    &shape,
                ) {
                    Ok(Some(block)) => blocks.push(block),
                    Ok(None) => {}
                    Err(err) => warn!("skipping support sub-region: {err}"),
                }
            }
        }

        info!(blocks = blocks.len(), "processed support face");
        Ok(blocks)
    }

    /// Smooth, simplify and shrink one raster outline into polygon
    /// shapes.
    fn segment_outline(&self, world: &Ring) -> Vec<Shape> {
        let cfg = &self.config;
        let smooth = smooth_ring(world, OUTLINE_SMOOTH_ITERATIONS);
        let simplified = simplify_ring(
            &smooth,
            cfg.simplify_polygon_factor * cfg.ray_projection_resolution,
        );
        if simplified.len() < 3 {
            return Vec::new();
        }
        offset_rings(&[simplified], -cfg.inner_support_edge_gap)
    }

    /// Project a segmented sub-region onto the overhang surface and the
    /// part below and extrude the conformal block between the caps.
    fn reconstruct_sub_block(
        &self,
        patch: &TriangleMesh,
        cut_mesh: &TriangleMesh,
        patch_caster: &VerticalRayCaster,
        cut_caster: Option<&VerticalRayCaster>,
        shape: &Shape,
    ) -> Result<Option<BlockSupport>> {
        let cfg = &self.config;
        if shape.is_empty() {
            return Ok(None);
        }
        let area = signed_area(&shape[0]).abs() - rings_area(&shape[1..]);
        if area < cfg.minimum_area_threshold {
            return Ok(None);
        }

        let holes: Vec<Ring> = shape[1..].to_vec();
        let tri = triangulate_polygon_with_spacing(&shape[0], &holes, cfg.triangulation_spacing)?;
        let expected = tri.points.len();

        // Upward projection onto the overhang surface.
        let mut top_z = Vec::with_capacity(expected);
        let mut hits_up = 0usize;
        for p in &tri.points {
            if let Some(z) = patch_caster.first_hit_up(p.x, p.y, f64::NEG_INFINITY) {
                top_z.push(z + cfg.upper_projection_offset);
                hits_up += 1;
            } else {
                top_z.push(f64::NAN);
            }
        }
        if hits_up != expected {
            return Err(Error::ProjectionMismatch {
                hits_up,
                hits_down: 0,
                expected,
            });
        }

        // Downward projection onto the part; a fully missed projection
        // means the sub-column reaches the build plate.
        let mut bottom_z = vec![0.0f64; expected];
        let mut hits_down = 0usize;
        if let Some(caster) = cut_caster {
            for (i, p) in tri.points.iter().enumerate() {
                if let Some(z) = caster.first_hit_down(p.x, p.y, top_z[i]) {
                    bottom_z[i] = z - cfg.lower_projection_offset;
                    hits_down += 1;
                }
            }
        }
        let base_plate = hits_down == 0;
        if !base_plate && hits_down != expected {
            return Err(Error::ProjectionMismatch {
                hits_up,
                hits_down,
                expected,
            });
        }
        if base_plate {
            info!("creating base-plate support");
        }

        let sub_prism = extrusion::extrude_between_caps(&tri, &top_z, &bottom_z)?;

        // Difference against the intersection mesh yields clean,
        // part-conformal boundaries.
        let mut support_volume = if cut_mesh.is_empty() {
            sub_prism
        } else {
            csg::difference(&sub_prism, cut_mesh)?
        };
        support_volume.repair();
        if support_volume.is_empty() || support_volume.volume() <= 0.0 {
            return Err(Error::CsgFailure(
                "support volume degenerated during boolean difference".to_string(),
            ));
        }

        let upper_surface = cap_mesh(&tri, &top_z);

        Ok(Some(BlockSupport {
            support_volume,
            support_surface: patch.clone(),
            upper_surface: Some(upper_surface),
            intersects_part: !base_plate,
        }))
    }
}

/// Generator producing grid-truss block supports: runs the block
/// extractor, then attaches the shared truss parameters to every block.
#[derive(Debug, Clone, Default)]
pub struct GridSupportGenerator {
    pub generator: BlockSupportGenerator,
    pub truss: TrussConfig,
}

impl GridSupportGenerator {
    pub fn new(config: SupportConfig, truss: TrussConfig, tolerances: CoreTolerances) -> Self {
        Self {
            generator: BlockSupportGenerator::new(config, tolerances),
            truss,
        }
    }

    pub fn identify_support_regions(
        &self,
        part: &Part,
        overhang_angle: f64,
        find_self_intersecting: bool,
    ) -> Vec<GridBlockSupport> {
        self.generator
            .identify_support_regions(part, overhang_angle, find_self_intersecting)
            .into_iter()
            .map(|block| {
                GridBlockSupport::new(
                    block,
                    self.truss.clone(),
                    self.generator.tolerances.clone(),
                )
            })
            .collect()
    }
}

/// XY triangulation of an overhang patch with per-vertex top heights just
/// below the surface. Faces are flipped counter-clockwise in the XY
/// projection (downward patches project mirrored).
fn patch_triangulation(patch: &TriangleMesh) -> (Triangulation2, Vec<f64>) {
    let points: Vec<Point2<f64>> = patch
        .vertices
        .iter()
        .map(|v| Point2::new(v.x, v.y))
        .collect();

    let projected_area: f64 = patch
        .faces
        .iter()
        .map(|&[a, b, c]| {
            let pa = points[a as usize];
            let pb = points[b as usize];
            let pc = points[c as usize];
            (pb - pa).perp(&(pc - pa)) * 0.5
        })
        .sum();

    let faces: Vec<[u32; 3]> = if projected_area < 0.0 {
        patch.faces.iter().map(|&[a, b, c]| [a, c, b]).collect()
    } else {
        patch.faces.clone()
    };

    let top: Vec<f64> = patch.vertices.iter().map(|v| v.z - PRISM_TOP_GAP).collect();
    (Triangulation2 { points, faces }, top)
}

/// Build the retained copy of a projected top cap.
fn cap_mesh(tri: &Triangulation2, heights: &[f64]) -> TriangleMesh {
    let mut mesh = TriangleMesh::with_capacity(tri.points.len(), tri.faces.len());
    for (p, &z) in tri.points.iter().zip(heights) {
        mesh.add_vertex(Point3::new(p.x, p.y, z));
    }
    for &[a, b, c] in &tri.faces {
        mesh.add_face(a, b, c);
    }
    mesh
}

fn rings_area(rings: &[Ring]) -> f64 {
    rings.iter().map(|r| signed_area(r).abs()).sum()
}

/// Total enclosed area of a shape list (outer rings minus their holes).
fn shapes_area(shapes: &[Shape]) -> f64 {
    shapes
        .iter()
        .map(|shape| {
            signed_area(&shape[0]).abs()
                - shape[1..]
                    .iter()
                    .map(|h| signed_area(h).abs())
                    .sum::<f64>()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strut_core::box_mesh;

    #[test]
    fn test_patch_triangulation_orientation() {
        let mesh = box_mesh(Point3::new(0.0, 0.0, 5.0), Point3::new(10.0, 10.0, 8.0));
        let normals = mesh.face_normals();
        let mask: Vec<bool> = normals.iter().map(|n| n.z < -0.5).collect();
        let patch = mesh.submesh(&mask);

        let (tri, top) = patch_triangulation(&patch);
        // Projected faces are counter-clockwise after the flip.
        let area: f64 = tri
            .faces
            .iter()
            .map(|&[a, b, c]| {
                let pa = tri.points[a as usize];
                let pb = tri.points[b as usize];
                let pc = tri.points[c as usize];
                (pb - pa).perp(&(pc - pa)) * 0.5
            })
            .sum();
        assert!(area > 0.0);
        assert!((area - 100.0).abs() < 1e-9);
        assert!(top.iter().all(|&z| (z - (5.0 - 0.01)).abs() < 1e-12));
    }

    #[test]
    fn test_approx_base_plate_support() {
        let mesh = box_mesh(Point3::new(0.0, 0.0, 10.0), Point3::new(20.0, 10.0, 15.0));
        let part = Part::new("cantilever", mesh);
        let generator = BlockSupportGenerator::new(
            SupportConfig {
                use_approx_base_plate_support: true,
                ..SupportConfig::default()
            },
            CoreTolerances::default(),
        );

        let blocks = generator.identify_support_regions(&part, 45.0, true);
        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        assert!(!block.intersects_part);
        assert!(block.support_volume.is_watertight());
        // Footprint shrunk by the outer edge gap, spanning plate to
        // overhang.
        let expected = 19.0 * 9.0 * 10.0;
        assert!(
            (block.support_volume.volume() - expected).abs() < 0.05 * expected,
            "volume = {}",
            block.support_volume.volume()
        );
    }
}
