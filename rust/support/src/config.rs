// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Generation parameters and fixed tolerances
//!
//! All lengths are millimetres, all angles degrees.

use serde::{Deserialize, Serialize};

/// Parameters of the block-support extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportConfig {
    /// Overhang angle threshold (degrees from vertical).
    pub overhang_angle: f64,
    /// Pixel size of the depth-map rasterization (mm).
    pub ray_projection_resolution: f64,
    /// Regions with a smaller projected area are discarded (mm²).
    pub minimum_area_threshold: f64,
    /// Inward offset between the overhang boundary and the support
    /// boundary (mm).
    pub outer_support_edge_gap: f64,
    /// Inward offset applied to segmented sub-region outlines (mm).
    pub inner_support_edge_gap: f64,
    /// Gap kept between the support top and the overhang surface (mm).
    pub upper_projection_offset: f64,
    /// Gap kept between the support bottom and the part surface (mm).
    pub lower_projection_offset: f64,
    /// Interior vertex spacing of the reconstructed cap meshes (mm).
    pub triangulation_spacing: f64,
    /// Douglas–Peucker tolerance factor for boundary simplification.
    pub simplify_polygon_factor: f64,
    /// Emit the raw extruded prism for regions that reach the build plate
    /// instead of running the conformal reconstruction.
    pub use_approx_base_plate_support: bool,
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            overhang_angle: 45.0,
            ray_projection_resolution: 0.2,
            minimum_area_threshold: 5.0,
            outer_support_edge_gap: 0.5,
            inner_support_edge_gap: 0.2,
            upper_projection_offset: 0.05,
            lower_projection_offset: 0.05,
            triangulation_spacing: 2.0,
            simplify_polygon_factor: 0.5,
            use_approx_base_plate_support: false,
        }
    }
}

/// Threshold applied to the blurred height-map gradient when separating
/// support columns. Scales with the sampling resolution (detector is
/// invariant to pixel size) and with `tan(overhang_angle)` (slopes below
/// the overhang threshold stay continuous); the factor 5 rejects sampling
/// noise and is a calibrated constant.
pub fn grad_threshold(ray_projection_resolution: f64, overhang_angle: f64) -> f64 {
    5.0 * overhang_angle.to_radians().tan() * ray_projection_resolution
}

/// Parameters of the truss, tooth and skin synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrussConfig {
    /// Spacing of the X and Y slice planes (mm). The lattice pitch uses
    /// only the X component (`grid_spacing.0 · sin(truss_angle)` for both
    /// hatch families) so that X and Y slices share a lattice phase; the
    /// Y component only positions the Y slice planes.
    pub grid_spacing: (f64, f64),
    /// Width of a truss strut (mm).
    pub truss_width: f64,
    /// Angle of the double-diagonal truss (degrees).
    pub truss_angle: f64,
    /// Inward offset of the solid border ring on each slice (mm).
    pub support_border_distance: f64,
    /// Thickness of the solid wall backing the teeth (mm); ≤ 0 disables.
    pub support_wall_thickness: f64,
    /// Tooth height `a` (mm).
    pub teeth_height: f64,
    /// Tooth top span `b` (mm).
    pub teeth_top_length: f64,
    /// Tooth bottom span `c` (mm).
    pub teeth_bottom_length: f64,
    /// Gap between consecutive teeth `d` (mm).
    pub teeth_base_interval: f64,
    /// Vertical penetration of tooth tips into the adjoining surface (mm).
    pub teeth_upper_penetration: f64,
    /// Stamp teeth along upper intersection edges.
    pub use_upper_teeth: bool,
    /// Stamp teeth along lower intersection edges.
    pub use_lower_teeth: bool,
    /// Surround each slice with a solid border ring.
    pub use_support_border: bool,
    /// Wrap each block in a conformal truss skin.
    pub use_support_skin: bool,
    /// Generate the truss lattice (otherwise slices stay solid).
    pub generate_truss_grid: bool,
    /// Resolve self-intersections of the combined slice meshes into a
    /// unified mesh instead of leaving overlapping submeshes.
    pub merge_mesh: bool,
    /// Subdivision passes applied to the skin before re-wrapping.
    pub num_skin_mesh_subdivide_iterations: usize,
}

impl Default for TrussConfig {
    fn default() -> Self {
        Self {
            grid_spacing: (3.0, 3.0),
            truss_width: 1.0,
            truss_angle: 45.0,
            support_border_distance: 3.0,
            support_wall_thickness: 0.5,
            teeth_height: 1.5,
            teeth_top_length: 0.1,
            teeth_bottom_length: 1.5,
            teeth_base_interval: 0.2,
            teeth_upper_penetration: 0.2,
            use_upper_teeth: true,
            use_lower_teeth: true,
            use_support_border: true,
            use_support_skin: true,
            generate_truss_grid: true,
            merge_mesh: false,
            num_skin_mesh_subdivide_iterations: 2,
        }
    }
}

impl TrussConfig {
    /// Tooth period along the edge (mm).
    pub fn tooth_period(&self) -> f64 {
        self.teeth_bottom_length + self.teeth_base_interval
    }
}

/// Fixed internal tolerances, grouped into one immutable value passed to
/// the entry points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreTolerances {
    /// `sin(angle to ẑ)` above which a face counts as a vertical side
    /// wall of an extruded volume.
    pub side_face: f64,
    /// Minimum intersection volume (mm³) for a candidate to count as
    /// self-intersecting the part.
    pub intersection_volume: f64,
    /// Gaussian blur applied to the height-map gradient. Calibrated
    /// constant; not derived from the gradient threshold or resolution.
    pub gaussian_blur_sigma: f64,
    /// Height tolerance for point-overhang detection (mm).
    pub point_overhang: f64,
    /// Relative length tolerance when pairing skin boundary loops.
    pub pair_matching: f64,
    /// Minimum area (mm²) of a wall component considered in skin
    /// generation.
    pub skin_min_wall_area: f64,
}

impl Default for CoreTolerances {
    fn default() -> Self {
        Self {
            side_face: 1e-3,
            intersection_volume: 50.0,
            gaussian_blur_sigma: 1.0,
            point_overhang: 0.05,
            pair_matching: 0.1,
            skin_min_wall_area: 5.0,
        }
    }
}
