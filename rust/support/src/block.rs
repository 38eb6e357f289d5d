// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Block-support data structures
//!
//! A [`BlockSupport`] is one monolithic support volume beneath an overhang
//! region: its top conforms to the overhang, its bottom rests on the part
//! or the build plate, and its sides are vertical. A [`GridBlockSupport`]
//! carries the same data plus the truss parameters and materializes the
//! perforated truss-and-skin geometry on demand.

use strut_core::TriangleMesh;
use strut_geometry::{face_z_projection_weight, flatten_support_region};

use crate::config::{CoreTolerances, TrussConfig};
use crate::skin::generate_support_skins;
use crate::truss::generate_support_slices;

/// Capability shared by all support structures: produce the printable
/// geometry.
pub trait SupportStructure {
    /// The mesh representing the support structure.
    fn geometry(&self) -> TriangleMesh;

    /// Volume of the support structure (mm³).
    fn volume(&self) -> f64;
}

/// A single extruded support volume beneath one overhang region.
#[derive(Debug, Clone)]
pub struct BlockSupport {
    /// Watertight support volume. Top conforms to the overhang surface,
    /// bottom to the part (when intersecting) or the plane z = 0, sides
    /// vertical.
    pub support_volume: TriangleMesh,
    /// The originating overhang surface patch.
    pub support_surface: TriangleMesh,
    /// Copy of the projected top cap, retained for skin generation.
    pub upper_surface: Option<TriangleMesh>,
    /// Whether the downward projection self-intersects the part rather
    /// than reaching the build plate.
    pub intersects_part: bool,
}

impl BlockSupport {
    /// Surface area of the originating overhang patch (mm²).
    pub fn support_area(&self) -> f64 {
        self.support_surface.area()
    }

    /// Area of the overhang patch flattened onto the build plate (mm²).
    pub fn projected_support_area(&self) -> f64 {
        match flatten_support_region(&self.support_surface) {
            Ok((outer, holes)) => {
                let outer_area = strut_geometry::bool2d::signed_area(&outer).abs();
                let holes_area: f64 = holes
                    .iter()
                    .map(|h| strut_geometry::bool2d::signed_area(h).abs())
                    .sum();
                outer_area - holes_area
            }
            Err(_) => 0.0,
        }
    }

    /// The vertical side walls of the support volume, selected by face
    /// projection weight.
    pub fn support_boundary(&self, tolerances: &CoreTolerances) -> TriangleMesh {
        let weights = face_z_projection_weight(&self.support_volume);
        let mask: Vec<bool> = weights
            .iter()
            .map(|&w| w > 1.0 - tolerances.side_face)
            .collect();
        self.support_volume.submesh(&mask)
    }
}

impl SupportStructure for BlockSupport {
    fn geometry(&self) -> TriangleMesh {
        self.support_volume.clone()
    }

    fn volume(&self) -> f64 {
        self.support_volume.volume()
    }
}

/// A block support whose interior is realized as a perforated truss grid
/// with a conformal skin.
#[derive(Debug, Clone)]
pub struct GridBlockSupport {
    pub block: BlockSupport,
    pub truss: TrussConfig,
    pub tolerances: CoreTolerances,
}

impl GridBlockSupport {
    pub fn new(block: BlockSupport, truss: TrussConfig, tolerances: CoreTolerances) -> Self {
        Self {
            block,
            truss,
            tolerances,
        }
    }
}

impl SupportStructure for GridBlockSupport {
    /// Materialize the truss slices and the conformal skin. With
    /// `merge_mesh` the X and Y slice meshes are resolved into one
    /// connected mesh; otherwise they remain overlapping submeshes of the
    /// returned mesh.
    fn geometry(&self) -> TriangleMesh {
        let mut mesh = generate_support_slices(&self.block.support_volume, &self.truss);

        if self.truss.merge_mesh && !mesh.is_empty() {
            mesh = strut_geometry::csg::resolve_self_intersections(&mesh);
        }

        if self.truss.use_support_skin {
            match generate_support_skins(&self.block.support_volume, &self.truss, &self.tolerances)
            {
                Ok(skins) => {
                    for skin in skins {
                        mesh.merge(&skin);
                    }
                }
                Err(err) => {
                    tracing::warn!("skipping support skin: {err}");
                }
            }
        }

        mesh
    }

    fn volume(&self) -> f64 {
        self.block.support_volume.volume()
    }
}
