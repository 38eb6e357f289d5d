// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Strut Geometry
//!
//! Geometric primitives backing the support-generation pipeline:
//!
//! - **2D booleans and offsetting** over ring sets via
//!   [i_overlay](https://docs.rs/i_overlay) ([`bool2d`])
//! - **Polygon triangulation** with area-quality refinement via
//!   [earcutr](https://docs.rs/earcutr) ([`triangulation`])
//! - **Prismatic extrusion** between conformal caps ([`extrusion`])
//! - **Multiplane sectioning** with slice-local frames ([`section`])
//! - **Vertical ray casting** and **depth-map rasterization**
//!   ([`raycast`], [`raster`])
//! - **Height-field segmentation** with [image](https://docs.rs/image) /
//!   [imageproc](https://docs.rs/imageproc) ([`heightfield`])
//! - **Mesh CSG** via [csgrs](https://docs.rs/csgrs) ([`csg`])

pub mod bool2d;
pub mod csg;
pub mod error;
pub mod extrusion;
pub mod flatten;
pub mod heightfield;
pub mod orientation;
pub mod paths;
pub mod raster;
pub mod raycast;
pub mod section;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point2, Point3, Vector2, Vector3};

pub use bool2d::{Ring, Shape};
pub use error::{Error, Result};
pub use flatten::flatten_support_region;
pub use orientation::{face_z_projection_weight, support_angles};
pub use raster::{project_height_map, HeightMap, ProjectionDirection};
pub use raycast::VerticalRayCaster;
pub use section::{section_multiplane, slice_heights, CrossSection, SliceAxis};
pub use triangulation::{
    triangulate_polygon, triangulate_polygon_quality, triangulate_polygon_with_spacing,
    Triangulation2,
};
