// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Strut Core
//!
//! Triangle-mesh data model shared by the support-generation pipeline.
//!
//! The crate deliberately stays small: a double-precision indexed
//! [`TriangleMesh`] with the queries the pipeline needs (normals,
//! adjacency, boundary loops, connected components, signed volume,
//! watertightness, welding and subdivision), and [`Part`], the immutable
//! input wrapper with cached derived data.
//!
//! Conventions: Z-up, millimetre units, build plate at z = 0, face winding
//! counter-clockwise seen from outside.

pub mod mesh;
pub mod part;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point2, Point3, Vector2, Vector3};

pub use mesh::{box_mesh, TriangleMesh};
pub use part::Part;
