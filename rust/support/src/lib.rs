// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Strut Support
//!
//! Support-structure generation for metal powder-bed fusion.
//!
//! Given a watertight part mesh and an overhang-angle threshold, the
//! pipeline identifies the surface regions that would fail to print,
//! extracts one conformal block-support volume per region, and fills each
//! block with a perforated, toothed truss lattice and a conformal skin so
//! the support can be removed after the build.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use strut_core::Part;
//! use strut_support::{CoreTolerances, GridSupportGenerator, SupportConfig,
//!     SupportStructure, TrussConfig};
//!
//! let part = Part::new("bracket", mesh);
//! let generator = GridSupportGenerator::new(
//!     SupportConfig::default(),
//!     TrussConfig::default(),
//!     CoreTolerances::default(),
//! );
//!
//! for block in generator.identify_support_regions(&part, 45.0, true) {
//!     let mesh = block.geometry();
//!     println!("support: {} triangles", mesh.triangle_count());
//! }
//! ```

pub mod block;
pub mod config;
pub mod error;
pub mod generator;
pub mod overhang;
pub mod skin;
pub mod truss;

pub use block::{BlockSupport, GridBlockSupport, SupportStructure};
pub use config::{grad_threshold, CoreTolerances, SupportConfig, TrussConfig};
pub use error::{Error, Result};
pub use generator::{BlockSupportGenerator, GridSupportGenerator};
pub use overhang::{find_overhang_edges, find_overhang_points, find_overhang_surfaces};
pub use skin::generate_support_skins;
pub use truss::{generate_support_slices, stamp_teeth, tooth_profile};
