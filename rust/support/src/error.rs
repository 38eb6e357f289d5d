// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for support generation
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while processing a single overhang region or block.
///
/// These are local by design: the region loop downgrades them to warnings
/// (or silent skips for sub-threshold areas) and carries on, so one bad
/// region never poisons the returned support list.
#[derive(Error, Debug)]
pub enum Error {
    #[error("flattened overhang patch has no simple closed outline")]
    DegenerateOutline,

    #[error("region area fell below the minimum area threshold")]
    SubthresholdArea,

    #[error("CSG backend returned an empty or invalid mesh: {0}")]
    CsgFailure(String),

    #[error("vertical projections disagree: {hits_up}/{expected} up, {hits_down}/{expected} down")]
    ProjectionMismatch {
        hits_up: usize,
        hits_down: usize,
        expected: usize,
    },

    #[error("support skin topology anomaly: {0}")]
    SkinTopologyAnomaly(String),

    #[error("boundary unexpectedly resolved to multiple polygons")]
    MultiPolygonOutline,

    #[error("geometry error: {0}")]
    Geometry(#[from] strut_geometry::Error),
}
