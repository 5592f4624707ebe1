//! Error type used by the crate.

use thiserror::Error;

/// Error enum.
#[derive(Debug, Error, PartialEq)]
pub enum TypesError {
    /// Coordinate system definition is not recognized.
    #[error("unsupported coordinate system: {0}")]
    UnsupportedCrs(String),
    /// Coordinates cannot be transformed between the two systems.
    #[error("no projection from {from} to {to}")]
    NoProjection {
        /// Source coordinate system.
        from: String,
        /// Target coordinate system.
        to: String,
    },
}
