//! Positioning error types

use perch_core::DomError;
use thiserror::Error;

/// Why a position could not be computed or applied
///
/// The controller never surfaces these to hosts; it logs them and leaves the
/// previous position in place.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PositionError {
    /// Trigger or panel element has not been set
    #[error("trigger and panel elements must be set before positioning")]
    MissingElements,

    /// Measuring or styling an element failed
    #[error(transparent)]
    Dom(#[from] DomError),
}

/// Result type for positioning operations
pub type Result<T> = std::result::Result<T, PositionError>;
