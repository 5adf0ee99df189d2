/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Error types for hierarchy construction, filtering and portable loads.

use thiserror::Error;

/// Result type for hierarchy operations.
pub type Result<T> = std::result::Result<T, HierarchyError>;

/// Errors raised by the hierarchy, its frontier engine and the portable schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HierarchyError {
    /// Filtering was requested on a hierarchy with no classes.
    #[error("hierarchy has no classes")]
    Empty,

    /// A class model is not ready for decoding.
    #[error("class {0} is not trained")]
    NotTrained(String),

    /// `add_class` was called with a label that already exists.
    #[error("class {0} already exists")]
    DuplicateLabel(String),

    /// The requested class does not exist.
    #[error("class {0} not found")]
    NotFound(String),

    /// A portable table references a label with no matching class.
    #[error("portable table references unknown class {0}")]
    UnknownLabel(String),

    /// A portable table does not have one record per class (or class pair).
    #[error("{table} table has {found} records, expected {expected}")]
    CardinalityMismatch {
        /// Name of the offending table.
        table: &'static str,
        /// Record count implied by the current classes.
        expected: usize,
        /// Record count actually supplied.
        found: usize,
    },

    /// Observation length does not match the model dimension.
    #[error("observation has {found} values, expected {expected}")]
    DimensionMismatch {
        /// Dimension the models decode.
        expected: usize,
        /// Length of the supplied observation.
        found: usize,
    },

    /// Every class assigned zero probability to the observation.
    #[error("degenerate frame: normalization constant is zero")]
    DegenerateFrame,

    /// Index or channel past the end of a container.
    #[error("index {index} out of range (len {len})")]
    OutOfRange {
        /// Requested index.
        index: usize,
        /// Valid length.
        len: usize,
    },

    /// Model parameters are malformed.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl HierarchyError {
    /// `true` for load rejections caused by a schema that does not fit the hierarchy.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::UnknownLabel(_) | Self::CardinalityMismatch { .. })
    }

    /// `true` when the stream can keep going after the error.
    ///
    /// Only degenerate frames qualify: the forward state is held and the
    /// next observation is processed normally.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::DegenerateFrame)
    }
}
