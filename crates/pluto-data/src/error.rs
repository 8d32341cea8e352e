//! Error types for snapshot processing.

use thiserror::Error;

use crate::types::UnitState;

/// Errors that can occur while loading, converting or slicing snapshot data.
#[derive(Error, Debug)]
pub enum PlutoError {
    /// Name is not a primal field, a registered field or an alias.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// A unit expression references a symbol that is not declared.
    #[error("unknown unit symbol '{symbol}' in expression '{expression}'")]
    UnknownUnitSymbol { symbol: String, expression: String },

    /// A unit expression could not be parsed.
    #[error("invalid unit expression '{expression}': {message}")]
    UnitSyntax { expression: String, message: String },

    /// Requested a unit-state transition that is not allowed from the current state.
    #[error("invalid unit state transition from {from} to {to}")]
    InvalidStateTransition { from: UnitState, to: UnitState },

    /// Geometry conversion requested on a geometry that has none.
    #[error("unsupported geometry: {0}")]
    UnsupportedGeometry(String),

    /// Wrong number of coordinates for the requested slice.
    #[error("invalid slice arguments: {0}")]
    InvalidSliceArguments(String),

    /// A derived field depends on itself.
    #[error("circular dependency between derived fields: {0}")]
    CircularDependency(String),

    /// Two units with different physical dimensions were mixed.
    #[error("incompatible units: cannot convert {from} to {to}")]
    IncompatibleUnits { from: String, to: String },

    /// Array shapes do not agree with the grid.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Run metadata (definitions.h, step log) is malformed.
    #[error("invalid run metadata: {0}")]
    InvalidMetadata(String),

    /// No logged step matches the requested index or time.
    #[error("step not found: {0}")]
    StepNotFound(String),

    /// Run configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The snapshot loader failed.
    #[error("loader error: {0}")]
    Loader(String),

    /// Filesystem error while reading run metadata.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML configuration error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PlutoError {
    /// Create an UnknownField error.
    pub fn unknown_field(name: impl Into<String>) -> Self {
        Self::UnknownField(name.into())
    }

    /// Create an UnknownUnitSymbol error.
    pub fn unknown_symbol(symbol: impl Into<String>, expression: impl Into<String>) -> Self {
        Self::UnknownUnitSymbol {
            symbol: symbol.into(),
            expression: expression.into(),
        }
    }

    /// Create a UnitSyntax error.
    pub fn unit_syntax(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnitSyntax {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidSliceArguments error.
    pub fn invalid_slice(msg: impl Into<String>) -> Self {
        Self::InvalidSliceArguments(msg.into())
    }

    /// Create an IncompatibleUnits error.
    pub fn incompatible(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::IncompatibleUnits {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }
}

impl From<ndarray::ShapeError> for PlutoError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::ShapeMismatch(err.to_string())
    }
}

/// Result type for snapshot operations.
pub type Result<T> = std::result::Result<T, PlutoError>;
