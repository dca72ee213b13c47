//! Error types for cascade

use std::fmt;

use thiserror::Error;

/// Layout configuration errors
///
/// The layout engine itself is total over valid configuration; these errors are
/// raised when building configuration values, never while laying out.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// A cyclic column width sequence had no entries
    #[error("Column width sequence must not be empty")]
    EmptyColumnWidths,

    /// Column width was zero, negative, or not finite
    #[error("Invalid column width {0}: widths must be finite and greater than zero")]
    InvalidColumnWidth(f32),

    /// Gap was negative or not finite
    #[error("Invalid gap {0}: gap must be finite and not negative")]
    InvalidGap(f32),
}

/// Failure reported by a scroll-load callback
///
/// Only the message survives; it is what `scrollLoadEnd` carries to observers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct LoadError {
    message: String,
}

impl LoadError {
    /// Create a load error from anything displayable
    pub fn new(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    /// The failure message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for LoadError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for LoadError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Result type for layout configuration
pub type Result<T> = std::result::Result<T, LayoutError>;
