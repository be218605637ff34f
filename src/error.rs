use std::fmt;

/// Errors produced by the center-loss module, its dispersion routine and
/// the checkpoint/config I/O around them.
#[derive(Debug)]
pub enum CenterLossError {
    /// A constructor or config argument is invalid.
    InvalidInput(String),

    /// A shape invariant was violated (e.g. features vs. labels length).
    ShapeMismatch {
        /// What was being checked (e.g. "feature dim", "batch").
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// A label does not index a row of the centroid table.
    LabelOutOfRange { label: usize, num_classes: usize },

    Io(std::io::Error),

    Image(image::ImageError),

    Json(serde_json::Error),
}

impl fmt::Display for CenterLossError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CenterLossError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            CenterLossError::ShapeMismatch { what, expected, got } => {
                write!(f, "shape mismatch for {what}: got {got}, expected {expected}")
            }
            CenterLossError::LabelOutOfRange { label, num_classes } => {
                write!(f, "label {label} out of range for {num_classes} classes")
            }
            CenterLossError::Io(e) => write!(f, "io error: {e}"),
            CenterLossError::Image(e) => write!(f, "image error: {e}"),
            CenterLossError::Json(e) => write!(f, "json error: {e}"),
        }
    }
}

impl std::error::Error for CenterLossError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CenterLossError::Io(e) => Some(e),
            CenterLossError::Image(e) => Some(e),
            CenterLossError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CenterLossError {
    fn from(e: std::io::Error) -> Self {
        CenterLossError::Io(e)
    }
}

impl From<image::ImageError> for CenterLossError {
    fn from(e: image::ImageError) -> Self {
        CenterLossError::Image(e)
    }
}

impl From<serde_json::Error> for CenterLossError {
    fn from(e: serde_json::Error) -> Self {
        CenterLossError::Json(e)
    }
}

pub type Result<T> = std::result::Result<T, CenterLossError>;
