//! Error types for the viewer library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for asset loading and configuration.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image could not be decoded
    #[error("Image decode failed: {0}")]
    Image(#[from] image::ImageError),

    /// glTF document could not be parsed or its buffers resolved
    #[error("glTF load failed: {0}")]
    Gltf(#[from] gltf::Error),

    /// Named node missing from a loaded hierarchy
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// glTF file without a usable scene
    #[error("glTF file has no scene with children: {0}")]
    EmptyScene(PathBuf),

    /// Decoded image with unusable dimensions or layout
    #[error("Invalid image {path}: {reason}")]
    InvalidImage { path: PathBuf, reason: String },

    /// Config file could not be parsed
    #[error("Invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Create an invalid image error.
    pub fn invalid_image(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidImage {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for viewer operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::NodeNotFound("test".into());
        assert!(e.to_string().contains("test"));

        let e = Error::invalid_image("hdr/sky.hdr", "zero width");
        assert!(e.to_string().contains("sky.hdr"));
        assert!(e.to_string().contains("zero width"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_config_error_keeps_source() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::Config {
            path: PathBuf::from("config.json"),
            source,
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("config.json"));
    }
}
