use std::path::PathBuf;

use thiserror::Error;

/// Rendering and image output errors.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to write image {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("PNG encoding failed: {0}")]
    Encoding(#[from] png::EncodingError),

    #[error("Camera {0} has not captured an image yet")]
    NoImage(String),

    #[error("Image has zero size")]
    EmptyImage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            RenderError::NoImage("tip".into()).to_string(),
            "Camera tip has not captured an image yet"
        );
        let err = RenderError::Io {
            path: PathBuf::from("/nowhere/camera.png"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("/nowhere/camera.png"));
    }
}
