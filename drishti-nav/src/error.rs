//! Error types for DrishtiNav

use thiserror::Error;

/// DrishtiNav error type
///
/// Navigation outcomes (no candidate, interrupted, stuck) are reported as
/// plain values by the components; this type only covers setup failures.
#[derive(Error, Debug)]
pub enum NavError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image error: {0}")]
    Image(String),
}

impl From<toml::de::Error> for NavError {
    fn from(e: toml::de::Error) -> Self {
        NavError::Config(e.to_string())
    }
}

impl From<image::ImageError> for NavError {
    fn from(e: image::ImageError) -> Self {
        NavError::Image(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
