//! Error types for brandgen

use thiserror::Error;

/// The main error type for brandgen operations
#[derive(Debug, Error)]
pub enum BrandgenError {
    /// Missing secret, unknown job key, missing input file, bad catalog.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Upload error: {0}")]
    UploadError(String),

    #[error("Description error: {0}")]
    DescriptionError(String),

    #[error("Generation error: {0}")]
    GenerationError(String),

    #[error("Rate limited after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    #[error("Download error: {0}")]
    DownloadError(String),

    /// The request never produced a response (DNS, TLS, timeout, ...)
    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Palette error: {0}")]
    PaletteError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("TOML serialization error: {0}")]
    TomlSerError(String),
}

/// Result type alias for brandgen operations
pub type Result<T> = std::result::Result<T, BrandgenError>;

impl BrandgenError {
    /// Whether the error stops the process before any remote work starts
    pub fn is_config(&self) -> bool {
        matches!(self, BrandgenError::ConfigError(_))
    }
}

impl From<toml::de::Error> for BrandgenError {
    fn from(err: toml::de::Error) -> Self {
        BrandgenError::TomlParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for BrandgenError {
    fn from(err: toml::ser::Error) -> Self {
        BrandgenError::TomlSerError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_message() {
        let err = BrandgenError::RateLimitExceeded { attempts: 6 };
        assert_eq!(err.to_string(), "Rate limited after 6 attempts");
    }

    #[test]
    fn test_is_config() {
        assert!(BrandgenError::ConfigError("x".into()).is_config());
        assert!(!BrandgenError::UploadError("x".into()).is_config());
    }

    #[test]
    fn test_toml_error_conversion() {
        let err: BrandgenError = toml::from_str::<toml::Value>("= broken").unwrap_err().into();
        assert!(matches!(err, BrandgenError::TomlParseError(_)));
    }
}
