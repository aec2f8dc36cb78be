use thiserror::Error;

/// Top-level error type for Edgar.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for EdgarError` (or the reverse) so that the `?`
/// operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EdgarError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for EdgarError {
    fn from(err: toml::de::Error) -> Self {
        EdgarError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for EdgarError {
    fn from(err: toml::ser::Error) -> Self {
        EdgarError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for EdgarError {
    fn from(err: serde_json::Error) -> Self {
        EdgarError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Edgar operations.
pub type Result<T> = std::result::Result<T, EdgarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EdgarError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");

        let err = EdgarError::Model("duplicate rule id".to_string());
        assert_eq!(err.to_string(), "Model error: duplicate rule id");

        let err = EdgarError::Serialization("eof".to_string());
        assert_eq!(err.to_string(), "Serialization error: eof");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: EdgarError = io_err.into();
        assert!(matches!(err, EdgarError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("not = {{ valid").unwrap_err();
        let err: EdgarError = toml_err.into();
        assert!(matches!(err, EdgarError::Config(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: EdgarError = json_err.into();
        assert!(matches!(err, EdgarError::Serialization(_)));
    }
}
