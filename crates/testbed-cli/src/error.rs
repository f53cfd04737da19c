//! Error types for the CLI

use testbed_bootstrap::BootstrapError;
use testbed_identity::IdentityError;

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("validation error: {message}")]
    Validation { message: String },
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_errors_keep_their_message() {
        let err: Error = BootstrapError::validation("duplicate component name: a").into();
        assert_eq!(err.to_string(), "invalid plan: duplicate component name: a");
    }

    #[test]
    fn validation_helper_builds_variant() {
        let err = Error::validation("--edge-node ven requires --ven-command");
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(
            err.to_string(),
            "validation error: --edge-node ven requires --ven-command"
        );
    }
}
