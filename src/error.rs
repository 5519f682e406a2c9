use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} while trying to {action}")]
    UnexpectedStatus { action: String, status: u16 },

    #[error("Required object not found: {kind} {name}")]
    MissingObject { kind: String, name: String },

    #[error("Invalid Workshop: {0}")]
    InvalidWorkshop(String),

    #[error("Password hashing error: {0}")]
    HashError(#[from] bcrypt::BcryptError),

    #[error("Background task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Finalizer error: {0}")]
    FinalizerError(String),
}

impl Error {
    /// Determine if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::KubeError(kube::Error::Api(ae)) => {
                ae.code == 409 || ae.code == 429 || ae.code >= 500
            }
            Error::KubeError(_) => true,
            Error::HttpError(_) | Error::UnexpectedStatus { .. } => true,
            _ => false,
        }
    }

    pub fn missing(kind: &str, name: &str) -> Self {
        Error::MissingObject {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }
}

/// Returns true if the error is a Kubernetes API error with the given status code
pub fn is_status(err: &kube::Error, code: u16) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16) -> Error {
        Error::KubeError(kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "test".to_string(),
            reason: "Test".to_string(),
            code,
        }))
    }

    #[test]
    fn test_conflicts_are_retryable() {
        assert!(api_error(409).is_retryable());
        assert!(api_error(503).is_retryable());
        assert!(!api_error(403).is_retryable());
    }

    #[test]
    fn test_assertions_are_not_retryable() {
        assert!(!Error::missing("SecurityContextConstraints", "privileged").is_retryable());
        assert!(!Error::InvalidWorkshop("userCount".to_string()).is_retryable());
    }
}
