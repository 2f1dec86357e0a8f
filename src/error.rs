//! Unified error type for the telemetry client
//!
//! Every component returns `Result` with its own layer error; this module
//! folds them into one type so the lifecycle controller and `main` decide
//! what is fatal instead of each component terminating the process itself.

use thiserror::Error;

/// Top-level error for one telemetry run
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Authentication error: {0}")]
    Auth(#[from] crate::auth::AuthError),

    #[error("Transport error: {0}")]
    Transport(#[from] crate::transport::mqtt::TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for telemetry client operations
pub type DeviceResult<T> = Result<T, DeviceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthError;
    use crate::config::ConfigError;
    use crate::transport::mqtt::TransportError;

    #[test]
    fn test_config_error_conversion() {
        let err: DeviceError = ConfigError::InvalidHubName("bad hub".to_string()).into();
        assert!(matches!(err, DeviceError::Config(_)));
        assert!(err.to_string().contains("bad hub"));
    }

    #[test]
    fn test_auth_error_conversion() {
        let err: DeviceError = AuthError::CertificateParse("truncated block".to_string()).into();
        assert!(matches!(err, DeviceError::Auth(_)));
        assert!(err.to_string().contains("truncated block"));
    }

    #[test]
    fn test_transport_error_conversion() {
        let err: DeviceError = TransportError::ConnackTimeout.into();
        assert!(matches!(err, DeviceError::Transport(_)));
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "signal handler");
        let err: DeviceError = io.into();
        assert!(matches!(err, DeviceError::Io(_)));
        assert!(err.to_string().contains("signal handler"));
    }
}
