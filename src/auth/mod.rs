//! Authentication material for the broker connection
//!
//! Two credential strategies exist: an X.509 certificate/key pair presented
//! during the TLS handshake, or a shared access signature carried as the MQTT
//! password. Exactly one is active per run.

use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

pub mod tls;
pub mod trust;

pub use tls::build_tls_config;
pub use trust::TrustBundle;

/// Errors raised while loading trust material or building the TLS config
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Failed to read trust bundle {path}: {source}")]
    TrustLoad {
        path: String,
        source: std::io::Error,
    },

    #[error("Malformed certificate block: {0}")]
    CertificateParse(String),

    #[error("Failed to read credential file {path}: {source}")]
    CredentialRead {
        path: String,
        source: std::io::Error,
    },

    #[error("No private key found in {0}")]
    MissingPrivateKey(String),

    #[error("TLS configuration rejected: {0}")]
    Tls(#[from] rustls::Error),
}

/// Client credential, selected at startup and never mutated
pub enum Credential {
    /// Certificate/key pair proven during the TLS handshake
    X509 {
        cert_chain: Vec<CertificateDer<'static>>,
        private_key: PrivateKeyDer<'static>,
    },
    /// Signed token carried as the MQTT password at session establishment
    SasToken(String),
}

impl Credential {
    /// Load an X.509 credential from PEM-encoded certificate and key files
    pub fn from_cert_files(cert_path: &Path, key_path: &Path) -> Result<Self, AuthError> {
        let file = File::open(cert_path).map_err(|source| AuthError::CredentialRead {
            path: cert_path.display().to_string(),
            source,
        })?;
        let cert_chain = rustls_pemfile::certs(&mut BufReader::new(file))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AuthError::CertificateParse(e.to_string()))?;
        if cert_chain.is_empty() {
            return Err(AuthError::CertificateParse(format!(
                "no CERTIFICATE block in {}",
                cert_path.display()
            )));
        }

        let file = File::open(key_path).map_err(|source| AuthError::CredentialRead {
            path: key_path.display().to_string(),
            source,
        })?;
        let private_key = rustls_pemfile::private_key(&mut BufReader::new(file))
            .map_err(|e| AuthError::CertificateParse(e.to_string()))?
            .ok_or_else(|| AuthError::MissingPrivateKey(key_path.display().to_string()))?;

        Ok(Self::X509 {
            cert_chain,
            private_key,
        })
    }

    /// Wrap a pre-signed shared access signature
    pub fn sas_token(token: impl Into<String>) -> Self {
        Self::SasToken(token.into())
    }

    /// The application-layer password for session establishment, if this
    /// credential carries one. X.509 authenticates at the transport layer
    /// and has no password.
    pub fn password(&self) -> Option<&str> {
        match self {
            Self::X509 { .. } => None,
            Self::SasToken(token) => Some(token),
        }
    }
}

// SAS tokens are bearer secrets; keep them out of Debug output.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X509 { cert_chain, .. } => f
                .debug_struct("Credential::X509")
                .field("cert_chain_len", &cert_chain.len())
                .finish_non_exhaustive(),
            Self::SasToken(_) => f.write_str("Credential::SasToken(***)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    #[test]
    fn test_x509_credential_from_files() {
        let credential =
            Credential::from_cert_files(&fixture("device.cert.pem"), &fixture("device.key.pem"))
                .unwrap();
        match &credential {
            Credential::X509 { cert_chain, .. } => assert_eq!(cert_chain.len(), 1),
            Credential::SasToken(_) => panic!("expected X509 credential"),
        }
        assert_eq!(credential.password(), None);
    }

    #[test]
    fn test_sas_credential_carries_password() {
        let credential = Credential::sas_token("SharedAccessSignature sr=...");
        assert_eq!(credential.password(), Some("SharedAccessSignature sr=..."));
    }

    #[test]
    fn test_missing_cert_file() {
        let result =
            Credential::from_cert_files(&fixture("no-such.cert.pem"), &fixture("device.key.pem"));
        assert!(matches!(result, Err(AuthError::CredentialRead { .. })));
    }

    #[test]
    fn test_key_file_without_key_material() {
        // A certificate file holds no private key block
        let result =
            Credential::from_cert_files(&fixture("device.cert.pem"), &fixture("device.cert.pem"));
        assert!(matches!(result, Err(AuthError::MissingPrivateKey(_))));
    }

    #[test]
    fn test_debug_never_prints_token() {
        let credential = Credential::sas_token("SharedAccessSignature sig=supersecret");
        let debug = format!("{credential:?}");
        assert!(!debug.contains("supersecret"));
        assert!(debug.contains("***"));
    }
}
