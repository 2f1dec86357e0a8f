//! Root trust loader
//!
//! Reads a PEM bundle from disk into the verification pool the broker's
//! certificate chain is validated against. Loaded once at startup; a
//! partially parsed pool is never accepted.

use super::AuthError;
use rustls_pki_types::CertificateDer;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// Ordered, immutable sequence of parsed root certificates
#[derive(Debug, Clone)]
pub struct TrustBundle {
    certs: Vec<CertificateDer<'static>>,
}

impl TrustBundle {
    /// Load every `CERTIFICATE` block from a PEM file. Blocks of any other
    /// type (keys, parameters) are ignored; a malformed certificate block
    /// fails the whole load.
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let file = File::open(path).map_err(|source| AuthError::TrustLoad {
            path: path.display().to_string(),
            source,
        })?;

        let certs = rustls_pemfile::certs(&mut BufReader::new(file))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AuthError::CertificateParse(e.to_string()))?;

        debug!(
            path = %path.display(),
            count = certs.len(),
            "loaded root trust bundle"
        );

        Ok(Self { certs })
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    pub(crate) fn into_certs(self) -> Vec<CertificateDer<'static>> {
        self.certs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    #[test]
    fn test_load_counts_only_certificates() {
        // Two certificates with a private key block between them
        let bundle = TrustBundle::load(&fixture("roots-mixed.pem")).unwrap();
        assert_eq!(bundle.len(), 2);
    }

    #[test]
    fn test_load_plain_bundle() {
        let bundle = TrustBundle::load(&fixture("roots.pem")).unwrap();
        assert_eq!(bundle.len(), 2);
        assert!(!bundle.is_empty());
    }

    #[test]
    fn test_unreadable_file_is_trust_load_error() {
        let result = TrustBundle::load(Path::new("certs/does-not-exist.pem"));
        match result {
            Err(AuthError::TrustLoad { path, .. }) => {
                assert!(path.contains("does-not-exist"));
            }
            other => panic!("expected TrustLoad error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_file_yields_empty_bundle() {
        let file = NamedTempFile::new().unwrap();
        let bundle = TrustBundle::load(file.path()).unwrap();
        assert!(bundle.is_empty());
    }

    #[test]
    fn test_malformed_certificate_block_fails() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "-----BEGIN CERTIFICATE-----").unwrap();
        writeln!(file, "this is not base64!!").unwrap();
        writeln!(file, "-----END CERTIFICATE-----").unwrap();
        file.flush().unwrap();

        let result = TrustBundle::load(file.path());
        assert!(matches!(result, Err(AuthError::CertificateParse(_))));
    }
}
