//! Transport authenticator
//!
//! Builds the rustls client configuration from the trust pool and the
//! selected credential. The protocol version is pinned to TLS 1.2; the
//! broker must present a chain that verifies against the trust bundle.

use super::{AuthError, Credential, TrustBundle};
use rustls::{ClientConfig, RootCertStore};
use tracing::debug;

/// Build the TLS client configuration for one run.
///
/// The `X509` credential embeds the device certificate so the broker can
/// authenticate the client during the handshake. The `SasToken` credential
/// embeds nothing at the transport layer; the token is carried later as the
/// session password.
pub fn build_tls_config(
    trust: TrustBundle,
    credential: &Credential,
) -> Result<ClientConfig, AuthError> {
    let mut roots = RootCertStore::empty();
    for cert in trust.into_certs() {
        roots.add(cert)?;
    }

    let builder = ClientConfig::builder_with_protocol_versions(&[&rustls::version::TLS12])
        .with_root_certificates(roots);

    let config = match credential {
        Credential::X509 {
            cert_chain,
            private_key,
        } => {
            debug!("embedding X.509 client identity in TLS config");
            builder.with_client_auth_cert(cert_chain.clone(), private_key.clone_key())?
        }
        Credential::SasToken(_) => {
            debug!("token credential selected, no client certificate at transport layer");
            builder.with_no_client_auth()
        }
    };

    Ok(config)
}
