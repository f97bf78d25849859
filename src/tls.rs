//! TLS setup for the QUIC transport
//!
//! PEM loading for the endpoint's own chain and for the roots the client
//! trusts, plus the rustls configs for both sides. Both sides pin ALPN to the
//! advertised protocol id so a peer speaking something else fails the
//! handshake.

use std::path::Path;
use std::sync::Arc;

use quinn::crypto::rustls::{QuicClientConfig, QuicServerConfig};
use quinn::rustls::crypto::{ring, CryptoProvider};
use quinn::rustls::pki_types::pem::PemObject;
use quinn::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use quinn::rustls::{version, ClientConfig, RootCertStore, ServerConfig};

use crate::error::TlsError;

/// Load every certificate from a PEM file
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let pem_error = |source| TlsError::Pem {
        path: path.to_path_buf(),
        source,
    };

    let certs = CertificateDer::pem_file_iter(path)
        .map_err(pem_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(pem_error)?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }

    Ok(certs)
}

/// Load the first private key from a PEM file
pub fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    PrivateKeyDer::from_pem_file(path).map_err(|source| TlsError::Pem {
        path: path.to_path_buf(),
        source,
    })
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(ring::default_provider())
}

/// Server crypto for a certificate chain, accepting only `alpn`
pub fn server_crypto(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    alpn: &[u8],
) -> Result<QuicServerConfig, TlsError> {
    let mut crypto = ServerConfig::builder_with_provider(provider())
        .with_protocol_versions(&[&version::TLS13])?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    crypto.alpn_protocols = vec![alpn.to_vec()];

    Ok(QuicServerConfig::try_from(crypto)?)
}

/// Client crypto trusting `roots`, offering only `alpn`
pub fn client_crypto(roots: RootCertStore, alpn: &[u8]) -> Result<QuicClientConfig, TlsError> {
    let mut crypto = ClientConfig::builder_with_provider(provider())
        .with_protocol_versions(&[&version::TLS13])?
        .with_root_certificates(roots)
        .with_no_client_auth();
    crypto.alpn_protocols = vec![alpn.to_vec()];

    Ok(QuicClientConfig::try_from(crypto)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let file = format!("altcast-tls-{}-{}", std::process::id(), name);
        let path = std::env::temp_dir().join(file);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_generated_pair() {
        let generated = rcgen::generate_simple_self_signed(vec!["localhost".into()]).unwrap();
        let cert_path = temp_file("cert.pem", &generated.cert.pem());
        let key_path = temp_file("key.pem", &generated.key_pair.serialize_pem());

        let certs = tokio_test::assert_ok!(load_certs(&cert_path));
        tokio_test::assert_ok!(load_key(&key_path));

        assert_eq!(certs.len(), 1);
        assert_eq!(certs[0].as_ref(), generated.cert.der().as_ref());

        let _ = std::fs::remove_file(cert_path);
        let _ = std::fs::remove_file(key_path);
    }

    #[test]
    fn test_crypto_configs_build() {
        let generated = rcgen::generate_simple_self_signed(vec!["localhost".into()]).unwrap();
        let cert = generated.cert.der().clone();
        let key = PrivateKeyDer::Pkcs8(generated.key_pair.serialize_der().into());

        let mut roots = RootCertStore::empty();
        roots.add(cert.clone()).unwrap();

        tokio_test::assert_ok!(server_crypto(vec![cert], key, b"h3"));
        tokio_test::assert_ok!(client_crypto(roots, b"h3"));
    }

    #[test]
    fn test_missing_file() {
        let result = load_certs(Path::new("/nonexistent/altcast.pem"));

        assert!(matches!(result, Err(TlsError::Pem { .. })));
    }

    #[test]
    fn test_file_without_certificates() {
        let path = temp_file("empty.pem", "not a pem file\n");

        assert!(matches!(load_certs(&path), Err(TlsError::NoCertificates(_))));

        let _ = std::fs::remove_file(path);
    }
}
