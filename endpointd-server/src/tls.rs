//! TLS configuration and acceptor.
//!
//! Every connection is mutually authenticated: the client must present a
//! certificate chaining to the configured client CA or the handshake fails.

use crate::config::TlsConfig;
use crate::error::ServerError;
use rustls::crypto::aws_lc_rs::{self, cipher_suite};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, SupportedCipherSuite};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// Cipher suites offered by the server, in preference order.
pub fn allowed_cipher_suites() -> Vec<SupportedCipherSuite> {
    vec![
        cipher_suite::TLS13_AES_256_GCM_SHA384,
        cipher_suite::TLS13_AES_128_GCM_SHA256,
        cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
        cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
        cipher_suite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
        cipher_suite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
    ]
}

/// The aws-lc-rs provider restricted to [`allowed_cipher_suites`].
pub fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(CryptoProvider {
        cipher_suites: allowed_cipher_suites(),
        ..aws_lc_rs::default_provider()
    })
}

/// Loads TLS certificates and creates a TLS acceptor.
pub fn create_tls_acceptor(config: &TlsConfig) -> Result<TlsAcceptor, ServerError> {
    let cert_path = config
        .cert_path
        .as_ref()
        .ok_or_else(|| ServerError::TlsConfig("cert_path not set".into()))?;
    let key_path = config
        .key_path
        .as_ref()
        .ok_or_else(|| ServerError::TlsConfig("key_path not set".into()))?;
    let client_ca_path = config
        .client_ca_path
        .as_ref()
        .ok_or_else(|| ServerError::TlsConfig("client_ca_path not set".into()))?;

    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;

    let mut client_roots = RootCertStore::empty();
    for cert in load_certs(client_ca_path)? {
        client_roots
            .add(cert)
            .map_err(|e| ServerError::TlsConfig(format!("invalid client CA cert: {}", e)))?;
    }
    if client_roots.is_empty() {
        return Err(ServerError::TlsConfig(format!(
            "no certificates found in {:?}",
            client_ca_path
        )));
    }

    let server_config = server_config(certs, key, client_roots)?;
    tracing::debug!(
        "TLS acceptor ready (client CA {:?}, {} cipher suites)",
        client_ca_path,
        allowed_cipher_suites().len()
    );
    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

/// Builds a server config that requires and verifies client certificates.
pub fn server_config(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    client_roots: RootCertStore,
) -> Result<rustls::ServerConfig, ServerError> {
    let provider = crypto_provider();

    let client_verifier =
        WebPkiClientVerifier::builder_with_provider(Arc::new(client_roots), provider.clone())
            .build()
            .map_err(|e| {
                ServerError::TlsConfig(format!("failed to build client verifier: {}", e))
            })?;

    let mut config = rustls::ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
        .map_err(|e| ServerError::TlsConfig(format!("unsupported protocol versions: {}", e)))?
        .with_client_cert_verifier(client_verifier)
        .with_single_cert(certs, key)
        .map_err(|e| ServerError::TlsConfig(format!("invalid server cert/key: {}", e)))?;

    config.ignore_client_order = true;
    Ok(config)
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ServerError> {
    let file = File::open(path)
        .map_err(|e| ServerError::TlsConfig(format!("cannot open cert file {:?}: {}", path, e)))?;
    let mut reader = BufReader::new(file);

    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::TlsConfig(format!("invalid cert file {:?}: {}", path, e)))
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, ServerError> {
    let file = File::open(path)
        .map_err(|e| ServerError::TlsConfig(format!("cannot open key file {:?}: {}", path, e)))?;
    let mut reader = BufReader::new(file);

    loop {
        match rustls_pemfile::read_one(&mut reader)
            .map_err(|e| ServerError::TlsConfig(format!("invalid key file {:?}: {}", path, e)))?
        {
            Some(rustls_pemfile::Item::Pkcs1Key(key)) => return Ok(key.into()),
            Some(rustls_pemfile::Item::Pkcs8Key(key)) => return Ok(key.into()),
            Some(rustls_pemfile::Item::Sec1Key(key)) => return Ok(key.into()),
            None => {
                return Err(ServerError::TlsConfig(format!(
                    "no private key found in {:?}",
                    path
                )))
            }
            _ => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_allowed_suites_are_aead_only() {
        let suites = allowed_cipher_suites();
        assert_eq!(suites.len(), 6);
        for suite in suites {
            let name = format!("{:?}", suite.suite());
            assert!(name.contains("GCM"), "unexpected suite {}", name);
        }
    }

    #[test]
    fn test_load_invalid_cert_path() {
        let result = load_certs(Path::new("/nonexistent/cert.pem"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("cannot open"));
    }

    #[test]
    fn test_load_invalid_key_path() {
        let result = load_private_key(Path::new("/nonexistent/key.pem"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("cannot open"));
    }

    #[test]
    fn test_load_empty_key_file() {
        let mut key_file = NamedTempFile::new().unwrap();
        key_file.write_all(b"not a valid key").unwrap();

        let result = load_private_key(key_file.path());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("no private key"));
    }

    #[test]
    fn test_create_acceptor_missing_paths() {
        let config = TlsConfig {
            cert_path: None,
            key_path: Some("/some/key.pem".into()),
            client_ca_path: Some("/some/ca.pem".into()),
        };
        match create_tls_acceptor(&config) {
            Err(e) => assert!(e.to_string().contains("cert_path not set")),
            Ok(_) => panic!("expected error"),
        }

        let config = TlsConfig {
            cert_path: Some("/some/cert.pem".into()),
            key_path: Some("/some/key.pem".into()),
            client_ca_path: None,
        };
        match create_tls_acceptor(&config) {
            Err(e) => assert!(e.to_string().contains("client_ca_path not set")),
            Ok(_) => panic!("expected error"),
        }
    }

    #[test]
    fn test_create_acceptor() {
        let dir = TempDir::new().unwrap();
        let ca = rcgen::generate_simple_self_signed(vec!["endpointd-ca".to_string()]).unwrap();
        let server = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();

        let config = TlsConfig::new(
            write_file(&dir, "server.pem", &server.cert.pem()),
            write_file(&dir, "server.key", &server.key_pair.serialize_pem()),
            write_file(&dir, "ca.pem", &ca.cert.pem()),
        );
        assert!(create_tls_acceptor(&config).is_ok());
    }

    #[test]
    fn test_create_acceptor_empty_client_ca() {
        let dir = TempDir::new().unwrap();
        let server = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();

        let config = TlsConfig::new(
            write_file(&dir, "server.pem", &server.cert.pem()),
            write_file(&dir, "server.key", &server.key_pair.serialize_pem()),
            write_file(&dir, "ca.pem", ""),
        );
        match create_tls_acceptor(&config) {
            Err(e) => assert!(e.to_string().contains("no certificates")),
            Ok(_) => panic!("expected error"),
        }
    }
}
