//! TLS configuration and connector for client.

use crate::connection::TlsClientConfig;
use crate::error::ClientError;
use rustls::crypto::aws_lc_rs;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::RootCertStore;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsConnector;

/// Creates a TLS connector presenting the configured client certificate.
///
/// The server is verified against the configured CA only, never system roots.
pub fn create_tls_connector(
    config: &TlsClientConfig,
    server_host: &str,
) -> Result<(TlsConnector, ServerName<'static>), ClientError> {
    let mut root_store = RootCertStore::empty();
    for cert in load_certs(&config.ca_cert_path)? {
        root_store
            .add(cert)
            .map_err(|e| ClientError::TlsConfig(format!("invalid CA cert: {}", e)))?;
    }
    if root_store.is_empty() {
        return Err(ClientError::TlsConfig(format!(
            "no certificates found in {:?}",
            config.ca_cert_path
        )));
    }

    let certs = load_certs(&config.client_cert_path)?;
    let key = load_private_key(&config.client_key_path)?;

    let client_config =
        rustls::ClientConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| ClientError::TlsConfig(format!("unsupported protocol versions: {}", e)))?
            .with_root_certificates(root_store)
            .with_client_auth_cert(certs, key)
            .map_err(|e| ClientError::TlsConfig(format!("invalid client cert/key: {}", e)))?;

    let connector = TlsConnector::from(Arc::new(client_config));

    let server_name_str = config.server_name.as_deref().unwrap_or(server_host);
    let server_name = ServerName::try_from(server_name_str.to_string())
        .map_err(|_| ClientError::TlsConfig(format!("invalid server name: {}", server_name_str)))?;

    Ok((connector, server_name))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ClientError> {
    let file = File::open(path)
        .map_err(|e| ClientError::TlsConfig(format!("cannot open cert file {:?}: {}", path, e)))?;
    let mut reader = BufReader::new(file);

    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ClientError::TlsConfig(format!("invalid cert file {:?}: {}", path, e)))
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, ClientError> {
    let file = File::open(path)
        .map_err(|e| ClientError::TlsConfig(format!("cannot open key file {:?}: {}", path, e)))?;
    let mut reader = BufReader::new(file);

    loop {
        match rustls_pemfile::read_one(&mut reader)
            .map_err(|e| ClientError::TlsConfig(format!("invalid key file {:?}: {}", path, e)))?
        {
            Some(rustls_pemfile::Item::Pkcs1Key(key)) => return Ok(key.into()),
            Some(rustls_pemfile::Item::Pkcs8Key(key)) => return Ok(key.into()),
            Some(rustls_pemfile::Item::Sec1Key(key)) => return Ok(key.into()),
            None => {
                return Err(ClientError::TlsConfig(format!(
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
    use tempfile::TempDir;

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

    fn write_identity(dir: &TempDir) -> TlsClientConfig {
        let ca = rcgen::generate_simple_self_signed(vec!["endpointd-ca".to_string()]).unwrap();
        let client = rcgen::generate_simple_self_signed(vec!["client".to_string()]).unwrap();

        let ca_path = dir.path().join("ca.pem");
        let cert_path = dir.path().join("client.pem");
        let key_path = dir.path().join("client.key");
        std::fs::write(&ca_path, ca.cert.pem()).unwrap();
        std::fs::write(&cert_path, client.cert.pem()).unwrap();
        std::fs::write(&key_path, client.key_pair.serialize_pem()).unwrap();

        TlsClientConfig::new(ca_path, cert_path, key_path)
    }

    #[test]
    fn test_connector_server_name() {
        let dir = TempDir::new().unwrap();
        let config = write_identity(&dir);

        let (_, name) = create_tls_connector(&config, "127.0.0.1").unwrap();
        assert!(matches!(name, ServerName::IpAddress(_)));

        let config = config.with_server_name("localhost");
        let (_, name) = create_tls_connector(&config, "127.0.0.1").unwrap();
        assert_eq!(name, ServerName::try_from("localhost").unwrap());
    }

    #[test]
    fn test_connector_rejects_empty_ca() {
        let dir = TempDir::new().unwrap();
        let config = write_identity(&dir);
        std::fs::write(&config.ca_cert_path, "").unwrap();

        match create_tls_connector(&config, "localhost") {
            Err(e) => assert!(e.to_string().contains("no certificates")),
            Ok(_) => panic!("expected error"),
        }
    }
}
