//! TLS configuration from PEM files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use tokio_rustls::rustls;

use crate::TransportError;

/// Builds a rustls server config from PEM certificate and key files.
///
/// # Errors
/// Any unreadable or empty file, or an unsupported key format, is a
/// [`TransportError::TlsMaterial`] — the caller treats it as fatal at
/// startup.
pub fn load_tls_config(
    cert_path: &Path,
    key_path: &Path,
) -> Result<Arc<rustls::ServerConfig>, TransportError> {
    let mut cert_reader = BufReader::new(open(cert_path)?);
    let certs = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| material(cert_path, &e))?;
    if certs.is_empty() {
        return Err(TransportError::TlsMaterial(format!(
            "{}: no certificates found",
            cert_path.display()
        )));
    }

    let mut key_reader = BufReader::new(open(key_path)?);
    let key = rustls_pemfile::private_key(&mut key_reader)
        .map_err(|e| material(key_path, &e))?
        .ok_or_else(|| {
            TransportError::TlsMaterial(format!(
                "{}: no private key found",
                key_path.display()
            ))
        })?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| TransportError::TlsMaterial(e.to_string()))?;
    Ok(Arc::new(config))
}

fn open(path: &Path) -> Result<File, TransportError> {
    File::open(path).map_err(|e| material(path, &e))
}

fn material(path: &Path, error: &dyn std::fmt::Display) -> TransportError {
    TransportError::TlsMaterial(format!("{}: {error}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_files_are_rejected() {
        let missing = Path::new("/definitely/not/here.pem");
        assert!(matches!(
            load_tls_config(missing, missing),
            Err(TransportError::TlsMaterial(_))
        ));
    }

    #[test]
    fn test_non_pem_content_is_rejected() {
        let dir = std::env::temp_dir();
        let cert = dir.join(format!("bonkhost-bad-cert-{}.pem", std::process::id()));
        let key = dir.join(format!("bonkhost-bad-key-{}.pem", std::process::id()));
        std::fs::write(&cert, "not a certificate").unwrap();
        std::fs::write(&key, "not a key").unwrap();

        assert!(matches!(
            load_tls_config(&cert, &key),
            Err(TransportError::TlsMaterial(_))
        ));
        let _ = std::fs::remove_file(cert);
        let _ = std::fs::remove_file(key);
    }
}
