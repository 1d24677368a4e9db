//! TLS material for the negotiation endpoint.
//!
//! Both sides pin TLS 1.3 on the `ring` provider, which is what QUIC
//! requires.  Certificates and keys are read from PEM files.

use std::path::Path;
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};

use crate::error::CsiError;

/// Read every certificate in a PEM file, leaf first.
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, CsiError> {
    let certs = CertificateDer::pem_file_iter(path)
        .and_then(|iter| iter.collect::<Result<Vec<_>, _>>())
        .map_err(|e| CsiError::Configuration(format!("{}: {e}", path.display())))?;
    if certs.is_empty() {
        return Err(CsiError::Configuration(format!(
            "{}: no certificates found",
            path.display()
        )));
    }
    Ok(certs)
}

/// Read the first private key in a PEM file.
pub fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, CsiError> {
    PrivateKeyDer::from_pem_file(path)
        .map_err(|e| CsiError::Configuration(format!("{}: {e}", path.display())))
}

/// Server configuration presenting `certs` without client authentication.
pub fn server_config(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<rustls::ServerConfig, CsiError> {
    rustls::ServerConfig::builder_with_provider(provider())
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(CsiError::configuration)?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(CsiError::configuration)
}

/// Client configuration trusting only `roots`.
pub fn client_config(
    roots: impl IntoIterator<Item = CertificateDer<'static>>,
) -> Result<rustls::ClientConfig, CsiError> {
    let mut store = rustls::RootCertStore::empty();
    for cert in roots {
        store.add(cert).map_err(CsiError::configuration)?;
    }
    Ok(rustls::ClientConfig::builder_with_provider(provider())
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(CsiError::configuration)?
        .with_root_certificates(store)
        .with_no_client_auth())
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}
