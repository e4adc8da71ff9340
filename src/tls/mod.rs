mod verifier;

use crate::config::TlsOptions;
use crate::error::ProbeError;
use rustls::crypto::ring::{default_provider, DEFAULT_CIPHER_SUITES};
use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, RootCertStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use x509_parser::parse_x509_certificate;

/// Negotiated TLS parameters captured right after the handshake.
#[derive(Debug, Clone, Serialize)]
pub struct TlsDetails {
    pub protocol_version: String,
    pub cipher_suite: String,
    pub certificates: Vec<CertificateSummary>,
}

/// Summary of one certificate in the peer's chain.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateSummary {
    pub subject: String,
    pub issuer: String,
    pub serial_number: String,
    pub not_before: String,
    pub not_after: String,
    pub subject_alt_names: Vec<String>,
    pub signature_algorithm: String,
    pub public_key_algorithm: String,
}

fn provider() -> CryptoProvider {
    CryptoProvider {
        cipher_suites: DEFAULT_CIPHER_SUITES.to_vec(),
        ..default_provider()
    }
}

/// Builds the rustls client configuration for a session. The root store is
/// the webpki bundle unless a PEM file is configured.
pub(crate) fn client_config(options: &TlsOptions) -> Result<ClientConfig, ProbeError> {
    let mut root_store = RootCertStore::empty();
    if let Some(path) = &options.ca_certificates {
        let f = std::fs::File::open(path).map_err(ProbeError::CaCertificates)?;
        let mut rd = std::io::BufReader::new(f);
        for cert in rustls_pemfile::certs(&mut rd) {
            root_store
                .add(cert.map_err(ProbeError::CaCertificates)?)
                .map_err(ProbeError::Tls)?;
        }
    } else {
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    let mut config = ClientConfig::builder_with_provider(provider().into())
        .with_protocol_versions(rustls::DEFAULT_VERSIONS)
        .map_err(ProbeError::Tls)?
        .with_root_certificates(root_store)
        .with_no_client_auth();

    if options.insecure_skip_verify {
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(verifier::InsecureVerifier::new(provider())));
    }
    Ok(config)
}

/// Captures the negotiated parameters and peer chain from a completed
/// handshake.
pub(crate) fn details(conn: &rustls::ClientConnection) -> TlsDetails {
    let protocol_version = conn
        .protocol_version()
        .map(|v| format!("{v:?}"))
        .unwrap_or_else(|| "unknown".to_string());
    let cipher_suite = conn
        .negotiated_cipher_suite()
        .map(|s| format!("{:?}", s.suite()))
        .unwrap_or_else(|| "unknown".to_string());

    let mut certificates = Vec::new();
    if let Some(certs) = conn.peer_certificates() {
        for der in certs {
            if let Some(summary) = certificate_summary(der.as_ref()) {
                certificates.push(summary);
            }
        }
    }

    TlsDetails {
        protocol_version,
        cipher_suite,
        certificates,
    }
}

fn certificate_summary(der: &[u8]) -> Option<CertificateSummary> {
    let (_, cert) = match parse_x509_certificate(der) {
        Ok(parsed) => parsed,
        Err(error) => {
            debug!(?error, "failed to parse peer certificate");
            return None;
        }
    };

    let subject_alt_names = match cert.tbs_certificate.subject_alternative_name() {
        Ok(Some(san)) => san
            .value
            .general_names
            .iter()
            .map(|name| format!("{}", name))
            .collect(),
        _ => Vec::new(),
    };

    Some(CertificateSummary {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        serial_number: cert.serial.to_string(),
        not_before: cert.validity().not_before.to_string(),
        not_after: cert.validity().not_after.to_string(),
        subject_alt_names,
        signature_algorithm: format!("{:?}", cert.signature_algorithm.algorithm),
        public_key_algorithm: format!("{:?}", cert.public_key().algorithm.algorithm),
    })
}

impl std::fmt::Display for TlsDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "TLS handshake:")?;
        writeln!(f, "  Version: {}", self.protocol_version)?;
        writeln!(f, "  Cipher Suite: {}", self.cipher_suite)?;
        for (i, cert) in self.certificates.iter().enumerate() {
            writeln!(f, "Certificate {}", i + 1)?;
            writeln!(f, "  Subject: {}", cert.subject)?;
            writeln!(f, "  Issuer: {}", cert.issuer)?;
            writeln!(f, "  Valid From: {}", cert.not_before)?;
            writeln!(f, "  Valid To: {}", cert.not_after)?;
            if !cert.subject_alt_names.is_empty() {
                writeln!(f, "  Subject Alternative Names:")?;
                for san in &cert.subject_alt_names {
                    writeln!(f, "    - {}", san)?;
                }
            }
            writeln!(f, "  Signature Algorithm: {}", cert.signature_algorithm)?;
            writeln!(f, "  Public Key Algorithm: {}", cert.public_key_algorithm)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_webpki_roots() {
        let config = client_config(&TlsOptions::default()).unwrap();
        assert!(config.alpn_protocols.is_empty());
    }

    #[test]
    fn missing_ca_bundle_is_reported() {
        let options = TlsOptions {
            ca_certificates: Some("/nonexistent/bundle.pem".into()),
            insecure_skip_verify: false,
        };
        assert!(matches!(
            client_config(&options),
            Err(ProbeError::CaCertificates(_))
        ));
    }

    #[test]
    fn insecure_config_builds() {
        let options = TlsOptions {
            ca_certificates: None,
            insecure_skip_verify: true,
        };
        client_config(&options).unwrap();
    }
}
