use crate::error::{CertChainError, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;
use x509_parser::prelude::{FromDer, GeneralName, ParsedExtension, X509Certificate};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    /// Hex of the DER serial number.
    pub serial: String,
    /// Serial of the issuing certificate as recorded in the Authority Key
    /// Identifier, when the issuer wrote one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority_serial: Option<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub fingerprint: String,
    pub is_ca: bool,
    #[serde(default)]
    pub alt_names: Vec<String>,
}

impl CertificateInfo {
    pub fn from_pem(cert_pem: &[u8]) -> Result<Self> {
        let cert_der = openssl::x509::X509::from_pem(cert_pem)
            .and_then(|cert| cert.to_der())
            .map_err(|e| CertChainError::crypto("decode certificate PEM", e))?;
        Self::from_der(&cert_der)
    }

    pub fn from_der(cert_der: &[u8]) -> Result<Self> {
        let (_remainder, cert) = X509Certificate::from_der(cert_der)
            .map_err(|e| CertChainError::crypto("parse certificate", e))?;

        let subject = cert.subject().to_string();
        let issuer = cert.issuer().to_string();
        let serial = hex::encode(cert.tbs_certificate.raw_serial());

        let not_before = Utc
            .timestamp_opt(cert.validity().not_before.timestamp(), 0)
            .single()
            .ok_or_else(|| CertChainError::crypto("read not_before", "invalid timestamp"))?;
        let not_after = Utc
            .timestamp_opt(cert.validity().not_after.timestamp(), 0)
            .single()
            .ok_or_else(|| CertChainError::crypto("read not_after", "invalid timestamp"))?;

        let mut is_ca = false;
        let mut authority_serial = None;
        let mut alt_names = Vec::new();
        for ext in cert.extensions() {
            match ext.parsed_extension() {
                ParsedExtension::BasicConstraints(bc) => is_ca = bc.ca,
                ParsedExtension::AuthorityKeyIdentifier(aki) => {
                    authority_serial = aki.authority_cert_serial.map(hex::encode);
                }
                ParsedExtension::SubjectAlternativeName(san) => {
                    alt_names.extend(san.general_names.iter().filter_map(format_general_name));
                }
                _ => {}
            }
        }

        let fingerprint = hex::encode(
            openssl::hash::hash(openssl::hash::MessageDigest::sha256(), cert_der)
                .map_err(|e| CertChainError::crypto("fingerprint certificate", e))?,
        );

        Ok(Self {
            subject,
            issuer,
            serial,
            authority_serial,
            not_before,
            not_after,
            fingerprint,
            is_ca,
            alt_names,
        })
    }
}

fn format_general_name(name: &GeneralName) -> Option<String> {
    match name {
        GeneralName::DNSName(dns) => Some(format!("DNS:{}", dns)),
        GeneralName::IPAddress(bytes) => match bytes.len() {
            4 => {
                let octets: [u8; 4] = (*bytes).try_into().ok()?;
                Some(format!("IP:{}", Ipv4Addr::from(octets)))
            }
            16 => {
                let octets: [u8; 16] = (*bytes).try_into().ok()?;
                Some(format!("IP:{}", Ipv6Addr::from(octets)))
            }
            _ => None,
        },
        _ => None,
    }
}

pub fn analyze_certificate(path: &Path) -> Result<CertificateInfo> {
    let cert_pem = fs::read(path).map_err(|e| CertChainError::io(path, e))?;
    CertificateInfo::from_pem(&cert_pem).map_err(|e| match e {
        CertChainError::Crypto { context, message } => CertChainError::Crypto {
            context: format!("{} ({})", context, path.display()),
            message,
        },
        other => other,
    })
}
