// src/cert/provider.rs
use super::types::{CertKeyPair, CertificateConfig};
use crate::error::Result;

/// Issues key pairs and certificates. `issuer` is `None` for self-signed
/// roots; otherwise the new certificate is signed by the issuer's key.
pub trait CertificateProvider: Send + Sync {
    fn generate(&self, config: &CertificateConfig, issuer: Option<&CertKeyPair>) -> Result<CertKeyPair>;
}
