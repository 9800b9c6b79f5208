// src/cert/verification.rs
use super::types::{CertKeyPair, ChainPath};
use crate::discovery::CertificateInfo;
use crate::error::{CertChainError, Result};
use openssl::pkey::PKey;
use openssl::x509::X509;

/// Checks that a stored private key belongs to the stored certificate.
pub fn verify_key_pair(path: &ChainPath, pair: &CertKeyPair) -> Result<()> {
    let cert = X509::from_pem(pair.cert_pem.as_bytes())
        .map_err(|e| CertChainError::structural(path, format!("unreadable certificate: {}", e)))?;
    let key = PKey::private_key_from_pem(pair.key_pem.as_bytes())
        .map_err(|e| CertChainError::structural(path, format!("unreadable private key: {}", e)))?;
    let public_key = cert
        .public_key()
        .map_err(|e| CertChainError::crypto("extract public key", e))?;

    if !public_key.public_eq(&key) {
        return Err(CertChainError::structural(
            path,
            "private key does not match certificate",
        ));
    }
    Ok(())
}

/// Checks that `cert_pem` was issued by the certificate currently held by its
/// parent: same issuer name, same recorded issuer serial, valid signature.
pub fn verify_issued_by(path: &ChainPath, cert_pem: &str, parent_cert_pem: &str) -> Result<()> {
    let info = CertificateInfo::from_pem(cert_pem.as_bytes())?;
    let parent = CertificateInfo::from_pem(parent_cert_pem.as_bytes())?;

    if info.issuer != parent.subject {
        return Err(CertChainError::structural(
            path,
            format!(
                "issuer {:?} does not match signer subject {:?}",
                info.issuer, parent.subject
            ),
        ));
    }

    if let Some(authority_serial) = &info.authority_serial {
        if authority_serial != &parent.serial {
            return Err(CertChainError::structural(
                path,
                format!(
                    "issued by signer serial {} but signer serial is now {}",
                    authority_serial, parent.serial
                ),
            ));
        }
    }

    let cert = X509::from_pem(cert_pem.as_bytes())
        .map_err(|e| CertChainError::crypto("parse certificate", e))?;
    let parent_key = X509::from_pem(parent_cert_pem.as_bytes())
        .and_then(|parent| parent.public_key())
        .map_err(|e| CertChainError::crypto("extract signer public key", e))?;
    let signed = cert
        .verify(&parent_key)
        .map_err(|e| CertChainError::crypto("verify certificate signature", e))?;
    if !signed {
        return Err(CertChainError::structural(
            path,
            "signature does not verify against the signer's current key",
        ));
    }
    Ok(())
}
