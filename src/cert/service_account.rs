// src/cert/service_account.rs
use super::openssl::rsa_key;
use super::store::{read_pem, write_private, write_public};
use crate::error::{crypto_err, CertChainError, Result};
use crate::utils::logging::Logger;
use openssl::pkey::PKey;
use std::path::PathBuf;

const SA_KEY_BITS: u32 = 2048;
pub const SA_PRIVATE_KEY_FILE: &str = "service-account.key";
pub const SA_PUBLIC_KEY_FILE: &str = "service-account.crt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccountKeys {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
    /// False when an existing pair was reused.
    pub generated: bool,
}

/// Key pair the API server signs service-account tokens with. It is plain
/// RSA, not a certificate, and is never rotated here.
pub struct ServiceAccountGenerator<'a> {
    output_dir: PathBuf,
    logger: &'a mut dyn Logger,
}

impl<'a> ServiceAccountGenerator<'a> {
    pub fn new(output_dir: PathBuf, logger: &'a mut dyn Logger) -> Self {
        Self { output_dir, logger }
    }

    fn key_paths(&self) -> (PathBuf, PathBuf) {
        (
            self.output_dir.join(SA_PRIVATE_KEY_FILE),
            self.output_dir.join(SA_PUBLIC_KEY_FILE),
        )
    }

    /// Reuses a stored key pair when both halves are present and match;
    /// otherwise writes a new one.
    pub fn ensure_keys(&mut self) -> Result<ServiceAccountKeys> {
        let (private_key, public_key) = self.key_paths();

        if private_key.is_file() && public_key.is_file() {
            self.verify_keypair()?;
            self.logger.debug_log(&format!(
                "Using existing service account keys in {}",
                self.output_dir.display()
            ));
            return Ok(ServiceAccountKeys {
                private_key,
                public_key,
                generated: false,
            });
        }

        self.logger.log("Generating service account key pair");
        let key = rsa_key(SA_KEY_BITS)?;
        let private_pem = key
            .private_key_to_pem_pkcs8()
            .map_err(crypto_err("encode service account private key"))?;
        let public_pem = key
            .public_key_to_pem()
            .map_err(crypto_err("encode service account public key"))?;

        write_private(&private_key, &private_pem)?;
        write_public(&public_key, &public_pem)?;

        self.logger.log(&format!(
            "Service account keys written to {}",
            self.output_dir.display()
        ));
        Ok(ServiceAccountKeys {
            private_key,
            public_key,
            generated: true,
        })
    }

    pub fn verify_keypair(&self) -> Result<()> {
        let (private_key, public_key) = self.key_paths();

        let private = PKey::private_key_from_pem(read_pem(&private_key)?.as_bytes())
            .map_err(crypto_err("parse service account private key"))?;
        let public = PKey::public_key_from_pem(read_pem(&public_key)?.as_bytes())
            .map_err(crypto_err("parse service account public key"))?;

        if !public.public_eq(&private) {
            return Err(CertChainError::crypto(
                format!("verify {}", public_key.display()),
                "public key does not match the service account private key",
            ));
        }
        Ok(())
    }
}
