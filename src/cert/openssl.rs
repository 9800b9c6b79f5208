// src/cert/openssl.rs
use super::provider::CertificateProvider;
use super::types::{AltName, CertKeyPair, CertificateConfig, CertificateType, KeyAlgorithm};
use crate::error::{crypto_err, Result};
use chrono::Utc;
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
    SubjectKeyIdentifier,
};
use openssl::x509::{X509Name, X509NameBuilder, X509NameRef, X509Ref, X509};

const X509_VERSION_3: i32 = 2;
const SERIAL_BITS: i32 = 128;
// Tolerates small clock differences between this node and its peers.
const NOT_BEFORE_BACKDATE_SECS: i64 = 60;
const SECS_PER_DAY: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Default)]
pub struct OpenSslProvider {
    algorithm: KeyAlgorithm,
}

impl OpenSslProvider {
    pub fn new(algorithm: KeyAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn generate_private_key(&self) -> Result<PKey<Private>> {
        match self.algorithm {
            KeyAlgorithm::Rsa2048 => rsa_key(2048),
            KeyAlgorithm::Rsa4096 => rsa_key(4096),
            KeyAlgorithm::EcdsaP256 => {
                let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)
                    .map_err(crypto_err("load P-256 curve"))?;
                let ec = EcKey::generate(&group).map_err(crypto_err("generate ECDSA key"))?;
                PKey::from_ec_key(ec).map_err(crypto_err("wrap ECDSA key"))
            }
        }
    }
}

pub fn rsa_key(bits: u32) -> Result<PKey<Private>> {
    let rsa = Rsa::generate(bits).map_err(crypto_err("generate RSA key"))?;
    PKey::from_rsa(rsa).map_err(crypto_err("wrap RSA key"))
}

fn subject_name(config: &CertificateConfig) -> Result<X509Name> {
    let mut name = X509NameBuilder::new().map_err(crypto_err("create subject name"))?;
    for org in &config.organization {
        name.append_entry_by_nid(Nid::ORGANIZATIONNAME, org)
            .map_err(crypto_err("set organization"))?;
    }
    name.append_entry_by_nid(Nid::COMMONNAME, &config.common_name)
        .map_err(crypto_err("set common name"))?;
    Ok(name.build())
}

impl CertificateProvider for OpenSslProvider {
    fn generate(&self, config: &CertificateConfig, issuer: Option<&CertKeyPair>) -> Result<CertKeyPair> {
        let private_key = self.generate_private_key()?;

        let issuer = match issuer {
            Some(pair) => Some((
                X509::from_pem(pair.cert_pem.as_bytes()).map_err(crypto_err("parse issuer certificate"))?,
                PKey::private_key_from_pem(pair.key_pem.as_bytes())
                    .map_err(crypto_err("parse issuer key"))?,
            )),
            None => None,
        };

        let mut builder = X509::builder().map_err(crypto_err("create certificate builder"))?;
        builder
            .set_version(X509_VERSION_3)
            .map_err(crypto_err("set version"))?;

        let mut serial = BigNum::new().map_err(crypto_err("allocate serial"))?;
        serial
            .rand(SERIAL_BITS, MsbOption::MAYBE_ZERO, false)
            .map_err(crypto_err("generate serial"))?;
        let serial = serial
            .to_asn1_integer()
            .map_err(crypto_err("encode serial"))?;
        builder
            .set_serial_number(&serial)
            .map_err(crypto_err("set serial"))?;

        let subject = subject_name(config)?;
        builder
            .set_subject_name(&subject)
            .map_err(crypto_err("set subject"))?;
        let issuer_name: &X509NameRef = match &issuer {
            Some((issuer_cert, _)) => issuer_cert.subject_name(),
            None => &subject,
        };
        builder
            .set_issuer_name(issuer_name)
            .map_err(crypto_err("set issuer"))?;

        let now = Utc::now().timestamp();
        let not_before = Asn1Time::from_unix((now - NOT_BEFORE_BACKDATE_SECS) as _)
            .map_err(crypto_err("create not_before"))?;
        let not_after = Asn1Time::from_unix((now + i64::from(config.validity_days) * SECS_PER_DAY) as _)
            .map_err(crypto_err("create not_after"))?;
        builder
            .set_not_before(&not_before)
            .map_err(crypto_err("set not_before"))?;
        builder
            .set_not_after(&not_after)
            .map_err(crypto_err("set not_after"))?;

        builder
            .set_pubkey(&private_key)
            .map_err(crypto_err("set public key"))?;

        let issuer_cert: Option<&X509Ref> = issuer.as_ref().map(|(cert, _)| &**cert);

        // Basic constraints and key usage
        let (basic_constraints, key_usage) = match config.cert_type {
            CertificateType::Signer => (
                BasicConstraints::new().critical().ca().build(),
                KeyUsage::new()
                    .critical()
                    .key_cert_sign()
                    .crl_sign()
                    .digital_signature()
                    .build(),
            ),
            _ => (
                BasicConstraints::new().critical().build(),
                KeyUsage::new()
                    .critical()
                    .digital_signature()
                    .key_encipherment()
                    .build(),
            ),
        };
        builder
            .append_extension(basic_constraints.map_err(crypto_err("build BasicConstraints"))?)
            .map_err(crypto_err("add BasicConstraints"))?;
        builder
            .append_extension(key_usage.map_err(crypto_err("build KeyUsage"))?)
            .map_err(crypto_err("add KeyUsage"))?;

        // Extended key usage
        let mut eku = ExtendedKeyUsage::new();
        let eku = match config.cert_type {
            CertificateType::Signer => None,
            CertificateType::Client => Some(eku.client_auth().build()),
            CertificateType::Serving => Some(eku.server_auth().build()),
            CertificateType::Peer => Some(eku.server_auth().client_auth().build()),
        };
        if let Some(eku) = eku {
            builder
                .append_extension(eku.map_err(crypto_err("build ExtendedKeyUsage"))?)
                .map_err(crypto_err("add ExtendedKeyUsage"))?;
        }

        let ski = SubjectKeyIdentifier::new()
            .build(&builder.x509v3_context(issuer_cert, None))
            .map_err(crypto_err("build SubjectKeyIdentifier"))?;
        builder
            .append_extension(ski)
            .map_err(crypto_err("add SubjectKeyIdentifier"))?;

        // Record the issuer's subject and serial so a stale link is detectable.
        if issuer_cert.is_some() {
            let aki = AuthorityKeyIdentifier::new()
                .keyid(false)
                .issuer(true)
                .build(&builder.x509v3_context(issuer_cert, None))
                .map_err(crypto_err("build AuthorityKeyIdentifier"))?;
            builder
                .append_extension(aki)
                .map_err(crypto_err("add AuthorityKeyIdentifier"))?;
        }

        if !config.alt_names.is_empty() {
            let mut san = SubjectAlternativeName::new();
            for alt_name in &config.alt_names {
                match alt_name {
                    AltName::Dns(dns) => san.dns(dns),
                    AltName::Ip(ip) => san.ip(&ip.to_string()),
                };
            }
            let san = san
                .build(&builder.x509v3_context(issuer_cert, None))
                .map_err(crypto_err("build SubjectAlternativeName"))?;
            builder
                .append_extension(san)
                .map_err(crypto_err("add SubjectAlternativeName"))?;
        }

        let signing_key = match &issuer {
            Some((_, key)) => key,
            None => &private_key,
        };
        builder
            .sign(signing_key, MessageDigest::sha256())
            .map_err(crypto_err("sign certificate"))?;
        let certificate = builder.build();

        let cert_pem = certificate.to_pem().map_err(crypto_err("encode certificate"))?;
        let key_pem = private_key
            .private_key_to_pem_pkcs8()
            .map_err(crypto_err("encode private key"))?;

        Ok(CertKeyPair {
            cert_pem: String::from_utf8(cert_pem).map_err(crypto_err("encode certificate"))?,
            key_pem: String::from_utf8(key_pem).map_err(crypto_err("encode private key"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::CertificateInfo;

    fn provider() -> OpenSslProvider {
        OpenSslProvider::new(KeyAlgorithm::EcdsaP256)
    }

    fn signer_config(name: &str) -> CertificateConfig {
        CertificateConfig {
            cert_type: CertificateType::Signer,
            common_name: name.to_string(),
            organization: vec![],
            validity_days: 365,
            alt_names: vec![],
        }
    }

    #[test]
    fn test_self_signed_signer() {
        let root = provider().generate(&signer_config("test-signer"), None).unwrap();
        let info = CertificateInfo::from_pem(root.cert_pem.as_bytes()).unwrap();

        assert!(info.is_ca);
        assert_eq!(info.subject, info.issuer);
        assert!(info.subject.contains("CN=test-signer"));
        assert_eq!(info.authority_serial, None);
        assert!(root.key_pem.contains("PRIVATE KEY"));
        let days = (info.not_after - info.not_before).num_days();
        assert_eq!(days, 365);
    }

    #[test]
    fn test_serving_certificate_signed_by_issuer() {
        let provider = provider();
        let root = provider.generate(&signer_config("serving-signer"), None).unwrap();
        let root_info = CertificateInfo::from_pem(root.cert_pem.as_bytes()).unwrap();

        let config = CertificateConfig {
            cert_type: CertificateType::Serving,
            common_name: "kubernetes".to_string(),
            organization: vec![],
            validity_days: 30,
            alt_names: vec![
                AltName::parse("kubernetes.default.svc"),
                AltName::parse("10.43.0.1"),
            ],
        };
        let leaf = provider.generate(&config, Some(&root)).unwrap();
        let info = CertificateInfo::from_pem(leaf.cert_pem.as_bytes()).unwrap();

        assert!(!info.is_ca);
        assert_eq!(info.issuer, root_info.subject);
        assert_eq!(info.authority_serial.as_deref(), Some(root_info.serial.as_str()));
        assert_eq!(info.alt_names, vec!["DNS:kubernetes.default.svc", "IP:10.43.0.1"]);

        let leaf_x509 = X509::from_pem(leaf.cert_pem.as_bytes()).unwrap();
        let root_x509 = X509::from_pem(root.cert_pem.as_bytes()).unwrap();
        assert!(leaf_x509.verify(&root_x509.public_key().unwrap()).unwrap());
    }

    #[test]
    fn test_client_identity_in_subject() {
        let provider = provider();
        let root = provider.generate(&signer_config("client-signer"), None).unwrap();
        let config = CertificateConfig {
            cert_type: CertificateType::Client,
            common_name: "system:admin".to_string(),
            organization: vec!["system:masters".to_string()],
            validity_days: 30,
            alt_names: vec![],
        };
        let leaf = provider.generate(&config, Some(&root)).unwrap();
        let info = CertificateInfo::from_pem(leaf.cert_pem.as_bytes()).unwrap();

        assert!(info.subject.contains("CN=system:admin"));
        assert!(info.subject.contains("O=system:masters"));
    }
}
