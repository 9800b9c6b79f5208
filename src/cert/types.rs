// cert/types.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;

pub const SHORT_LIVED_VALIDITY_DAYS: u32 = 365;
pub const LONG_LIVED_VALIDITY_DAYS: u32 = 365 * 10;

/// Rotation class of a certificate. Decides how early it gets replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lifetime {
    ShortLived,
    LongLived,
}

impl Lifetime {
    pub fn default_validity_days(self) -> u32 {
        match self {
            Lifetime::ShortLived => SHORT_LIVED_VALIDITY_DAYS,
            Lifetime::LongLived => LONG_LIVED_VALIDITY_DAYS,
        }
    }

    /// Leaves have no explicit class; anything issued for longer than the
    /// short-lived default is rotated on the long-lived schedule.
    pub fn for_validity_days(days: u32) -> Self {
        if days > SHORT_LIVED_VALIDITY_DAYS {
            Lifetime::LongLived
        } else {
            Lifetime::ShortLived
        }
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::ShortLived => write!(f, "short-lived"),
            Lifetime::LongLived => write!(f, "long-lived"),
        }
    }
}

/// Address of a certificate in the hierarchy: signer names from the root
/// down, ending with the certificate's own name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainPath(Vec<String>);

impl ChainPath {
    pub fn new<S: AsRef<str>>(segments: &[S]) -> Self {
        Self(segments.iter().map(|s| s.as_ref().to_string()).collect())
    }

    pub fn root(name: &str) -> Self {
        Self(vec![name.to_string()])
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Self(segments)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.len() < 2 {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    pub fn name(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn starts_with(&self, prefix: &ChainPath) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for ChainPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl<S: AsRef<str>> From<&[S]> for ChainPath {
    fn from(segments: &[S]) -> Self {
        Self::new(segments)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl UserInfo {
    pub fn new(name: &str, groups: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCertificateRequest {
    pub name: String,
    pub validity_days: u32,
    pub user: UserInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServingCertificateRequest {
    pub name: String,
    pub validity_days: u32,
    pub hostnames: Vec<String>,
}

/// Mutual-auth certificate, e.g. for storage cluster members talking to each
/// other. Carries both an identity and SANs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerCertificateRequest {
    pub name: String,
    pub validity_days: u32,
    pub user: UserInfo,
    pub hostnames: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CertificateType {
    Signer,
    Client,
    Serving,
    Peer,
}

impl CertificateType {
    /// Base file name (without extension) of the cert/key pair on disk.
    pub fn file_stem(self) -> &'static str {
        match self {
            CertificateType::Signer => "ca",
            CertificateType::Client => "client",
            CertificateType::Serving => "server",
            CertificateType::Peer => "peer",
        }
    }
}

impl fmt::Display for CertificateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateType::Signer => write!(f, "signer"),
            CertificateType::Client => write!(f, "client"),
            CertificateType::Serving => write!(f, "serving"),
            CertificateType::Peer => write!(f, "peer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AltName {
    Dns(String),
    Ip(IpAddr),
}

impl AltName {
    /// IP literals become IP SANs, everything else a DNS SAN.
    pub fn parse(value: &str) -> Self {
        match value.parse::<IpAddr>() {
            Ok(ip) => AltName::Ip(ip),
            Err(_) => AltName::Dns(value.to_string()),
        }
    }
}

impl fmt::Display for AltName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AltName::Dns(name) => write!(f, "DNS:{}", name),
            AltName::Ip(ip) => write!(f, "IP:{}", ip),
        }
    }
}

/// Everything the provider needs to issue one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateConfig {
    pub cert_type: CertificateType,
    pub common_name: String,
    pub organization: Vec<String>,
    pub validity_days: u32,
    pub alt_names: Vec<AltName>,
}

/// PEM-encoded certificate and private key.
#[derive(Clone, PartialEq, Eq)]
pub struct CertKeyPair {
    pub cert_pem: String,
    pub key_pem: String,
}

impl fmt::Debug for CertKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertKeyPair")
            .field("cert_pem", &self.cert_pem)
            .field("key_pem", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyAlgorithm {
    #[default]
    Rsa2048,
    Rsa4096,
    EcdsaP256,
}

/// Location of a cert/key pair on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertKeyFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl CertKeyFiles {
    pub fn new(dir: PathBuf, cert_type: CertificateType) -> Self {
        let stem = cert_type.file_stem();
        Self {
            cert: dir.join(format!("{}.crt", stem)),
            key: dir.join(format!("{}.key", stem)),
        }
    }
}
