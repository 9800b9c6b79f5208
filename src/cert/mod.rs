// src/cert/mod.rs
mod bundle;
mod chains;
pub mod control_plane;
mod openssl;
mod provider;
pub mod regenerate;
pub mod rotation;
pub mod service_account;
pub mod spec;
pub mod store;
#[cfg(test)]
pub(crate) mod test_support;
mod types;
pub mod verification;

pub use self::openssl::OpenSslProvider;
pub use chains::{CertificateChains, ChainNode, NodeRole};
pub use control_plane::control_plane_hierarchy;
pub use provider::CertificateProvider;
pub use regenerate::{regenerate_due, RegenerationOutcome, RegenerationReport, SkipReason};
pub use rotation::{certs_to_regenerate, rotation_due, DueCertificate, DueReason};
pub use service_account::{ServiceAccountGenerator, ServiceAccountKeys};
pub use spec::{BundleSpec, HierarchySpec, SignerSpec};
pub use types::{
    AltName, CertKeyFiles, CertKeyPair, CertificateConfig, CertificateType, ChainPath,
    ClientCertificateRequest, KeyAlgorithm, Lifetime, PeerCertificateRequest,
    ServingCertificateRequest, UserInfo, LONG_LIVED_VALIDITY_DAYS, SHORT_LIVED_VALIDITY_DAYS,
};
