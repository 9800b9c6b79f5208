// src/cert/test_support.rs
//! Fixtures shared by the certificate tests.

use super::chains::CertificateChains;
use super::spec::{BundleSpec, HierarchySpec, SignerSpec};
use super::types::{
    CertKeyPair, CertificateConfig, CertificateType, ClientCertificateRequest, KeyAlgorithm,
    Lifetime, PeerCertificateRequest, ServingCertificateRequest, UserInfo,
};
use super::{CertificateProvider, OpenSslProvider};
use crate::config::RunParams;
use crate::error::Result;
use crate::utils::logging::MemoryLogger;
use std::path::Path;

pub fn provider() -> OpenSslProvider {
    // P-256 keeps the suites fast
    OpenSslProvider::new(KeyAlgorithm::EcdsaP256)
}

pub fn params() -> RunParams {
    RunParams {
        node_name: "node-1".to_string(),
        node_ip: "192.168.1.20".to_string(),
        service_cidr: "10.43.0.0/16".to_string(),
        base_domain: "example.com".to_string(),
    }
}

/// Three roots: a short-lived signer with a sub-signer, an exempt long-lived
/// signer, and a long-lived signer with long-lived leaves.
pub fn sample_spec() -> HierarchySpec {
    HierarchySpec {
        signers: vec![
            SignerSpec {
                sub_signers: vec![SignerSpec {
                    client_certificates: vec![ClientCertificateRequest {
                        name: "kubelet-client".to_string(),
                        validity_days: 365,
                        user: UserInfo::new("system:node:{node_name}", &["system:nodes"]),
                    }],
                    serving_certificates: vec![ServingCertificateRequest {
                        name: "kubelet-server".to_string(),
                        validity_days: 365,
                        hostnames: vec!["{node_name}".to_string(), "{node_ip}".to_string()],
                    }],
                    ..SignerSpec::new("kube-csr-signer", "kube-csr-signer", Lifetime::ShortLived)
                }],
                ..SignerSpec::new("kubelet-signer", "kubelet-signer", Lifetime::ShortLived)
            },
            SignerSpec {
                rotation_exempt: true,
                serving_certificates: vec![ServingCertificateRequest {
                    name: "service-network-serving".to_string(),
                    validity_days: 365,
                    hostnames: vec!["kubernetes".to_string(), "{service_ip}".to_string()],
                }],
                ..SignerSpec::new(
                    "service-network-signer",
                    "service-network-signer",
                    Lifetime::LongLived,
                )
            },
            SignerSpec {
                client_certificates: vec![ClientCertificateRequest {
                    name: "apiserver-etcd-client".to_string(),
                    validity_days: 3650,
                    user: UserInfo::new("etcd", &["etcd"]),
                }],
                peer_certificates: vec![PeerCertificateRequest {
                    name: "etcd-peer".to_string(),
                    validity_days: 3650,
                    user: UserInfo::new("system:etcd-peer:etcd-client", &["system:etcd-peers"]),
                    hostnames: vec!["localhost".to_string(), "{node_ip}".to_string()],
                }],
                ..SignerSpec::new("etcd-signer", "etcd-signer", Lifetime::LongLived)
            },
        ],
        bundles: vec![
            BundleSpec::new(
                "ca-bundle/client-ca.crt",
                &[
                    &["kubelet-signer"],
                    &["kubelet-signer", "kube-csr-signer"],
                    &["kubelet-signer"],
                ],
            ),
            BundleSpec::new("ca-bundle/serving-ca.crt", &[&["service-network-signer"]]),
        ],
    }
}

pub fn build(certs_dir: &Path, logger: MemoryLogger) -> Result<CertificateChains> {
    CertificateChains::complete(
        &sample_spec(),
        &params(),
        certs_dir,
        Box::new(provider()),
        Box::new(logger),
    )
}

/// A self-signed signer unrelated to anything in a built store.
pub fn generate_signer(name: &str) -> CertKeyPair {
    let config = CertificateConfig {
        cert_type: CertificateType::Signer,
        common_name: name.to_string(),
        organization: vec![],
        validity_days: 365,
        alt_names: vec![],
    };
    provider()
        .generate(&config, None)
        .expect("signer generation")
}
