// src/cert/control_plane.rs
//! Default hierarchy for a single-node control plane.
//!
//! Identities and hostnames use the `{node_name}`, `{node_ip}`,
//! `{service_ip}` and `{base_domain}` placeholders, filled in by
//! [`HierarchySpec::render`].

use super::spec::{BundleSpec, HierarchySpec, SignerSpec};
use super::types::{
    ClientCertificateRequest, Lifetime, PeerCertificateRequest, ServingCertificateRequest,
    UserInfo, LONG_LIVED_VALIDITY_DAYS, SHORT_LIVED_VALIDITY_DAYS,
};

const SHORT: u32 = SHORT_LIVED_VALIDITY_DAYS;
const LONG: u32 = LONG_LIVED_VALIDITY_DAYS;

pub const CLIENT_CA_BUNDLE: &str = "ca-bundle/client-ca.crt";
pub const KUBELET_CLIENT_CA_BUNDLE: &str = "ca-bundle/kubelet-client-ca.crt";
pub const SERVICE_ACCOUNT_TOKEN_CA_BUNDLE: &str = "ca-bundle/service-account-token-ca.crt";

fn client(name: &str, validity_days: u32, user: &str, groups: &[&str]) -> ClientCertificateRequest {
    ClientCertificateRequest {
        name: name.to_string(),
        validity_days,
        user: UserInfo::new(user, groups),
    }
}

fn serving(name: &str, validity_days: u32, hostnames: &[&str]) -> ServingCertificateRequest {
    ServingCertificateRequest {
        name: name.to_string(),
        validity_days,
        hostnames: hostnames.iter().map(|h| h.to_string()).collect(),
    }
}

fn peer(
    name: &str,
    validity_days: u32,
    user: &str,
    groups: &[&str],
    hostnames: &[&str],
) -> PeerCertificateRequest {
    PeerCertificateRequest {
        name: name.to_string(),
        validity_days,
        user: UserInfo::new(user, groups),
        hostnames: hostnames.iter().map(|h| h.to_string()).collect(),
    }
}

fn signer(name: &str, lifetime: Lifetime) -> SignerSpec {
    SignerSpec::new(name, name, lifetime)
}

fn exempt(name: &str, lifetime: Lifetime) -> SignerSpec {
    SignerSpec {
        rotation_exempt: true,
        ..signer(name, lifetime)
    }
}

pub fn control_plane_hierarchy() -> HierarchySpec {
    use Lifetime::{LongLived, ShortLived};

    let signers = vec![
        SignerSpec {
            client_certificates: vec![
                client("kube-controller-manager", SHORT, "system:kube-controller-manager", &[]),
                client("kube-scheduler", SHORT, "system:kube-scheduler", &[]),
            ],
            ..signer("kube-control-plane-signer", ShortLived)
        },
        SignerSpec {
            client_certificates: vec![client(
                "kube-apiserver-to-kubelet-client",
                SHORT,
                "system:kube-apiserver",
                &["kube-master"],
            )],
            ..signer("kube-apiserver-to-kubelet-signer", ShortLived)
        },
        SignerSpec {
            client_certificates: vec![client(
                "admin-kubeconfig-client",
                LONG,
                "system:admin",
                &["system:masters"],
            )],
            ..exempt("admin-kubeconfig-signer", LongLived)
        },
        SignerSpec {
            sub_signers: vec![SignerSpec {
                client_certificates: vec![client(
                    "kubelet-client",
                    SHORT,
                    "system:node:{node_name}",
                    &["system:nodes"],
                )],
                serving_certificates: vec![serving(
                    "kubelet-server",
                    SHORT,
                    &["{node_name}", "{node_ip}"],
                )],
                ..signer("kube-csr-signer", ShortLived)
            }],
            ..signer("kubelet-signer", ShortLived)
        },
        SignerSpec {
            client_certificates: vec![client(
                "aggregator-client",
                SHORT,
                "system:openshift-aggregator",
                &[],
            )],
            ..signer("aggregator-signer", ShortLived)
        },
        SignerSpec {
            serving_certificates: vec![serving(
                "route-controller-manager-serving",
                SHORT,
                &[
                    "route-controller-manager.openshift-route-controller-manager.svc",
                    "route-controller-manager.openshift-route-controller-manager.svc.cluster.local",
                ],
            )],
            ..signer("service-ca", LongLived)
        },
        SignerSpec {
            serving_certificates: vec![serving(
                "router-default-serving",
                SHORT,
                &["router-default.apps.{base_domain}"],
            )],
            ..signer("ingress-ca", LongLived)
        },
        SignerSpec {
            serving_certificates: vec![serving("kube-external-serving", SHORT, &["{node_name}"])],
            ..exempt("kube-apiserver-external-signer", LongLived)
        },
        SignerSpec {
            serving_certificates: vec![serving(
                "kube-apiserver-localhost-serving",
                SHORT,
                &["127.0.0.1", "localhost"],
            )],
            ..exempt("kube-apiserver-localhost-signer", LongLived)
        },
        SignerSpec {
            serving_certificates: vec![serving(
                "kube-apiserver-service-network-serving",
                SHORT,
                &[
                    "kubernetes",
                    "kubernetes.default",
                    "kubernetes.default.svc",
                    "kubernetes.default.svc.cluster.local",
                    "openshift",
                    "openshift.default",
                    "openshift.default.svc",
                    "openshift.default.svc.cluster.local",
                    "{service_ip}",
                ],
            )],
            ..exempt("kube-apiserver-service-network-signer", LongLived)
        },
        SignerSpec {
            client_certificates: vec![client("apiserver-etcd-client", LONG, "etcd", &["etcd"])],
            peer_certificates: vec![
                peer(
                    "etcd-peer",
                    LONG,
                    "system:etcd-peer:etcd-client",
                    &["system:etcd-peers"],
                    &["localhost", "{node_ip}", "127.0.0.1", "{node_name}"],
                ),
                peer(
                    "etcd-serving",
                    LONG,
                    "system:etcd-server:etcd-client",
                    &["system:etcd-servers"],
                    &["localhost", "127.0.0.1", "{node_ip}", "{node_name}"],
                ),
            ],
            ..signer("etcd-signer", LongLived)
        },
    ];

    let client_ca: &[&[&str]] = &[
        &["kube-control-plane-signer"],
        &["kube-apiserver-to-kubelet-signer"],
        &["admin-kubeconfig-signer"],
        &["kubelet-signer"],
        &["kubelet-signer", "kube-csr-signer"],
    ];
    let bundles = vec![
        BundleSpec::new(CLIENT_CA_BUNDLE, client_ca),
        BundleSpec::new(KUBELET_CLIENT_CA_BUNDLE, client_ca),
        BundleSpec::new(
            SERVICE_ACCOUNT_TOKEN_CA_BUNDLE,
            &[
                &["kube-apiserver-external-signer"],
                &["kube-apiserver-localhost-signer"],
                &["kube-apiserver-service-network-signer"],
            ],
        ),
    ];

    HierarchySpec { signers, bundles }
}
