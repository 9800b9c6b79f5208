// src/cert/spec.rs
//! Declarative description of the certificate hierarchy.
//!
//! A [`HierarchySpec`] is plain data: it can be written as a struct literal or
//! loaded from JSON, and it is validated as a whole before the chain builder
//! touches the filesystem.

use super::rotation::rotation_threshold;
use super::types::{
    ChainPath, ClientCertificateRequest, Lifetime, PeerCertificateRequest,
    ServingCertificateRequest, UserInfo,
};
use crate::config::RunParams;
use crate::error::{CertChainError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSpec {
    pub name: String,
    /// Directory relative to the parent signer's directory, or to the
    /// certificate directory for roots.
    pub dir: PathBuf,
    pub lifetime: Lifetime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity_days: Option<u32>,
    /// Never regenerated on request, even when due.
    #[serde(default)]
    pub rotation_exempt: bool,
    #[serde(default)]
    pub sub_signers: Vec<SignerSpec>,
    #[serde(default)]
    pub client_certificates: Vec<ClientCertificateRequest>,
    #[serde(default)]
    pub serving_certificates: Vec<ServingCertificateRequest>,
    #[serde(default)]
    pub peer_certificates: Vec<PeerCertificateRequest>,
}

impl SignerSpec {
    pub fn new(name: &str, dir: impl Into<PathBuf>, lifetime: Lifetime) -> Self {
        Self {
            name: name.to_string(),
            dir: dir.into(),
            lifetime,
            validity_days: None,
            rotation_exempt: false,
            sub_signers: Vec::new(),
            client_certificates: Vec::new(),
            serving_certificates: Vec::new(),
            peer_certificates: Vec::new(),
        }
    }

    pub fn validity_days(&self) -> u32 {
        self.validity_days
            .unwrap_or_else(|| self.lifetime.default_validity_days())
    }

    /// Names of everything this signer issues directly, leaves first.
    fn child_names(&self) -> impl Iterator<Item = &str> {
        self.client_certificates
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.serving_certificates.iter().map(|c| c.name.as_str()))
            .chain(self.peer_certificates.iter().map(|c| c.name.as_str()))
            .chain(self.sub_signers.iter().map(|s| s.name.as_str()))
    }
}

/// A trust bundle file and the signers whose certificates go into it, in
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleSpec {
    pub file: PathBuf,
    pub signers: Vec<ChainPath>,
}

impl BundleSpec {
    pub fn new(file: impl Into<PathBuf>, signers: &[&[&str]]) -> Self {
        Self {
            file: file.into(),
            signers: signers.iter().map(|path| ChainPath::new(*path)).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HierarchySpec {
    pub signers: Vec<SignerSpec>,
    #[serde(default)]
    pub bundles: Vec<BundleSpec>,
}

impl HierarchySpec {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| CertChainError::io(path, e))?;
        let spec: Self = serde_json::from_str(&content).map_err(|e| {
            CertChainError::config(format!("invalid hierarchy file {}: {}", path.display(), e))
        })?;
        spec.validate()?;
        Ok(spec)
    }

    /// Looks up the signer at the end of a chain path.
    pub fn find_signer(&self, path: &ChainPath) -> Option<&SignerSpec> {
        let mut segments = path.segments().iter();
        let first = segments.next()?;
        let mut current = self.signers.iter().find(|s| &s.name == first)?;
        for segment in segments {
            current = current.sub_signers.iter().find(|s| &s.name == segment)?;
        }
        Some(current)
    }

    pub fn rotation_exempt_signers(&self) -> Vec<ChainPath> {
        fn collect(signer: &SignerSpec, path: ChainPath, out: &mut Vec<ChainPath>) {
            if signer.rotation_exempt {
                out.push(path.clone());
            }
            for sub in &signer.sub_signers {
                collect(sub, path.child(&sub.name), out);
            }
        }

        let mut exempt = Vec::new();
        for signer in &self.signers {
            collect(signer, ChainPath::root(&signer.name), &mut exempt);
        }
        exempt
    }

    /// Substitutes the node's run parameters into identities and hostnames
    /// and validates the result. No I/O happens here.
    pub fn render(&self, params: &RunParams) -> Result<Self> {
        params.validate()?;
        let service_ip = params.service_ip()?;

        let expand_user = |user: &UserInfo| UserInfo {
            name: params.expand(&user.name, &service_ip),
            groups: user
                .groups
                .iter()
                .map(|g| params.expand(g, &service_ip))
                .collect(),
        };
        let expand_hosts = |hosts: &[String]| -> Vec<String> {
            hosts.iter().map(|h| params.expand(h, &service_ip)).collect()
        };

        fn render_signer(
            signer: &SignerSpec,
            expand_user: &dyn Fn(&UserInfo) -> UserInfo,
            expand_hosts: &dyn Fn(&[String]) -> Vec<String>,
        ) -> SignerSpec {
            SignerSpec {
                client_certificates: signer
                    .client_certificates
                    .iter()
                    .map(|c| ClientCertificateRequest {
                        user: expand_user(&c.user),
                        ..c.clone()
                    })
                    .collect(),
                serving_certificates: signer
                    .serving_certificates
                    .iter()
                    .map(|c| ServingCertificateRequest {
                        hostnames: expand_hosts(&c.hostnames),
                        ..c.clone()
                    })
                    .collect(),
                peer_certificates: signer
                    .peer_certificates
                    .iter()
                    .map(|c| PeerCertificateRequest {
                        user: expand_user(&c.user),
                        hostnames: expand_hosts(&c.hostnames),
                        ..c.clone()
                    })
                    .collect(),
                sub_signers: signer
                    .sub_signers
                    .iter()
                    .map(|s| render_signer(s, expand_user, expand_hosts))
                    .collect(),
                ..signer.clone()
            }
        }

        let rendered = Self {
            signers: self
                .signers
                .iter()
                .map(|s| render_signer(s, &expand_user, &expand_hosts))
                .collect(),
            bundles: self.bundles.clone(),
        };
        rendered.validate()?;
        Ok(rendered)
    }

    pub fn validate(&self) -> Result<()> {
        if self.signers.is_empty() {
            return Err(CertChainError::config("hierarchy has no signers"));
        }

        let mut validator = Validator::default();
        for signer in &self.signers {
            validator.signer(signer, &ChainPath::root(&signer.name), Path::new(""))?;
        }

        for bundle in &self.bundles {
            if bundle.file.as_os_str().is_empty() {
                return Err(CertChainError::config("bundle file path must not be empty"));
            }
            if bundle.signers.is_empty() {
                return Err(CertChainError::config(format!(
                    "bundle {} references no signers",
                    bundle.file.display()
                )));
            }
            for path in &bundle.signers {
                if self.find_signer(path).is_none() {
                    return Err(CertChainError::config(format!(
                        "bundle {} references unknown signer {}",
                        bundle.file.display(),
                        path
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct Validator {
    signer_names: HashSet<String>,
    dirs: HashMap<PathBuf, ChainPath>,
}

impl Validator {
    fn signer(&mut self, signer: &SignerSpec, path: &ChainPath, parent_dir: &Path) -> Result<()> {
        check_name(&signer.name, path)?;
        if !self.signer_names.insert(signer.name.clone()) {
            return Err(CertChainError::config(format!(
                "signer name {:?} is used more than once",
                signer.name
            )));
        }
        check_validity(path, signer.validity_days(), signer.lifetime)?;
        check_relative_dir(&signer.dir, path)?;

        let dir = parent_dir.join(&signer.dir);
        self.claim_dir(dir.clone(), path)?;

        let mut seen = HashSet::new();
        for child in signer.child_names() {
            if !seen.insert(child) {
                return Err(CertChainError::config(format!(
                    "{}: {:?} is issued more than once",
                    path, child
                )));
            }
        }

        for client in &signer.client_certificates {
            let leaf = path.child(&client.name);
            self.leaf(&leaf, client.validity_days, &dir)?;
            check_user(&client.user, &leaf)?;
        }
        for serving in &signer.serving_certificates {
            let leaf = path.child(&serving.name);
            self.leaf(&leaf, serving.validity_days, &dir)?;
            check_hostnames(&serving.hostnames, &leaf)?;
        }
        for peer in &signer.peer_certificates {
            let leaf = path.child(&peer.name);
            self.leaf(&leaf, peer.validity_days, &dir)?;
            check_user(&peer.user, &leaf)?;
            check_hostnames(&peer.hostnames, &leaf)?;
        }

        for sub in &signer.sub_signers {
            self.signer(sub, &path.child(&sub.name), &dir)?;
        }
        Ok(())
    }

    fn leaf(&mut self, path: &ChainPath, validity_days: u32, signer_dir: &Path) -> Result<()> {
        check_name(path.name(), path)?;
        check_validity(path, validity_days, Lifetime::for_validity_days(validity_days))?;
        self.claim_dir(signer_dir.join(path.name()), path)
    }

    fn claim_dir(&mut self, dir: PathBuf, path: &ChainPath) -> Result<()> {
        if let Some(owner) = self.dirs.insert(dir.clone(), path.clone()) {
            return Err(CertChainError::config(format!(
                "{} and {} would both be stored in {}",
                owner,
                path,
                dir.display()
            )));
        }
        Ok(())
    }
}

fn check_name(name: &str, path: &ChainPath) -> Result<()> {
    if name.trim().is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(CertChainError::config(format!("invalid name {:?} at {}", name, path)));
    }
    Ok(())
}

/// A certificate issued with no more validity than its rotation threshold
/// would be due again on every start.
fn check_validity(path: &ChainPath, validity_days: u32, lifetime: Lifetime) -> Result<()> {
    let threshold = rotation_threshold(lifetime).num_days();
    if i64::from(validity_days) <= threshold {
        return Err(CertChainError::config(format!(
            "{}: validity of {} days does not exceed the {} rotation threshold of {} days",
            path, validity_days, lifetime, threshold
        )));
    }
    Ok(())
}

fn check_relative_dir(dir: &Path, path: &ChainPath) -> Result<()> {
    let plain = dir.components().count() > 0
        && dir.components().all(|c| matches!(c, Component::Normal(_)));
    if !plain {
        return Err(CertChainError::config(format!(
            "{}: directory {:?} must be a plain relative path",
            path, dir
        )));
    }
    Ok(())
}

fn check_user(user: &UserInfo, path: &ChainPath) -> Result<()> {
    if user.name.trim().is_empty() {
        return Err(CertChainError::config(format!("{}: user name is required", path)));
    }
    Ok(())
}

fn check_hostnames(hostnames: &[String], path: &ChainPath) -> Result<()> {
    if hostnames.is_empty() || hostnames.iter().any(|h| h.trim().is_empty()) {
        return Err(CertChainError::config(format!(
            "{}: at least one non-empty hostname is required",
            path
        )));
    }
    Ok(())
}
