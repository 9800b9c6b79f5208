// src/cert/chains.rs
//! Materialized certificate hierarchy.
//!
//! Nodes live in an arena and own their children by index; a path-keyed
//! index gives lookup by [`ChainPath`]. Everything is top-down, there are no
//! parent pointers: a node's issuer is found through its path's parent.

use super::provider::CertificateProvider;
use super::spec::{BundleSpec, HierarchySpec, SignerSpec};
use super::types::{
    AltName, CertKeyFiles, CertKeyPair, CertificateConfig, CertificateType, ChainPath, Lifetime,
};
use super::verification::{verify_issued_by, verify_key_pair};
use crate::config::RunParams;
use crate::discovery::CertificateInfo;
use crate::error::{CertChainError, Result};
use crate::utils::logging::Logger;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub(super) type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Signer {
        lifetime: Lifetime,
        rotation_exempt: bool,
    },
    Leaf,
}

#[derive(Debug)]
pub struct ChainNode {
    pub(super) path: ChainPath,
    pub(super) role: NodeRole,
    pub(super) config: CertificateConfig,
    pub(super) files: CertKeyFiles,
    pub(super) material: CertKeyPair,
    pub(super) children: Vec<NodeId>,
}

impl ChainNode {
    pub fn path(&self) -> &ChainPath {
        &self.path
    }

    pub fn cert_type(&self) -> CertificateType {
        self.config.cert_type
    }

    pub fn is_signer(&self) -> bool {
        matches!(self.role, NodeRole::Signer { .. })
    }

    pub fn rotation_exempt(&self) -> bool {
        matches!(self.role, NodeRole::Signer { rotation_exempt: true, .. })
    }

    pub fn lifetime(&self) -> Lifetime {
        match self.role {
            NodeRole::Signer { lifetime, .. } => lifetime,
            NodeRole::Leaf => Lifetime::for_validity_days(self.config.validity_days),
        }
    }

    pub fn files(&self) -> &CertKeyFiles {
        &self.files
    }

    pub fn cert_pem(&self) -> &str {
        &self.material.cert_pem
    }

    pub fn info(&self) -> Result<CertificateInfo> {
        CertificateInfo::from_pem(self.material.cert_pem.as_bytes())
    }

    /// Config for a fresh issuance. Signer subjects carry the issuance time
    /// so successive generations of a signer are distinguishable.
    pub(super) fn issuance_config(&self) -> CertificateConfig {
        match self.role {
            NodeRole::Signer { .. } => CertificateConfig {
                common_name: format!("{}@{}", self.config.common_name, Utc::now().timestamp()),
                ..self.config.clone()
            },
            NodeRole::Leaf => self.config.clone(),
        }
    }
}

pub struct CertificateChains {
    pub(super) certs_dir: PathBuf,
    pub(super) nodes: Vec<ChainNode>,
    pub(super) index: HashMap<ChainPath, NodeId>,
    pub(super) roots: Vec<NodeId>,
    pub(super) bundles: Vec<BundleSpec>,
    pub(super) provider: Box<dyn CertificateProvider>,
    pub(super) logger: Box<dyn Logger>,
}

impl CertificateChains {
    /// Loads every certificate the hierarchy describes from `certs_dir`,
    /// generating whatever is missing, then writes the trust bundles.
    pub fn complete(
        spec: &HierarchySpec,
        params: &RunParams,
        certs_dir: impl Into<PathBuf>,
        provider: Box<dyn CertificateProvider>,
        logger: Box<dyn Logger>,
    ) -> Result<Self> {
        let spec = spec.render(params)?;
        let certs_dir = certs_dir.into();

        let mut chains = Self {
            certs_dir: certs_dir.clone(),
            nodes: Vec::new(),
            index: HashMap::new(),
            roots: Vec::new(),
            bundles: spec.bundles.clone(),
            provider,
            logger,
        };

        chains.log(&format!(
            "Materializing certificate chains in {}",
            certs_dir.display()
        ));
        for signer in &spec.signers {
            chains.materialize_signer(signer, None, &certs_dir, false)?;
        }
        chains.compose_bundles()?;

        chains.log(&format!(
            "Certificate chains ready: {} certificates, {} bundles",
            chains.nodes.len(),
            chains.bundles.len()
        ));
        Ok(chains)
    }

    fn materialize_signer(
        &mut self,
        signer: &SignerSpec,
        parent: Option<NodeId>,
        parent_dir: &Path,
        parent_fresh: bool,
    ) -> Result<NodeId> {
        let path = match parent {
            Some(parent) => self.nodes[parent].path.child(&signer.name),
            None => ChainPath::root(&signer.name),
        };
        let dir = parent_dir.join(&signer.dir);

        let config = CertificateConfig {
            cert_type: CertificateType::Signer,
            common_name: signer.name.clone(),
            organization: Vec::new(),
            validity_days: signer.validity_days(),
            alt_names: Vec::new(),
        };
        let role = NodeRole::Signer {
            lifetime: signer.lifetime,
            rotation_exempt: signer.rotation_exempt,
        };
        let (id, fresh) = self.materialize(path.clone(), role, config, dir.clone(), parent, parent_fresh)?;

        for client in &signer.client_certificates {
            let config = CertificateConfig {
                cert_type: CertificateType::Client,
                common_name: client.user.name.clone(),
                organization: client.user.groups.clone(),
                validity_days: client.validity_days,
                alt_names: Vec::new(),
            };
            self.materialize_leaf(&path, &client.name, config, &dir, id, fresh)?;
        }
        for serving in &signer.serving_certificates {
            let config = CertificateConfig {
                cert_type: CertificateType::Serving,
                common_name: serving.hostnames[0].clone(),
                organization: Vec::new(),
                validity_days: serving.validity_days,
                alt_names: serving.hostnames.iter().map(|h| AltName::parse(h)).collect(),
            };
            self.materialize_leaf(&path, &serving.name, config, &dir, id, fresh)?;
        }
        for peer in &signer.peer_certificates {
            let config = CertificateConfig {
                cert_type: CertificateType::Peer,
                common_name: peer.user.name.clone(),
                organization: peer.user.groups.clone(),
                validity_days: peer.validity_days,
                alt_names: peer.hostnames.iter().map(|h| AltName::parse(h)).collect(),
            };
            self.materialize_leaf(&path, &peer.name, config, &dir, id, fresh)?;
        }

        for sub in &signer.sub_signers {
            self.materialize_signer(sub, Some(id), &dir, fresh)?;
        }
        Ok(id)
    }

    fn materialize_leaf(
        &mut self,
        signer_path: &ChainPath,
        name: &str,
        config: CertificateConfig,
        signer_dir: &Path,
        signer: NodeId,
        signer_fresh: bool,
    ) -> Result<NodeId> {
        let (id, _) = self.materialize(
            signer_path.child(name),
            NodeRole::Leaf,
            config,
            signer_dir.join(name),
            Some(signer),
            signer_fresh,
        )?;
        Ok(id)
    }

    /// Loads one node or generates it. `force` is set when the issuer was
    /// just generated, since anything already on disk cannot chain to it.
    fn materialize(
        &mut self,
        path: ChainPath,
        role: NodeRole,
        config: CertificateConfig,
        dir: PathBuf,
        parent: Option<NodeId>,
        force: bool,
    ) -> Result<(NodeId, bool)> {
        let files = CertKeyFiles::new(dir, config.cert_type);
        if files.recover()? {
            self.log(&format!("Recovered an interrupted save of {}", path));
        }
        let existing = if force { None } else { files.load()? };

        let mut node = ChainNode {
            path,
            role,
            config,
            files,
            material: CertKeyPair {
                cert_pem: String::new(),
                key_pem: String::new(),
            },
            children: Vec::new(),
        };

        let fresh = match existing {
            Some(pair) => {
                verify_key_pair(&node.path, &pair)?;
                if let Some(parent) = parent {
                    verify_issued_by(&node.path, &pair.cert_pem, &self.nodes[parent].material.cert_pem)?;
                }
                self.debug_log(&format!(
                    "Loaded {} certificate {} from {}",
                    node.config.cert_type,
                    node.path,
                    node.files.cert.display()
                ));
                node.material = pair;
                false
            }
            None => {
                if force && node.files.exists() {
                    self.log(&format!(
                        "Replacing {}: its signer was regenerated",
                        node.path
                    ));
                }
                let issuer = parent.map(|parent| &self.nodes[parent].material);
                let pair = self.provider.generate(&node.issuance_config(), issuer)?;
                node.files.save(&pair)?;
                self.log(&format!(
                    "Generated {} certificate {} in {}",
                    node.config.cert_type,
                    node.path,
                    node.files.cert.display()
                ));
                node.material = pair;
                true
            }
        };

        let id = self.nodes.len();
        self.index.insert(node.path.clone(), id);
        self.nodes.push(node);
        match parent {
            Some(parent) => self.nodes[parent].children.push(id),
            None => self.roots.push(id),
        }
        Ok((id, fresh))
    }

    /// Issues a new key and certificate for one node, signed by its parent's
    /// current certificate, and replaces the stored pair. Does not cascade.
    pub(super) fn reissue(&mut self, id: NodeId) -> Result<()> {
        let issuer = self.nodes[id]
            .path
            .parent()
            .and_then(|parent| self.index.get(&parent).copied());

        let config = self.nodes[id].issuance_config();
        let pair = {
            let issuer = issuer.map(|parent| &self.nodes[parent].material);
            self.provider.generate(&config, issuer)?
        };
        self.nodes[id].files.save(&pair)?;
        self.nodes[id].material = pair;

        let message = format!(
            "Regenerated {} certificate {}",
            self.nodes[id].config.cert_type, self.nodes[id].path
        );
        self.log(&message);
        Ok(())
    }

    pub fn get_cert_key(&self, path: &[&str]) -> Result<(String, String)> {
        let node = self.node(&ChainPath::new(path))?;
        Ok((node.material.cert_pem.clone(), node.material.key_pem.clone()))
    }

    pub fn node(&self, path: &ChainPath) -> Result<&ChainNode> {
        self.index
            .get(path)
            .map(|&id| &self.nodes[id])
            .ok_or_else(|| CertChainError::NotFound(path.clone()))
    }

    pub(super) fn node_id(&self, path: &ChainPath) -> Result<NodeId> {
        self.index
            .get(path)
            .copied()
            .ok_or_else(|| CertChainError::NotFound(path.clone()))
    }

    /// Visits every node, each signer before everything it issued.
    pub fn walk<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&ChainNode) -> Result<()>,
    {
        fn descend<F>(chains: &CertificateChains, id: NodeId, visit: &mut F) -> Result<()>
        where
            F: FnMut(&ChainNode) -> Result<()>,
        {
            let node = &chains.nodes[id];
            visit(node)?;
            for &child in &node.children {
                descend(chains, child, visit)?;
            }
            Ok(())
        }

        for &root in &self.roots {
            descend(self, root, &mut visit)?;
        }
        Ok(())
    }

    pub fn paths(&self) -> Vec<ChainPath> {
        let mut paths = Vec::with_capacity(self.nodes.len());
        // walk never fails when the visitor doesn't
        let _ = self.walk(|node| {
            paths.push(node.path.clone());
            Ok(())
        });
        paths
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn certs_dir(&self) -> &Path {
        &self.certs_dir
    }

    pub fn bundles(&self) -> &[BundleSpec] {
        &self.bundles
    }

    pub(super) fn log(&mut self, message: &str) {
        self.logger.log(message);
    }

    pub(super) fn debug_log(&mut self, message: &str) {
        self.logger.debug_log(message);
    }
}
