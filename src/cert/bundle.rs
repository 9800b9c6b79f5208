// src/cert/bundle.rs
use super::chains::CertificateChains;
use super::spec::BundleSpec;
use super::store::write_public;
use crate::error::Result;
use std::collections::HashSet;
use std::path::PathBuf;

impl CertificateChains {
    /// Concatenates the current certificates of a bundle's signers in the
    /// order listed. A certificate listed twice appears once.
    pub fn bundle_contents(&self, bundle: &BundleSpec) -> Result<String> {
        let mut seen = HashSet::new();
        let mut contents = String::new();
        for path in &bundle.signers {
            let pem = self.node(path)?.cert_pem();
            if !seen.insert(pem) {
                continue;
            }
            contents.push_str(pem);
            if !pem.ends_with('\n') {
                contents.push('\n');
            }
        }
        Ok(contents)
    }

    pub fn bundle_path(&self, bundle: &BundleSpec) -> PathBuf {
        self.certs_dir.join(&bundle.file)
    }

    /// Rewrites every bundle file from the chains' current certificates.
    pub fn compose_bundles(&mut self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.bundles.len());
        for bundle in &self.bundles {
            let contents = self.bundle_contents(bundle)?;
            let path = self.bundle_path(bundle);
            write_public(&path, contents.as_bytes())?;
            written.push(path);
        }

        for path in &written {
            let message = format!("Wrote trust bundle {}", path.display());
            self.debug_log(&message);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use crate::cert::test_support::build;
    use crate::cert::ChainPath;
    use crate::utils::logging::MemoryLogger;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_bundle_lists_signers_in_order_without_duplicates() {
        let temp_dir = TempDir::new().unwrap();
        let chains = build(temp_dir.path(), MemoryLogger::new()).unwrap();

        let content = fs::read_to_string(temp_dir.path().join("ca-bundle/client-ca.crt")).unwrap();
        let root = chains.node(&ChainPath::root("kubelet-signer")).unwrap().cert_pem();
        let csr = chains
            .node(&ChainPath::new(&["kubelet-signer", "kube-csr-signer"]))
            .unwrap()
            .cert_pem();

        assert_eq!(content, format!("{}{}", root, csr));
        assert_eq!(content.matches("BEGIN CERTIFICATE").count(), 2);
    }

    #[test]
    fn test_recomposing_unchanged_chains_is_byte_identical() {
        let temp_dir = TempDir::new().unwrap();
        let mut chains = build(temp_dir.path(), MemoryLogger::new()).unwrap();
        let bundle = temp_dir.path().join("ca-bundle/serving-ca.crt");
        let before = fs::read(&bundle).unwrap();

        let written = chains.compose_bundles().unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(fs::read(&bundle).unwrap(), before);
    }

    #[test]
    fn test_bundles_follow_regenerated_signer() {
        let temp_dir = TempDir::new().unwrap();
        let mut chains = build(temp_dir.path(), MemoryLogger::new()).unwrap();
        let bundle = temp_dir.path().join("ca-bundle/client-ca.crt");
        let before = fs::read_to_string(&bundle).unwrap();

        chains
            .regenerate(&ChainPath::new(&["kubelet-signer", "kube-csr-signer"]))
            .unwrap();
        chains.compose_bundles().unwrap();

        let after = fs::read_to_string(&bundle).unwrap();
        let csr = chains
            .node(&ChainPath::new(&["kubelet-signer", "kube-csr-signer"]))
            .unwrap()
            .cert_pem();
        assert_ne!(before, after);
        assert!(after.ends_with(csr));
    }
}
