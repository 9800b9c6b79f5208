// src/app/manager.rs
use crate::cert::{
    certs_to_regenerate, control_plane_hierarchy, regenerate_due, rotation_due,
    CertificateChains, CertificateType, ChainPath, DueCertificate, DueReason, HierarchySpec,
    Lifetime, OpenSslProvider, RegenerationReport, ServiceAccountGenerator, ServiceAccountKeys,
};
use crate::config::PkiConfig;
use crate::error::{CertChainError, Result};
use crate::utils::logging::{Logger, SharedLogger};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Runs the boot sequence for a node's certificates and keeps the result
/// for lookup and reporting.
pub struct CertManager {
    pub config: PkiConfig,
    pub current_operation: String,
    pub logs: Vec<String>,
    pub debug: bool,
    logger: SharedLogger,
    chains: Option<CertificateChains>,
}

#[derive(Debug, Clone)]
pub struct StartupReport {
    pub certificates: usize,
    pub service_account: ServiceAccountKeys,
    pub due: Vec<DueCertificate>,
    pub regeneration: RegenerationReport,
    pub bundles: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CertStatus {
    pub path: ChainPath,
    pub cert_type: CertificateType,
    pub lifetime: Lifetime,
    pub subject: String,
    pub not_after: DateTime<Utc>,
    pub days_remaining: i64,
    pub rotation_exempt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<DueReason>,
}

impl CertManager {
    pub fn new(config: PkiConfig, debug: bool, logger: Box<dyn Logger>) -> Self {
        Self {
            config,
            current_operation: String::new(),
            logs: Vec::new(),
            debug,
            logger: SharedLogger::new(logger),
            chains: None,
        }
    }

    pub fn chains(&self) -> Option<&CertificateChains> {
        self.chains.as_ref()
    }

    /// The hierarchy from `hierarchy_file` when set, the built-in
    /// control-plane layout otherwise.
    pub fn hierarchy(&self) -> Result<HierarchySpec> {
        match self.config.hierarchy_path() {
            Some(path) => HierarchySpec::from_file(&path),
            None => Ok(control_plane_hierarchy()),
        }
    }

    fn build_chains(&mut self) -> Result<CertificateChains> {
        self.set_current_operation("Building certificate chains");
        self.config
            .validate()
            .map_err(|e| CertChainError::config(e.to_string()))?;

        let spec = self.hierarchy()?;
        CertificateChains::complete(
            &spec,
            &self.config.run_params(),
            self.config.certs_dir(),
            Box::new(OpenSslProvider::new(self.config.key_algorithm)),
            Box::new(self.logger.clone()),
        )
    }

    pub fn ensure_service_account_keys(&mut self) -> Result<ServiceAccountKeys> {
        self.set_current_operation("Ensuring service account keys");
        ServiceAccountGenerator::new(self.config.service_account_key_dir(), &mut self.logger)
            .ensure_keys()
    }

    pub fn initialize(&mut self) -> Result<StartupReport> {
        self.initialize_at(Utc::now())
    }

    /// Builds or loads every certificate, regenerates what is due at `now`
    /// and rewrites the trust bundles.
    pub fn initialize_at(&mut self, now: DateTime<Utc>) -> Result<StartupReport> {
        self.log(&format!(
            "Initializing certificates in {}",
            self.config.certs_dir().display()
        ));
        let mut chains = self.build_chains()?;
        let service_account = self.ensure_service_account_keys()?;

        self.set_current_operation("Checking certificate expiry");
        let due = certs_to_regenerate(&chains, now)?;
        if due.is_empty() {
            self.log("No certificates are due for regeneration");
        } else {
            self.log(&format!("{} certificates are due for regeneration", due.len()));
        }

        self.set_current_operation("Regenerating certificates");
        let regeneration = regenerate_due(&mut chains, &due)?;
        for outcome in &regeneration.outcomes {
            self.debug_log(&outcome.to_string());
        }

        self.set_current_operation("Writing trust bundles");
        let bundles = chains.compose_bundles()?;

        let report = StartupReport {
            certificates: chains.len(),
            service_account,
            due,
            regeneration,
            bundles,
        };
        self.log(&format!(
            "Certificates ready: {} managed, {} regenerated, {} skipped",
            report.certificates,
            report.regeneration.regenerated().len(),
            report.regeneration.skipped().len()
        ));
        self.chains = Some(chains);
        self.set_current_operation("");
        Ok(report)
    }

    /// Builds or loads the chains and reports what is due at `now` without
    /// regenerating anything.
    pub fn check_at(&mut self, now: DateTime<Utc>) -> Result<Vec<DueCertificate>> {
        let chains = self.build_chains()?;
        let due = certs_to_regenerate(&chains, now)?;
        for entry in &due {
            self.log(&format!("{} is due: {}", entry.path, entry.reason));
        }
        self.chains = Some(chains);
        self.set_current_operation("");
        Ok(due)
    }

    pub fn certificate_status(&self, now: DateTime<Utc>) -> Result<Vec<CertStatus>> {
        let chains = self
            .chains
            .as_ref()
            .ok_or_else(|| CertChainError::config("certificates have not been initialized"))?;

        let mut rows = Vec::with_capacity(chains.len());
        chains.walk(|node| {
            let info = node.info()?;
            rows.push(CertStatus {
                path: node.path().clone(),
                cert_type: node.cert_type(),
                lifetime: node.lifetime(),
                subject: info.subject,
                not_after: info.not_after,
                days_remaining: (info.not_after - now).num_days(),
                rotation_exempt: node.rotation_exempt(),
                due: rotation_due(node.lifetime(), info.not_before, info.not_after, now),
            });
            Ok(())
        })?;
        Ok(rows)
    }

    pub fn set_current_operation(&mut self, operation: &str) {
        self.current_operation = operation.to_string();
        if !operation.is_empty() {
            self.debug_log(operation);
        }
    }

    pub fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
        self.logger.log(message);
    }

    fn debug_log(&mut self, message: &str) {
        if self.debug {
            self.logs.push(format!("[DEBUG] {}", message));
        }
        self.logger.debug_log(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::control_plane::CLIENT_CA_BUNDLE;
    use crate::cert::KeyAlgorithm;
    use crate::utils::logging::MemoryLogger;
    use chrono::Duration;
    use std::fs;
    use tempfile::TempDir;

    fn manager(temp_dir: &TempDir) -> CertManager {
        let config = PkiConfig {
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            node_name: "node-1".to_string(),
            node_ip: "192.168.1.20".to_string(),
            key_algorithm: KeyAlgorithm::EcdsaP256,
            ..PkiConfig::default()
        };
        CertManager::new(config, true, Box::new(MemoryLogger::new()))
    }

    #[test]
    fn test_initialize_builds_everything() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = manager(&temp_dir);

        let report = manager.initialize().unwrap();

        assert!(report.due.is_empty());
        assert!(report.regeneration.is_empty());
        assert_eq!(report.bundles.len(), 3);
        assert!(report.service_account.generated);
        assert!(report.service_account.private_key.is_file());
        assert!(temp_dir.path().join("certs").join(CLIENT_CA_BUNDLE).is_file());
        assert!(manager.chains().is_some());
    }

    #[test]
    fn test_second_start_reuses_stored_material() {
        let temp_dir = TempDir::new().unwrap();
        manager(&temp_dir).initialize().unwrap();
        let bundle = temp_dir.path().join("certs").join(CLIENT_CA_BUNDLE);
        let before = fs::read(&bundle).unwrap();

        let report = manager(&temp_dir).initialize().unwrap();

        assert!(!report.service_account.generated);
        assert_eq!(fs::read(&bundle).unwrap(), before);
    }

    #[test]
    fn test_start_near_expiry_rotates_short_lived_chains() {
        let temp_dir = TempDir::new().unwrap();
        manager(&temp_dir).initialize().unwrap();
        let bundle = temp_dir.path().join("certs").join(CLIENT_CA_BUNDLE);
        let before = fs::read_to_string(&bundle).unwrap();

        let mut later = manager(&temp_dir);
        let report = later.initialize_at(Utc::now() + Duration::days(200)).unwrap();

        let regenerated: Vec<String> = report
            .regeneration
            .regenerated()
            .iter()
            .map(|p| p.to_string())
            .collect();
        assert!(regenerated.contains(&"kubelet-signer/kube-csr-signer/kubelet-client".to_string()));
        assert!(regenerated.contains(&"kube-apiserver-localhost-signer/kube-apiserver-localhost-serving".to_string()));
        assert!(!regenerated.contains(&"etcd-signer".to_string()));
        assert!(!regenerated.contains(&"kube-apiserver-localhost-signer".to_string()));
        assert!(report.regeneration.skipped().is_empty());
        assert_ne!(fs::read_to_string(&bundle).unwrap(), before);
    }

    #[test]
    fn test_due_exempt_signers_are_reported_as_skipped() {
        let temp_dir = TempDir::new().unwrap();
        manager(&temp_dir).initialize().unwrap();

        let mut later = manager(&temp_dir);
        let report = later.initialize_at(Utc::now() + Duration::days(3300)).unwrap();

        let skipped: Vec<String> = report
            .regeneration
            .skipped()
            .iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(
            skipped,
            vec![
                "admin-kubeconfig-signer",
                "kube-apiserver-external-signer",
                "kube-apiserver-localhost-signer",
                "kube-apiserver-service-network-signer",
            ]
        );
    }

    #[test]
    fn test_check_reports_without_regenerating() {
        let temp_dir = TempDir::new().unwrap();
        manager(&temp_dir).initialize().unwrap();
        let bundle = temp_dir.path().join("certs").join(CLIENT_CA_BUNDLE);
        let before = fs::read(&bundle).unwrap();

        let mut checker = manager(&temp_dir);
        let due = checker.check_at(Utc::now() + Duration::days(200)).unwrap();

        assert!(!due.is_empty());
        assert_eq!(fs::read(&bundle).unwrap(), before);
    }

    #[test]
    fn test_status_rows_cover_every_certificate() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = manager(&temp_dir);
        assert!(manager.certificate_status(Utc::now()).is_err());

        manager.initialize().unwrap();
        let rows = manager.certificate_status(Utc::now()).unwrap();

        assert_eq!(rows.len(), manager.chains().unwrap().len());
        let etcd = rows
            .iter()
            .find(|row| row.path == ChainPath::root("etcd-signer"))
            .unwrap();
        assert_eq!(etcd.lifetime, Lifetime::LongLived);
        assert!(etcd.days_remaining > 3600);
        assert!(rows.iter().all(|row| row.due.is_none()));
    }

    #[test]
    fn test_hierarchy_file_replaces_preset() {
        let temp_dir = TempDir::new().unwrap();
        let hierarchy = temp_dir.path().join("hierarchy.json");
        fs::write(
            &hierarchy,
            r#"{ "signers": [{ "name": "lab-signer", "dir": "lab", "lifetime": "short-lived",
                 "client_certificates": [{ "name": "operator", "validity_days": 300,
                     "user": { "name": "operator", "groups": [] } }] }] }"#,
        )
        .unwrap();

        let mut manager = manager(&temp_dir);
        manager.config.hierarchy_file = Some(hierarchy.to_string_lossy().to_string());
        let report = manager.initialize().unwrap();
        assert!(report.due.is_empty());

        let chains = manager.chains().unwrap();
        assert_eq!(chains.len(), 2);
        assert!(chains.get_cert_key(&["lab-signer", "operator"]).is_ok());
    }

    #[test]
    fn test_hierarchy_file_with_short_validity_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let hierarchy = temp_dir.path().join("hierarchy.json");
        fs::write(
            &hierarchy,
            r#"{ "signers": [{ "name": "lab-signer", "dir": "lab", "lifetime": "short-lived",
                 "client_certificates": [{ "name": "operator", "validity_days": 30,
                     "user": { "name": "operator", "groups": [] } }] }] }"#,
        )
        .unwrap();

        let mut manager = manager(&temp_dir);
        manager.config.hierarchy_file = Some(hierarchy.to_string_lossy().to_string());

        let err = manager.initialize().unwrap_err();
        assert!(matches!(err, CertChainError::Config(_)));
        assert!(!temp_dir.path().join("certs").exists());
    }

    #[test]
    fn test_invalid_cidr_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = manager(&temp_dir);
        manager.config.service_cidr = "10.43.0.0/32".to_string();

        let err = manager.initialize().unwrap_err();
        assert!(matches!(err, CertChainError::Config(_)));
        assert!(!temp_dir.path().join("certs").exists());
    }
}
