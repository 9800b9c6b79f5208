// config/types.rs
use super::RunParams;
use crate::cert::KeyAlgorithm;
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PkiConfig {
    pub data_dir: String,
    pub node_name: String,
    pub node_ip: String,
    pub service_cidr: String,
    pub base_domain: String,
    #[serde(default)]
    pub key_algorithm: KeyAlgorithm,
    /// JSON hierarchy replacing the built-in control-plane layout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchy_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
}

impl Default for PkiConfig {
    fn default() -> Self {
        Self {
            data_dir: "/var/lib/microshift".to_string(),
            node_name: "localhost".to_string(),
            node_ip: "127.0.0.1".to_string(),
            service_cidr: "10.43.0.0/16".to_string(),
            base_domain: "example.com".to_string(),
            key_algorithm: KeyAlgorithm::default(),
            hierarchy_file: None,
            log_file: None,
        }
    }
}

impl PkiConfig {
    pub fn load_from_file(path: &str) -> io::Result<Self> {
        let config_str = fs::read_to_string(path)?;
        serde_json::from_str(&config_str).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn save_to_file(&self, path: &str) -> io::Result<()> {
        let config_str = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, config_str)
    }

    pub fn validate(&self) -> io::Result<()> {
        if self.data_dir.trim().is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "data_dir must not be empty",
            ));
        }
        if let Some(hierarchy) = &self.hierarchy_file {
            if !Path::new(&shellexpand::tilde(hierarchy).to_string()).exists() {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("Hierarchy file not found at: {}", hierarchy),
                ));
            }
        }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).to_string())
    }

    pub fn certs_dir(&self) -> PathBuf {
        self.data_dir().join("certs")
    }

    pub fn service_account_key_dir(&self) -> PathBuf {
        self.data_dir()
            .join("resources")
            .join("kube-apiserver")
            .join("secrets")
            .join("service-account-key")
    }

    pub fn hierarchy_path(&self) -> Option<PathBuf> {
        self.hierarchy_file
            .as_ref()
            .map(|path| PathBuf::from(shellexpand::tilde(path).to_string()))
    }

    pub fn run_params(&self) -> RunParams {
        RunParams {
            node_name: self.node_name.clone(),
            node_ip: self.node_ip.clone(),
            service_cidr: self.service_cidr.clone(),
            base_domain: self.base_domain.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_round_trips_through_file() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("pki_config.json");
        let path = path.to_string_lossy().to_string();

        let config = PkiConfig {
            node_name: "node-a".to_string(),
            key_algorithm: KeyAlgorithm::EcdsaP256,
            ..PkiConfig::default()
        };
        config.save_to_file(&path)?;

        let loaded = PkiConfig::load_from_file(&path)?;
        assert_eq!(loaded, config);
        Ok(())
    }

    #[test]
    fn test_optional_fields_default_when_absent() {
        let json = r#"{
            "data_dir": "/tmp/pki",
            "node_name": "node-a",
            "node_ip": "10.0.0.5",
            "service_cidr": "10.43.0.0/16",
            "base_domain": "cluster.test"
        }"#;
        let config: PkiConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.key_algorithm, KeyAlgorithm::Rsa2048);
        assert_eq!(config.hierarchy_file, None);
        assert_eq!(config.certs_dir(), PathBuf::from("/tmp/pki/certs"));
    }

    #[test]
    fn test_validate_reports_missing_hierarchy_file() {
        let config = PkiConfig {
            hierarchy_file: Some("/nonexistent/hierarchy.json".to_string()),
            ..PkiConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
