// config/params.rs
use crate::error::{CertChainError, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Node-specific values substituted into the hierarchy before anything is
/// written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunParams {
    pub node_name: String,
    pub node_ip: String,
    pub service_cidr: String,
    pub base_domain: String,
}

impl RunParams {
    pub fn validate(&self) -> Result<()> {
        if self.node_name.trim().is_empty() {
            return Err(CertChainError::config("node name must not be empty"));
        }
        if self.base_domain.trim().is_empty() {
            return Err(CertChainError::config("base domain must not be empty"));
        }
        self.node_ip.parse::<IpAddr>().map_err(|e| {
            CertChainError::config(format!("invalid node IP {:?}: {}", self.node_ip, e))
        })?;
        Ok(())
    }

    pub fn service_ip(&self) -> Result<IpAddr> {
        first_usable_address(&self.service_cidr)
    }

    /// Replaces `{node_name}`, `{node_ip}`, `{service_ip}` and `{base_domain}`.
    pub fn expand(&self, value: &str, service_ip: &IpAddr) -> String {
        value
            .replace("{node_name}", &self.node_name)
            .replace("{node_ip}", &self.node_ip)
            .replace("{service_ip}", &service_ip.to_string())
            .replace("{base_domain}", &self.base_domain)
    }
}

/// First usable address of a network (base address + 1), e.g. the cluster IP
/// of the API server service.
pub fn first_usable_address(cidr: &str) -> Result<IpAddr> {
    let (addr, prefix) = cidr
        .trim()
        .split_once('/')
        .ok_or_else(|| CertChainError::config(format!("invalid CIDR {:?}: missing prefix", cidr)))?;

    let ip: IpAddr = addr
        .parse()
        .map_err(|e| CertChainError::config(format!("invalid CIDR {:?}: {}", cidr, e)))?;
    let prefix: u32 = prefix
        .parse()
        .map_err(|e| CertChainError::config(format!("invalid CIDR {:?}: {}", cidr, e)))?;

    match ip {
        IpAddr::V4(v4) => {
            let host_bits = 32u32
                .checked_sub(prefix)
                .ok_or_else(|| CertChainError::config(format!("invalid CIDR {:?}: prefix too long", cidr)))?;
            // base + 1 must be neither the network nor the last address
            if host_bits < 2 {
                return Err(CertChainError::config(format!(
                    "CIDR {:?} is too small to hold a service address",
                    cidr
                )));
            }
            let mask = if host_bits == 32 { 0 } else { u32::MAX << host_bits };
            let base = u32::from(v4) & mask;
            Ok(IpAddr::V4(Ipv4Addr::from(base + 1)))
        }
        IpAddr::V6(v6) => {
            let host_bits = 128u32
                .checked_sub(prefix)
                .ok_or_else(|| CertChainError::config(format!("invalid CIDR {:?}: prefix too long", cidr)))?;
            if host_bits < 2 {
                return Err(CertChainError::config(format!(
                    "CIDR {:?} is too small to hold a service address",
                    cidr
                )));
            }
            let mask = if host_bits == 128 { 0 } else { u128::MAX << host_bits };
            let base = u128::from(v6) & mask;
            Ok(IpAddr::V6(Ipv6Addr::from(base + 1)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> RunParams {
        RunParams {
            node_name: "node-1".to_string(),
            node_ip: "192.168.122.10".to_string(),
            service_cidr: "10.43.0.0/16".to_string(),
            base_domain: "example.com".to_string(),
        }
    }

    #[test]
    fn test_service_ip_is_first_address_of_network() {
        assert_eq!(
            first_usable_address("10.43.0.0/16").unwrap(),
            "10.43.0.1".parse::<IpAddr>().unwrap()
        );
        // host bits are masked off before adding one
        assert_eq!(
            first_usable_address("10.43.12.7/16").unwrap(),
            "10.43.0.1".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            first_usable_address("10.0.0.0/30").unwrap(),
            "10.0.0.1".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            first_usable_address("fd02::/112").unwrap(),
            "fd02::1".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_too_small_or_malformed_cidr_is_config_error() {
        for cidr in [
            "10.43.0.0/31",
            "10.43.0.0/32",
            "fd02::/127",
            "10.43.0.0",
            "10.43.0.0/33",
            "not-an-ip/16",
            "10.43.0.0/abc",
        ] {
            assert!(
                matches!(first_usable_address(cidr), Err(CertChainError::Config(_))),
                "expected config error for {}",
                cidr
            );
        }
    }

    #[test]
    fn test_expand_placeholders() {
        let params = params();
        let ip = params.service_ip().unwrap();
        assert_eq!(
            params.expand("router-default.apps.{base_domain}", &ip),
            "router-default.apps.example.com"
        );
        assert_eq!(params.expand("system:node:{node_name}", &ip), "system:node:node-1");
        assert_eq!(params.expand("{service_ip}", &ip), "10.43.0.1");
        assert_eq!(params.expand("{node_ip}", &ip), "192.168.122.10");
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        assert!(params().validate().is_ok());

        let mut missing_name = params();
        missing_name.node_name = " ".to_string();
        assert!(matches!(missing_name.validate(), Err(CertChainError::Config(_))));

        let mut bad_ip = params();
        bad_ip.node_ip = "node-1.local".to_string();
        assert!(matches!(bad_ip.validate(), Err(CertChainError::Config(_))));
    }
}
