// src/cert/rotation.rs
//! Decides which certificates are due for regeneration.

use super::chains::CertificateChains;
use super::types::{ChainPath, Lifetime};
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;

pub const MONTH_DAYS: i64 = 30;
pub const SHORT_LIVED_THRESHOLD_MONTHS: i64 = 7;
pub const LONG_LIVED_THRESHOLD_MONTHS: i64 = 18;

/// Remaining validity below which a certificate of the given lifetime is due.
pub fn rotation_threshold(lifetime: Lifetime) -> Duration {
    let months = match lifetime {
        Lifetime::ShortLived => SHORT_LIVED_THRESHOLD_MONTHS,
        Lifetime::LongLived => LONG_LIVED_THRESHOLD_MONTHS,
    };
    Duration::days(months * MONTH_DAYS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum DueReason {
    /// `now` lies outside [not_before, not_after].
    OutsideValidity,
    BelowThreshold { remaining_days: i64 },
}

impl fmt::Display for DueReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DueReason::OutsideValidity => write!(f, "outside its validity window"),
            DueReason::BelowThreshold { remaining_days } => {
                write!(f, "{} days of validity left", remaining_days)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DueCertificate {
    pub path: ChainPath,
    #[serde(flatten)]
    pub reason: DueReason,
}

pub fn rotation_due(
    lifetime: Lifetime,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<DueReason> {
    // Covers clock skew as well as plain expiry.
    if now < not_before || now > not_after {
        return Some(DueReason::OutsideValidity);
    }

    let remaining = not_after - now;
    if remaining < rotation_threshold(lifetime) {
        return Some(DueReason::BelowThreshold {
            remaining_days: remaining.num_days(),
        });
    }
    None
}

/// Scans every certificate in the chains, signers before what they issued.
/// Each due path is reported once.
pub fn certs_to_regenerate(
    chains: &CertificateChains,
    now: DateTime<Utc>,
) -> Result<Vec<DueCertificate>> {
    let mut due = Vec::new();
    chains.walk(|node| {
        let info = node.info()?;
        if let Some(reason) = rotation_due(node.lifetime(), info.not_before, info.not_after, now) {
            due.push(DueCertificate {
                path: node.path().clone(),
                reason,
            });
        }
        Ok(())
    })?;
    Ok(due)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::test_support::build;
    use crate::utils::logging::MemoryLogger;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn window(remaining_days: i64) -> (DateTime<Utc>, DateTime<Utc>) {
        (now() - Duration::days(30), now() + Duration::days(remaining_days))
    }

    #[test]
    fn test_short_lived_threshold() {
        let (nb, na) = window(150);
        assert_eq!(
            rotation_due(Lifetime::ShortLived, nb, na, now()),
            Some(DueReason::BelowThreshold { remaining_days: 150 })
        );

        let (nb, na) = window(250);
        assert_eq!(rotation_due(Lifetime::ShortLived, nb, na, now()), None);
    }

    #[test]
    fn test_long_lived_threshold() {
        let (nb, na) = window(600);
        assert_eq!(rotation_due(Lifetime::LongLived, nb, na, now()), None);

        let (nb, na) = window(400);
        assert_eq!(
            rotation_due(Lifetime::LongLived, nb, na, now()),
            Some(DueReason::BelowThreshold { remaining_days: 400 })
        );
    }

    #[test]
    fn test_threshold_is_strict() {
        let (nb, na) = window(7 * MONTH_DAYS);
        assert_eq!(rotation_due(Lifetime::ShortLived, nb, na, now()), None);
    }

    #[test]
    fn test_not_yet_valid_is_due_despite_remaining_time() {
        let not_before = now() + Duration::days(1);
        let not_after = now() + Duration::days(3000);
        assert_eq!(
            rotation_due(Lifetime::LongLived, not_before, not_after, now()),
            Some(DueReason::OutsideValidity)
        );
    }

    #[test]
    fn test_expired_is_due() {
        let not_before = now() - Duration::days(400);
        let not_after = now() - Duration::days(35);
        assert_eq!(
            rotation_due(Lifetime::ShortLived, not_before, not_after, now()),
            Some(DueReason::OutsideValidity)
        );
    }

    #[test]
    fn test_fresh_store_has_nothing_due() {
        let temp_dir = TempDir::new().unwrap();
        let chains = build(temp_dir.path(), MemoryLogger::new()).unwrap();

        assert!(certs_to_regenerate(&chains, Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn test_scan_flags_short_lived_after_five_months() {
        let temp_dir = TempDir::new().unwrap();
        let chains = build(temp_dir.path(), MemoryLogger::new()).unwrap();

        let later = Utc::now() + Duration::days(160);
        let due: Vec<String> = certs_to_regenerate(&chains, later)
            .unwrap()
            .into_iter()
            .map(|d| d.path.to_string())
            .collect();

        assert_eq!(
            due,
            vec![
                "kubelet-signer",
                "kubelet-signer/kube-csr-signer",
                "kubelet-signer/kube-csr-signer/kubelet-client",
                "kubelet-signer/kube-csr-signer/kubelet-server",
                "service-network-signer/service-network-serving",
            ]
        );
    }

    #[test]
    fn test_scan_before_issuance_flags_everything_once() {
        let temp_dir = TempDir::new().unwrap();
        let chains = build(temp_dir.path(), MemoryLogger::new()).unwrap();

        let earlier = Utc::now() - Duration::days(1);
        let due = certs_to_regenerate(&chains, earlier).unwrap();

        assert_eq!(due.len(), chains.len());
        assert!(due.iter().all(|d| d.reason == DueReason::OutsideValidity));
        assert_eq!(due[0].path, ChainPath::root("kubelet-signer"));
    }
}
