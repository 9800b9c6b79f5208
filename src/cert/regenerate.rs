// src/cert/regenerate.rs
use super::chains::{CertificateChains, NodeId};
use super::rotation::DueCertificate;
use super::types::ChainPath;
use crate::error::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    PolicyExempt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum RegenerationOutcome {
    Regenerated { path: ChainPath },
    /// Reissued because `trigger`, an ancestor signer, was regenerated.
    Cascaded { path: ChainPath, trigger: ChainPath },
    Skipped { path: ChainPath, reason: SkipReason },
}

impl RegenerationOutcome {
    pub fn path(&self) -> &ChainPath {
        match self {
            RegenerationOutcome::Regenerated { path }
            | RegenerationOutcome::Cascaded { path, .. }
            | RegenerationOutcome::Skipped { path, .. } => path,
        }
    }

    pub fn changed(&self) -> bool {
        !matches!(self, RegenerationOutcome::Skipped { .. })
    }
}

impl fmt::Display for RegenerationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegenerationOutcome::Regenerated { path } => write!(f, "{}: regenerated", path),
            RegenerationOutcome::Cascaded { path, trigger } => {
                write!(f, "{}: regenerated after {}", path, trigger)
            }
            RegenerationOutcome::Skipped { path, .. } => {
                write!(f, "{}: skipped, signer is rotation-exempt", path)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegenerationReport {
    pub outcomes: Vec<RegenerationOutcome>,
}

impl RegenerationReport {
    pub fn regenerated(&self) -> Vec<&ChainPath> {
        self.outcomes
            .iter()
            .filter(|o| o.changed())
            .map(|o| o.path())
            .collect()
    }

    pub fn skipped(&self) -> Vec<&ChainPath> {
        self.outcomes
            .iter()
            .filter(|o| !o.changed())
            .map(|o| o.path())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

impl CertificateChains {
    /// Regenerates the certificate at `path`. For a signer, everything it
    /// issued, directly or through sub-signers, is reissued from the new
    /// material. A rotation-exempt signer is left alone and reported as
    /// skipped.
    pub fn regenerate(&mut self, path: &ChainPath) -> Result<Vec<RegenerationOutcome>> {
        let id = self.node_id(path)?;

        if self.nodes[id].rotation_exempt() {
            self.log(&format!(
                "Not regenerating {}: signer is rotation-exempt",
                path
            ));
            return Ok(vec![RegenerationOutcome::Skipped {
                path: path.clone(),
                reason: SkipReason::PolicyExempt,
            }]);
        }

        self.reissue(id)?;
        let mut outcomes = vec![RegenerationOutcome::Regenerated { path: path.clone() }];
        self.cascade(id, path, &mut outcomes)?;
        Ok(outcomes)
    }

    fn cascade(
        &mut self,
        id: NodeId,
        trigger: &ChainPath,
        outcomes: &mut Vec<RegenerationOutcome>,
    ) -> Result<()> {
        let children = self.nodes[id].children.clone();
        for child in children {
            let path = self.nodes[child].path.clone();
            if self.nodes[child].rotation_exempt() {
                // The old certificate would no longer chain to its issuer.
                self.log(&format!(
                    "WARNING: regenerating rotation-exempt signer {} because {} was regenerated",
                    path, trigger
                ));
            }
            self.reissue(child)?;
            outcomes.push(RegenerationOutcome::Cascaded {
                path,
                trigger: trigger.clone(),
            });
            self.cascade(child, trigger, outcomes)?;
        }
        Ok(())
    }
}

/// Regenerates each due certificate in order. A path already reissued by
/// an earlier cascade in the same pass is not regenerated again.
pub fn regenerate_due(
    chains: &mut CertificateChains,
    due: &[DueCertificate],
) -> Result<RegenerationReport> {
    let mut report = RegenerationReport::default();
    let mut handled: HashSet<ChainPath> = HashSet::new();

    for entry in due {
        if handled.contains(&entry.path) {
            chains.debug_log(&format!(
                "{} already regenerated in this pass",
                entry.path
            ));
            continue;
        }
        chains.log(&format!("{} is due for regeneration: {}", entry.path, entry.reason));

        for outcome in chains.regenerate(&entry.path)? {
            handled.insert(outcome.path().clone());
            report.outcomes.push(outcome);
        }
    }
    Ok(report)
}
