//! Cross-substrate equivalence of packs produced for the same scenario.
//!
//! Two packs are equivalent when their artifact verdicts agree: the
//! [`verdict_hash`] folds the digests of the files directly under
//! `artifacts/` and ignores manifest, timeline and integrity files, which
//! legitimately differ between substrates.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::{PackError, Result};
use crate::integrity::{self, Digest, SUMS_PATH};
use crate::model::ArtifactKind;
use crate::pack::{MANIFEST_PATH, TIMELINE_PATH};

pub const RULESET_VERSION: &str = "1.0";
pub const EQUIVALENCE_TYPE: &str = "cross_substrate";
pub const EVALUATOR: &str = "local-cli";

const ARTIFACTS_PREFIX: &str = "artifacts/";

/// SHA-256 over the concatenated hex digests of the files directly under
/// `artifacts/`, in byte-wise name order.
pub fn verdict_hash(root: &Path) -> Result<Digest> {
    let computed = integrity::compute(root)?;
    let mut joined = String::new();
    for entry in computed.record.entries() {
        let Some(name) = entry.path.strip_prefix(ARTIFACTS_PREFIX) else {
            continue;
        };
        if name.contains('/') {
            continue;
        }
        joined.push_str(&entry.digest.to_hex());
    }
    Ok(Digest::compute(joined.as_bytes()))
}

/// Which of the required evidence files a pack carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceMinimums {
    pub context: bool,
    pub plan: bool,
    pub trace: bool,
    pub timeline: bool,
    pub integrity: bool,
}

impl EvidenceMinimums {
    pub fn check(root: &Path) -> Self {
        let has = |rel: &str| root.join(rel).is_file();
        Self {
            context: has(ArtifactKind::Context.rel_path().as_str()),
            plan: has(ArtifactKind::Plan.rel_path().as_str()),
            trace: has(ArtifactKind::Trace.rel_path().as_str()),
            timeline: has(TIMELINE_PATH),
            integrity: has(SUMS_PATH),
        }
    }

    pub fn satisfied(&self) -> bool {
        self.context && self.plan && self.trace && self.timeline && self.integrity
    }
}

/// One pack's contribution to an [`EquivalenceRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackVerdict {
    pub substrate: String,
    pub pack_id: String,
    pub pack_root_hash: Digest,
    pub verdict_hash: Digest,
    pub evidence_minimums: EvidenceMinimums,
    #[serde(skip)]
    pub root: PathBuf,
}

impl PackVerdict {
    pub fn load(root: &Path) -> Result<(String, Self)> {
        let manifest = read_manifest(root)?;
        let scenario_id = string_field(root, &manifest, "scenario_id")?;
        let pack_id = string_field(root, &manifest, "pack_id")?;
        let substrate = substrate_name(&manifest).unwrap_or_else(|| "unknown".to_string());

        let verdict = Self {
            substrate,
            pack_id,
            pack_root_hash: integrity::compute(root)?.root_hash,
            verdict_hash: verdict_hash(root)?,
            evidence_minimums: EvidenceMinimums::check(root),
            root: root.to_path_buf(),
        };
        Ok((scenario_id, verdict))
    }
}

/// Outcome of comparing packs for one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquivalenceRecord {
    pub scenario_id: String,
    pub ruleset_version: String,
    pub evaluator: String,
    pub evaluator_version: String,
    pub equivalence_type: String,
    pub packs: Vec<PackVerdict>,
    pub verdict_match: bool,
}

impl EquivalenceRecord {
    /// Compare `packs`, all of which must declare `scenario_id`.
    ///
    /// `verdict_match` holds when at least two packs were given, every pack
    /// meets the evidence minimums and every verdict hash agrees.
    pub fn compare<P: AsRef<Path>>(scenario_id: &str, packs: &[P]) -> Result<Self> {
        let mut verdicts = Vec::with_capacity(packs.len());
        for root in packs {
            let root = root.as_ref();
            let (declared, verdict) = PackVerdict::load(root)?;
            if declared != scenario_id {
                return Err(PackError::InvalidScenario {
                    scenario_id: scenario_id.to_string(),
                    reason: format!(
                        "pack {} declares scenario_id {declared:?}",
                        root.display()
                    ),
                });
            }
            verdicts.push(verdict);
        }

        let verdict_match = verdicts.len() >= 2
            && verdicts.iter().all(|v| v.evidence_minimums.satisfied())
            && verdicts
                .windows(2)
                .all(|w| w[0].verdict_hash == w[1].verdict_hash);

        info!(
            event = "pack.equivalence",
            scenario_id = %scenario_id,
            packs = verdicts.len(),
            verdict_match,
        );

        Ok(Self {
            scenario_id: scenario_id.to_string(),
            ruleset_version: RULESET_VERSION.to_string(),
            evaluator: EVALUATOR.to_string(),
            evaluator_version: crate::VERSION.to_string(),
            equivalence_type: EQUIVALENCE_TYPE.to_string(),
            packs: verdicts,
            verdict_match,
        })
    }
}

// Manifests are read loosely so packs from other producers still compare.
fn read_manifest(root: &Path) -> Result<Value> {
    let path = root.join(MANIFEST_PATH);
    let text = std::fs::read_to_string(&path).map_err(|e| PackError::io(&path, e))?;
    serde_json::from_str(&text).map_err(|e| PackError::serialization(&path, e))
}

fn string_field(root: &Path, manifest: &Value, field: &str) -> Result<String> {
    manifest
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| PackError::InvalidScenario {
            scenario_id: String::new(),
            reason: format!("{} has no string {field:?}", root.join(MANIFEST_PATH).display()),
        })
}

fn substrate_name(manifest: &Value) -> Option<String> {
    match manifest.get("substrate")? {
        Value::String(name) => Some(name.clone()),
        Value::Object(info) => info.get("type").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}
