//! Pack assembly: run model → canonical files → integrity digest.
//!
//! Layout written under the output directory:
//!
//! ```text
//! manifest.json
//! artifacts/context.json
//! artifacts/plan.json
//! artifacts/trace.json
//! timeline/events.ndjson
//! integrity/sha256sums.txt
//! pack_root_hash.txt        (when enabled)
//! ```
//!
//! Steps run strictly in order because the digest must see the complete
//! tree. A failure is reported with the [`AssemblyStep`] that failed and the
//! directory is left as-is; callers discard it and retry.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::canonical::{write_canonical_json, write_ndjson};
use crate::config::PackConfig;
use crate::error::{AssemblyStep, PackError, Result};
use crate::integrity::{self, Digest, PackDigest, ROOT_HASH_PATH, SUMS_PATH};
use crate::interaction::InteractionSource;
use crate::metrics::METRICS;
use crate::model::{ArtifactKind, RunModel, RunModelBuilder};
use crate::obs;
use crate::scenario::Scenario;

pub const MANIFEST_PATH: &str = "manifest.json";
pub const TIMELINE_PATH: &str = "timeline/events.ndjson";

/// Files every pack must carry, in listing order.
pub const REQUIRED_FILES: [&str; 5] = [
    "artifacts/context.json",
    "artifacts/plan.json",
    "artifacts/trace.json",
    MANIFEST_PATH,
    TIMELINE_PATH,
];

/// A fully written pack.
#[derive(Debug, Clone)]
pub struct AssembledPack {
    pub root: PathBuf,
    pub model: RunModel,
    pub digest: PackDigest,
}

impl AssembledPack {
    pub fn root_hash(&self) -> &Digest {
        &self.digest.root_hash
    }
}

#[derive(Debug, Clone)]
pub struct PackAssembler {
    builder: RunModelBuilder,
    write_root_hash: bool,
}

impl PackAssembler {
    pub fn new(config: PackConfig) -> Self {
        Self {
            builder: RunModelBuilder::new(config),
            write_root_hash: true,
        }
    }

    /// Whether to persist `pack_root_hash.txt` after digesting. On by default.
    pub fn write_root_hash(mut self, enabled: bool) -> Self {
        self.write_root_hash = enabled;
        self
    }

    pub fn builder(&self) -> &RunModelBuilder {
        &self.builder
    }

    /// Build, write and digest the pack for `scenario` under `out_dir`.
    pub fn assemble<S>(
        &self,
        scenario: &Scenario,
        source: &S,
        out_dir: &Path,
    ) -> Result<AssembledPack>
    where
        S: InteractionSource + ?Sized,
    {
        let _span = obs::PackSpan::enter(&scenario.scenario_id);
        obs::emit_pack_started(&scenario.scenario_id, out_dir, scenario.substrate.name());

        let run = |step: AssemblyStep, result: Result<()>| -> Result<()> {
            result.map_err(|e| fail(&scenario.scenario_id, step, e))
        };

        // Stale integrity files from an earlier attempt must not look like a
        // finished pack if this attempt fails.
        run(AssemblyStep::BuildModel, remove_stale(out_dir))?;

        let model = self
            .builder
            .build(scenario, source)
            .map_err(|e| fail(&scenario.scenario_id, AssemblyStep::BuildModel, e))?;

        run(AssemblyStep::WriteArtifacts, self.write_artifacts(out_dir, &model))?;
        run(
            AssemblyStep::WriteManifest,
            write_json(out_dir, MANIFEST_PATH, &model.manifest),
        )?;
        run(
            AssemblyStep::WriteTimeline,
            write_ndjson(&out_dir.join(TIMELINE_PATH), &model.timeline).map(|()| {
                obs::emit_artifact_written(TIMELINE_PATH);
            }),
        )?;

        let digest = integrity::digest(out_dir)
            .map_err(|e| fail(&scenario.scenario_id, AssemblyStep::Digest, e))?;
        obs::emit_digest_computed(digest.record.len(), &digest.root_hash.to_hex());

        if self.write_root_hash {
            run(
                AssemblyStep::WriteRootHash,
                integrity::write_root_hash(out_dir, &digest.root_hash),
            )?;
        }

        METRICS.inc_packs_assembled();
        obs::emit_pack_assembled(
            &scenario.scenario_id,
            &digest.root_hash.to_hex(),
            model.timeline.len(),
        );

        Ok(AssembledPack {
            root: out_dir.to_path_buf(),
            model,
            digest,
        })
    }

    fn write_artifacts(&self, out_dir: &Path, model: &RunModel) -> Result<()> {
        for kind in ArtifactKind::ALL {
            let rel = kind.rel_path();
            match kind {
                ArtifactKind::Context => write_json(out_dir, &rel, &model.context)?,
                ArtifactKind::Plan => write_json(out_dir, &rel, &model.plan)?,
                ArtifactKind::Trace => write_json(out_dir, &rel, &model.trace)?,
            }
        }
        Ok(())
    }
}

fn write_json<T: Serialize>(out_dir: &Path, rel: &str, value: &T) -> Result<()> {
    write_canonical_json(&out_dir.join(rel), value)?;
    obs::emit_artifact_written(rel);
    Ok(())
}

fn remove_stale(out_dir: &Path) -> Result<()> {
    if !out_dir.is_dir() {
        return Ok(());
    }
    for rel in [ROOT_HASH_PATH, SUMS_PATH] {
        let path = out_dir.join(rel);
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "removed stale integrity file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(PackError::io(path, e)),
        }
    }
    Ok(())
}

fn fail(scenario_id: &str, step: AssemblyStep, error: PackError) -> PackError {
    obs::emit_assembly_failed(scenario_id, step, &error);
    PackError::Assembly {
        step,
        source: Box::new(error),
    }
}
