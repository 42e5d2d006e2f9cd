//! Structured observability hooks for pack lifecycle events.
//!
//! This module provides:
//! - A pack-scoped tracing span via the `PackSpan` RAII guard
//! - Emission functions for assembly, digest and verification events
//!
//! Events are emitted at `info!` level; filter with `RUST_LOG`.

use std::path::Path;

use tracing::info;

use crate::error::AssemblyStep;

/// RAII guard that enters a pack-scoped span for the duration of an assembly
/// or verification.
///
/// ```ignore
/// let _span = PackSpan::enter("gf-01-single-agent-lifecycle");
/// // every tracing call below carries scenario_id
/// ```
pub struct PackSpan {
    _span: tracing::span::EnteredSpan,
}

impl PackSpan {
    pub fn enter(scenario_id: &str) -> Self {
        let span = tracing::info_span!("evpack.pack", scenario_id = %scenario_id);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_pack_started(scenario_id: &str, out_dir: &Path, substrate: &str) {
    info!(
        event = "pack.started",
        scenario_id = %scenario_id,
        out_dir = %out_dir.display(),
        substrate = %substrate,
    );
}

pub fn emit_artifact_written(rel_path: &str) {
    info!(event = "pack.artifact_written", path = %rel_path);
}

pub fn emit_digest_computed(file_count: usize, root_hash: &str) {
    info!(event = "pack.digest_computed", files = file_count, root_hash = %root_hash);
}

pub fn emit_pack_assembled(scenario_id: &str, root_hash: &str, events: usize) {
    info!(
        event = "pack.assembled",
        scenario_id = %scenario_id,
        root_hash = %root_hash,
        events = events,
    );
}

/// Warning-level: assembly aborted; the output directory is inconsistent.
pub fn emit_assembly_failed(scenario_id: &str, step: AssemblyStep, error: &dyn std::fmt::Display) {
    tracing::warn!(
        event = "pack.assembly_failed",
        scenario_id = %scenario_id,
        step = %step,
        error = %error,
    );
}

pub fn emit_verify_mismatch(pack_root: &Path, path: &str, expected: &str, actual: &str) {
    tracing::warn!(
        event = "pack.verify_mismatch",
        pack_root = %pack_root.display(),
        path = %path,
        expected = %expected,
        actual = %actual,
    );
}

pub fn emit_invalid_pack(pack_root: &Path, path: &str, reason: &str) {
    tracing::warn!(
        event = "pack.invalid",
        pack_root = %pack_root.display(),
        path = %path,
        reason = %reason,
    );
}
