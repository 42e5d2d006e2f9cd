//! Evidence Pack Core Library
//!
//! Deterministic evidence packs for agent-lifecycle scenarios: run model
//! construction, canonical serialization, integrity digests, verification
//! and cross-substrate equivalence.

pub mod canonical;
pub mod catalog;
pub mod config;
pub mod equivalence;
pub mod error;
pub mod ids;
pub mod integrity;
pub mod interaction;
pub mod metrics;
pub mod model;
pub mod obs;
pub mod pack;
pub mod scenario;
pub mod telemetry;
pub mod verify;

pub use config::{LogicalTimestamp, PackConfig};
pub use equivalence::{verdict_hash, EquivalenceRecord, EvidenceMinimums, PackVerdict};
pub use error::{AssemblyStep, PackError, Result};
pub use ids::{IdGenerator, DEFAULT_NAMESPACE};
pub use integrity::{Digest, IntegrityEntry, IntegrityRecord, PackDigest};
pub use interaction::{CommandSource, InteractionSource, TableSource};
pub use model::{
    ArtifactKind, Context, EventKind, Manifest, Plan, RunModel, RunModelBuilder, TimelineEvent,
    Trace,
};
pub use pack::{AssembledPack, PackAssembler};
pub use scenario::{AgentRef, HandoffSpec, Scenario, StepSpec, Substrate};
pub use telemetry::init_tracing;
pub use verify::{recompute, verify, verify_parallel, RecomputeReport, VerifyReport};

/// Crate version, recorded as the generator version of built-in scenarios.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
