//! Run model: the canonical artifacts, manifest and timeline of one pack, and
//! the builder that derives them from a scenario and an interaction source.
//!
//! The builder is a pure function of `(PackConfig, Scenario, responses)`.
//! Identifiers are v5 UUIDs, the only timestamp is the configured logical
//! one, and every sequence follows roster or scenario order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::{LogicalTimestamp, PackConfig};
use crate::error::{PackError, Result};
use crate::ids::IdGenerator;
use crate::interaction::InteractionSource;
use crate::scenario::{GeneratorInfo, Scenario, Substrate, CONTEXT_SUMMARY_KEY};

/// Placeholder for hashes owned by the downstream sealing step.
pub const PENDING: &str = "pending";

/// The three content artifacts of a pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Context,
    Plan,
    Trace,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [Self::Context, Self::Plan, Self::Trace];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Context => "context.json",
            Self::Plan => "plan.json",
            Self::Trace => "trace.json",
        }
    }

    /// Pack-relative path, e.g. `artifacts/plan.json`.
    pub fn rel_path(self) -> String {
        format!("artifacts/{}", self.file_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Completed,
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    pub summary: String,
    /// Present only for multi-agent scenarios.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents_required: Option<usize>,
    /// Present only for multi-agent scenarios.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff_required: Option<bool>,
}

/// Who is running, on what, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub context_id: Uuid,
    pub created_at: LogicalTimestamp,
    pub created_by: String,
    pub project_id: Uuid,
    pub requirements: Requirements,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub step_id: Uuid,
    pub agent: String,
    pub description: String,
    pub status: StepStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: Uuid,
    pub context_ref: Uuid,
    pub approach: String,
    pub created_at: LogicalTimestamp,
    pub created_by: String,
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub agent_id: String,
    pub artifacts_created: Vec<String>,
    pub events_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub handoffs: usize,
    pub outcome: Outcome,
    pub total_agents: usize,
    pub total_events: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    pub trace_id: Uuid,
    pub plan_ref: Uuid,
    pub context_ref: Uuid,
    pub created_at: LogicalTimestamp,
    pub completed_by: String,
    pub agent_summaries: Vec<AgentSummary>,
    pub execution_summary: ExecutionSummary,
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffPayload {
    pub task: String,
}

/// Event-specific fields, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    #[serde(rename = "agent.init")]
    AgentInit {
        role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        received_from: Option<String>,
    },

    #[serde(rename = "artifact.create")]
    ArtifactCreate {
        artifact_type: ArtifactKind,
        artifact_ref: String,
    },

    #[serde(rename = "handoff")]
    Handoff {
        from_agent: String,
        to_agent: String,
        context_ref: String,
        payload: HandoffPayload,
    },

    #[serde(rename = "task.start")]
    TaskStart { task_ref: String },

    #[serde(rename = "agent.complete")]
    AgentComplete { outcome: Outcome },
}

impl EventKind {
    /// The serialized `type` tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::AgentInit { .. } => "agent.init",
            Self::ArtifactCreate { .. } => "artifact.create",
            Self::Handoff { .. } => "handoff",
            Self::TaskStart { .. } => "task.start",
            Self::AgentComplete { .. } => "agent.complete",
        }
    }
}

pub const EVENT_ID_PREFIX: &str = "evt-";

/// `evt-` followed by the 1-based sequence, zero-padded to at least three
/// digits. Past `evt-999` the ids widen, so order events by [`event_sequence`]
/// rather than by comparing id strings.
pub fn event_id(sequence: u64) -> String {
    format!("{EVENT_ID_PREFIX}{sequence:03}")
}

/// The sequence number encoded in an event id, if it is well formed.
pub fn event_sequence(event_id: &str) -> Option<u64> {
    let digits = event_id.strip_prefix(EVENT_ID_PREFIX)?;
    if digits.len() < 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// One line of `timeline/events.ndjson`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub event_id: String,
    pub timestamp: LogicalTimestamp,
    pub agent_id: String,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl TimelineEvent {
    pub fn sequence(&self) -> Option<u64> {
        event_sequence(&self.event_id)
    }
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub agent_id: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiAgentBlock {
    pub agent_count: usize,
    pub agents: Vec<RosterEntry>,
    pub handoff_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRef {
    pub lock_kind: String,
    pub lock_path: String,
    pub lock_sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackHashes {
    pub pack_root_hash: String,
    pub canonical_pack_root_hash: String,
}

impl PackHashes {
    pub fn pending() -> Self {
        Self {
            pack_root_hash: PENDING.to_string(),
            canonical_pack_root_hash: PENDING.to_string(),
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.pack_root_hash != PENDING && self.canonical_pack_root_hash != PENDING
    }
}

/// Top-level pack descriptor, `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub pack_id: String,
    pub scenario_id: String,
    pub protocol_version: String,
    pub substrate: Substrate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substrate_version: Option<String>,
    pub generator: GeneratorInfo,
    pub created_at: LogicalTimestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_agent: Option<MultiAgentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_ref: Option<LockRef>,
    pub hashes: PackHashes,
}

/// Everything the assembler writes before digesting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunModel {
    pub context: Context,
    pub plan: Plan,
    pub trace: Trace,
    pub manifest: Manifest,
    pub timeline: Vec<TimelineEvent>,
}

impl RunModel {
    pub fn handoff_count(&self) -> usize {
        self.timeline
            .iter()
            .filter(|e| matches!(e.kind, EventKind::Handoff { .. }))
            .count()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

struct TimelineWriter {
    timestamp: LogicalTimestamp,
    events: Vec<TimelineEvent>,
}

impl TimelineWriter {
    fn new(timestamp: LogicalTimestamp) -> Self {
        Self {
            timestamp,
            events: Vec::new(),
        }
    }

    fn push(&mut self, agent_id: &str, kind: EventKind) {
        let event_id = event_id(self.events.len() as u64 + 1);
        debug!(
            event_id = %event_id,
            kind = kind.type_name(),
            agent_id = %agent_id,
            "timeline event"
        );
        self.events.push(TimelineEvent {
            event_id,
            timestamp: self.timestamp,
            agent_id: agent_id.to_string(),
            kind,
        });
    }

    fn artifact(&mut self, agent_id: &str, kind: ArtifactKind) {
        self.push(
            agent_id,
            EventKind::ArtifactCreate {
                artifact_type: kind,
                artifact_ref: kind.rel_path(),
            },
        );
    }
}

/// Builds a [`RunModel`] from a scenario and an interaction source.
#[derive(Debug, Clone)]
pub struct RunModelBuilder {
    config: PackConfig,
}

impl RunModelBuilder {
    pub fn new(config: PackConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PackConfig {
        &self.config
    }

    pub fn build<S>(&self, scenario: &Scenario, source: &S) -> Result<RunModel>
    where
        S: InteractionSource + ?Sized,
    {
        self.config.validate()?;
        scenario.validate()?;
        let ts = self.config.fixed_timestamp;
        let ids = IdGenerator::new(self.config.namespace, scenario.id_seed());

        let coordinator = scenario
            .coordinator()
            .map(|a| a.agent_id.clone())
            .ok_or_else(|| PackError::InvalidScenario {
                scenario_id: scenario.scenario_id.clone(),
                reason: "no active agent".to_string(),
            })?;
        let completer = scenario
            .completer()
            .unwrap_or(coordinator.as_str())
            .to_string();

        let summary = require(scenario, source, CONTEXT_SUMMARY_KEY)?;
        let multi = scenario.is_multi_agent();
        let context = Context {
            context_id: ids.id("context"),
            created_at: ts,
            created_by: coordinator.clone(),
            project_id: ids.id("project"),
            requirements: Requirements {
                summary,
                agents_required: multi.then_some(scenario.agents.len()),
                handoff_required: multi.then_some(!scenario.handoffs.is_empty()),
            },
        };

        let mut steps = Vec::with_capacity(scenario.steps.len());
        for (i, step) in scenario.steps.iter().enumerate() {
            steps.push(PlanStep {
                step_id: ids.id(&format!("step-{i}")),
                agent: step.agent.clone(),
                description: require(scenario, source, &step.key)?,
                status: StepStatus::Completed,
            });
        }
        let plan = Plan {
            plan_id: ids.id("plan"),
            context_ref: context.context_id,
            approach: scenario.approach.clone(),
            created_at: ts,
            created_by: coordinator.clone(),
            steps,
        };

        let timeline = build_timeline(scenario, &coordinator, &completer, ts);

        let mut artifacts_by_agent: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for event in &timeline {
            if let EventKind::ArtifactCreate { artifact_type, .. } = &event.kind {
                artifacts_by_agent
                    .entry(event.agent_id.as_str())
                    .or_default()
                    .push(artifact_type.file_name().to_string());
            }
        }
        let agent_summaries = scenario
            .agents
            .iter()
            .map(|agent| AgentSummary {
                agent_id: agent.agent_id.clone(),
                artifacts_created: artifacts_by_agent
                    .get(agent.agent_id.as_str())
                    .cloned()
                    .unwrap_or_default(),
                events_count: timeline
                    .iter()
                    .filter(|e| e.agent_id == agent.agent_id)
                    .count(),
            })
            .collect();

        let handoffs = scenario.handoffs.len();
        let trace = Trace {
            trace_id: ids.id("trace"),
            plan_ref: plan.plan_id,
            context_ref: context.context_id,
            created_at: ts,
            completed_by: completer,
            agent_summaries,
            execution_summary: ExecutionSummary {
                handoffs,
                outcome: Outcome::Success,
                total_agents: scenario.agents.len(),
                total_events: timeline.len(),
            },
        };

        let manifest = Manifest {
            pack_id: scenario
                .pack_id
                .clone()
                .unwrap_or_else(|| ids.id_string(&format!("{}-pack", scenario.substrate.name()))),
            scenario_id: scenario.scenario_id.clone(),
            protocol_version: self.config.protocol_version.clone(),
            substrate: scenario.substrate.clone(),
            substrate_version: scenario.substrate_version.clone(),
            generator: scenario.generator.clone(),
            created_at: ts,
            multi_agent: multi.then(|| MultiAgentBlock {
                agent_count: scenario.agents.len(),
                agents: scenario
                    .agents
                    .iter()
                    .map(|a| RosterEntry {
                        agent_id: a.agent_id.clone(),
                        role: a.role.clone(),
                    })
                    .collect(),
                handoff_count: handoffs,
            }),
            lock_ref: scenario.lock.as_ref().map(|lock| LockRef {
                lock_kind: lock.lock_kind.clone(),
                lock_path: lock.lock_path.clone(),
                lock_sha256: PENDING.to_string(),
            }),
            hashes: PackHashes::pending(),
        };

        debug!(
            scenario_id = %scenario.scenario_id,
            events = timeline.len(),
            handoffs = handoffs,
            source = %source.describe(),
            "run model built"
        );

        Ok(RunModel {
            context,
            plan,
            trace,
            manifest,
            timeline,
        })
    }
}

/// Look up `key` and reject missing or blank responses.
fn require<S>(scenario: &Scenario, source: &S, key: &str) -> Result<String>
where
    S: InteractionSource + ?Sized,
{
    let text = source
        .response(key)?
        .map(|t| t.trim().to_string())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(PackError::ScenarioIncomplete {
            scenario_id: scenario.scenario_id.clone(),
            key: key.to_string(),
        });
    }
    Ok(text)
}

/// Causal order: active agents init, context, plan, each hand-off (with the
/// receiver's init on first activation and its task start), trace, completion.
fn build_timeline(
    scenario: &Scenario,
    coordinator: &str,
    completer: &str,
    ts: LogicalTimestamp,
) -> Vec<TimelineEvent> {
    let mut tl = TimelineWriter::new(ts);
    let mut initialised: Vec<&str> = Vec::new();

    for agent in scenario.agents.iter().filter(|a| a.starts_active) {
        tl.push(
            &agent.agent_id,
            EventKind::AgentInit {
                role: agent.role.clone(),
                received_from: None,
            },
        );
        initialised.push(&agent.agent_id);
    }

    tl.artifact(coordinator, ArtifactKind::Context);
    tl.artifact(coordinator, ArtifactKind::Plan);

    for handoff in &scenario.handoffs {
        tl.push(
            &handoff.from,
            EventKind::Handoff {
                from_agent: handoff.from.clone(),
                to_agent: handoff.to.clone(),
                context_ref: ArtifactKind::Plan.rel_path(),
                payload: HandoffPayload {
                    task: handoff.task.clone(),
                },
            },
        );
        if !initialised.contains(&handoff.to.as_str()) {
            let role = scenario
                .agent(&handoff.to)
                .map(|a| a.role.clone())
                .unwrap_or_default();
            tl.push(
                &handoff.to,
                EventKind::AgentInit {
                    role,
                    received_from: Some(handoff.from.clone()),
                },
            );
            initialised.push(&handoff.to);
        }
        tl.push(
            &handoff.to,
            EventKind::TaskStart {
                task_ref: handoff.task.clone(),
            },
        );
    }

    tl.artifact(completer, ArtifactKind::Trace);
    tl.push(
        completer,
        EventKind::AgentComplete {
            outcome: Outcome::Success,
        },
    );
    tl.events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::canonical::to_canonical_line;
    use crate::interaction::TableSource;

    fn builder() -> RunModelBuilder {
        RunModelBuilder::new(PackConfig::default())
    }

    #[test]
    fn test_single_agent_context_id_literal() {
        let scenario = catalog::single_agent_lifecycle();
        let model = builder()
            .build(&scenario, &scenario.response_table())
            .expect("build");
        assert_eq!(
            model.context.context_id.to_string(),
            "1fca870e-d065-5930-8cbc-0c86ebc4c13a"
        );
        assert_eq!(model.plan.context_ref, model.context.context_id);
        assert_eq!(model.trace.plan_ref, model.plan.plan_id);
        assert!(model.manifest.multi_agent.is_none());
        assert!(model.context.requirements.agents_required.is_none());
    }

    #[test]
    fn test_single_agent_timeline_order() {
        let scenario = catalog::single_agent_lifecycle();
        let model = builder()
            .build(&scenario, &scenario.response_table())
            .expect("build");
        let kinds: Vec<&str> = model.timeline.iter().map(|e| e.kind.type_name()).collect();
        assert_eq!(
            kinds,
            [
                "agent.init",
                "artifact.create",
                "artifact.create",
                "artifact.create",
                "agent.complete",
            ]
        );
        assert_eq!(model.handoff_count(), 0);
        assert_eq!(model.trace.execution_summary.total_events, 5);
    }

    #[test]
    fn test_two_agent_linear_handoff() {
        let scenario = catalog::multi_agent_lifecycle();
        let model = builder()
            .build(&scenario, &scenario.response_table())
            .expect("build");

        assert_eq!(model.handoff_count(), 1);
        assert_eq!(model.trace.execution_summary.handoffs, 1);
        assert_eq!(model.trace.completed_by, "executor");

        let kinds: Vec<&str> = model.timeline.iter().map(|e| e.kind.type_name()).collect();
        assert_eq!(
            kinds,
            [
                "agent.init",
                "artifact.create",
                "artifact.create",
                "handoff",
                "agent.init",
                "task.start",
                "artifact.create",
                "agent.complete",
            ]
        );

        let summaries = &model.trace.agent_summaries;
        assert_eq!(summaries[0].artifacts_created, ["context.json", "plan.json"]);
        assert_eq!(summaries[0].events_count, 4);
        assert_eq!(summaries[1].artifacts_created, ["trace.json"]);
        assert_eq!(summaries[1].events_count, 4);

        let block = model.manifest.multi_agent.as_ref().expect("multi-agent block");
        assert_eq!(block.agent_count, 2);
        assert_eq!(block.handoff_count, 1);
    }

    #[test]
    fn test_handoff_event_fields() {
        let scenario = catalog::multi_agent_lifecycle();
        let model = builder()
            .build(&scenario, &scenario.response_table())
            .expect("build");
        let handoff = model
            .timeline
            .iter()
            .find(|e| e.kind.type_name() == "handoff")
            .expect("handoff");
        let line = to_canonical_line(handoff).expect("serialize");
        let value: serde_json::Value = serde_json::from_str(&line).expect("parse");
        assert_eq!(value["from_agent"], "coordinator");
        assert_eq!(value["to_agent"], "executor");
        assert_eq!(value["payload"]["task"], "execute_plan");
        assert_eq!(value["type"], "handoff");
        assert_eq!(value["event_id"], "evt-004");
    }

    #[test]
    fn test_three_agent_chain_has_two_handoffs() {
        let mut scenario = catalog::multi_agent_lifecycle();
        scenario
            .agents
            .push(crate::scenario::AgentRef::new("reviewer", "reviewer").inactive());
        scenario.handoffs.push(crate::scenario::HandoffSpec {
            from: "executor".to_string(),
            to: "reviewer".to_string(),
            task: "review".to_string(),
        });
        let model = builder()
            .build(&scenario, &scenario.response_table())
            .expect("build");
        assert_eq!(model.handoff_count(), 2);
        assert_eq!(model.trace.completed_by, "reviewer");
        assert_eq!(model.manifest.multi_agent.expect("block").agent_count, 3);
    }

    #[test]
    fn test_event_ids_widen_past_999() {
        let mut scenario = catalog::multi_agent_lifecycle();
        for i in 0..500 {
            let (from, to) = if i % 2 == 0 {
                ("executor", "coordinator")
            } else {
                ("coordinator", "executor")
            };
            scenario.handoffs.push(crate::scenario::HandoffSpec {
                from: from.to_string(),
                to: to.to_string(),
                task: format!("round {i}"),
            });
        }
        let model = builder()
            .build(&scenario, &scenario.response_table())
            .expect("build");

        assert!(model.timeline.len() > 1000);
        assert_eq!(model.timeline[999].event_id, "evt-1000");
        let sequences: Vec<u64> = model
            .timeline
            .iter()
            .map(|e| e.sequence().expect("well-formed id"))
            .collect();
        assert!(sequences.windows(2).all(|w| w[1] == w[0] + 1));
        assert_eq!(sequences[0], 1);
    }

    #[test]
    fn test_event_sequence_parsing() {
        assert_eq!(event_sequence("evt-001"), Some(1));
        assert_eq!(event_sequence("evt-1234"), Some(1234));
        assert_eq!(event_sequence("evt-01"), None);
        assert_eq!(event_sequence("evt-+12"), None);
        assert_eq!(event_sequence("event-001"), None);
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let scenario = catalog::single_agent_lifecycle();
        let config = PackConfig {
            protocol_version: "not semver".to_string(),
            ..PackConfig::default()
        };
        let err = RunModelBuilder::new(config)
            .build(&scenario, &scenario.response_table())
            .unwrap_err();
        assert!(matches!(err, PackError::InvalidConfig(_)), "got {err:?}");
    }

    #[test]
    fn test_missing_response_is_scenario_incomplete() {
        let scenario = catalog::single_agent_lifecycle();
        let source = TableSource::new().with(CONTEXT_SUMMARY_KEY, "summary only");
        let err = builder().build(&scenario, &source).unwrap_err();
        match err {
            PackError::ScenarioIncomplete { scenario_id, key } => {
                assert_eq!(scenario_id, "gf-01-single-agent-lifecycle");
                assert_eq!(key, "plan.step.1");
            }
            other => panic!("expected ScenarioIncomplete, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_response_is_scenario_incomplete() {
        let scenario = catalog::single_agent_lifecycle();
        let mut source = scenario.response_table();
        source.insert(CONTEXT_SUMMARY_KEY, "   ");
        assert!(matches!(
            builder().build(&scenario, &source),
            Err(PackError::ScenarioIncomplete { .. })
        ));
    }

    #[test]
    fn test_build_is_deterministic() {
        let scenario = catalog::multi_agent_lifecycle();
        let a = builder().build(&scenario, &scenario.response_table()).expect("a");
        let b = builder().build(&scenario, &scenario.response_table()).expect("b");
        assert_eq!(a, b);
    }

    #[test]
    fn test_namespace_changes_ids_only() {
        let scenario = catalog::single_agent_lifecycle();
        let other = PackConfig::default()
            .with_namespace(Uuid::from_u128(0x0a901c00_1234_5678_1234_567812345678));
        let a = builder().build(&scenario, &scenario.response_table()).expect("a");
        let b = RunModelBuilder::new(other)
            .build(&scenario, &scenario.response_table())
            .expect("b");
        assert_ne!(a.context.context_id, b.context.context_id);
        assert_eq!(a.timeline, b.timeline);
    }

    #[test]
    fn test_timeline_event_roundtrips_through_flatten() {
        let scenario = catalog::multi_agent_lifecycle();
        let model = builder()
            .build(&scenario, &scenario.response_table())
            .expect("build");
        for event in &model.timeline {
            let line = to_canonical_line(event).expect("serialize");
            let back: TimelineEvent = serde_json::from_str(&line).expect("deserialize");
            assert_eq!(&back, event);
        }
    }

    #[test]
    fn test_manifest_hashes_pending() {
        let scenario = catalog::single_agent_lifecycle();
        let model = builder()
            .build(&scenario, &scenario.response_table())
            .expect("build");
        assert_eq!(model.manifest.hashes, PackHashes::pending());
        assert!(!model.manifest.hashes.is_sealed());
        assert_eq!(model.manifest.created_at.to_string(), "2026-01-01T00:00:00Z");
    }
}
