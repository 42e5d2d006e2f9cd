//! Scenario descriptions: roster, plan steps, hand-off topology, identity of
//! the producing substrate.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PackError, Result};
use crate::interaction::TableSource;

/// Interaction key for the context summary.
pub const CONTEXT_SUMMARY_KEY: &str = "context.summary";

/// An agent taking part in a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRef {
    pub agent_id: String,
    pub role: String,
    /// Active agents are initialised before any artifact is written. Inactive
    /// agents are initialised when they first receive a hand-off.
    #[serde(default = "default_true")]
    pub starts_active: bool,
}

fn default_true() -> bool {
    true
}

impl AgentRef {
    pub fn new(agent_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            role: role.into(),
            starts_active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.starts_active = false;
        self
    }
}

/// One logical plan step. The description is resolved through the
/// interaction source under `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    pub agent: String,
    pub key: String,
}

/// Transfer of a task from one agent to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffSpec {
    pub from: String,
    pub to: String,
    pub task: String,
}

/// Producing framework, written as `substrate` in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Substrate {
    /// `"substrate": "langchain"`, optionally with a top-level
    /// `substrate_version`.
    Named(String),
    Detailed(SubstrateInfo),
}

impl Substrate {
    pub fn name(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Detailed(info) => &info.kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstrateInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deterministic_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorInfo {
    pub name: String,
    pub version: String,
}

/// Reference to the producer's dependency lock file. The hash is owned by
/// the sealing step and always written as `"pending"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSpec {
    pub lock_kind: String,
    pub lock_path: String,
}

/// Everything the builder needs to know about one scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub scenario_id: String,
    /// Prefix for derived ids. Defaults to `scenario_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Explicit pack id. Defaults to a derived id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_id: Option<String>,
    pub approach: String,
    pub agents: Vec<AgentRef>,
    pub steps: Vec<StepSpec>,
    #[serde(default)]
    pub handoffs: Vec<HandoffSpec>,
    pub substrate: Substrate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substrate_version: Option<String>,
    pub generator: GeneratorInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock: Option<LockSpec>,
    /// Canned responses shipped with the scenario file.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub responses: BTreeMap<String, String>,
}

impl Scenario {
    /// Load a scenario from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path).map_err(|e| PackError::io(path, e))?;
        let scenario: Scenario =
            serde_json::from_slice(&raw).map_err(|e| PackError::serialization(path, e))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Seed for derived identifiers.
    pub fn id_seed(&self) -> &str {
        self.run_id.as_deref().unwrap_or(&self.scenario_id)
    }

    pub fn is_multi_agent(&self) -> bool {
        self.agents.len() > 1
    }

    /// The canned responses as a [`TableSource`].
    pub fn response_table(&self) -> TableSource {
        TableSource::from(self.responses.clone())
    }

    pub fn agent(&self, agent_id: &str) -> Option<&AgentRef> {
        self.agents.iter().find(|a| a.agent_id == agent_id)
    }

    /// The agent that writes the context and plan.
    pub fn coordinator(&self) -> Option<&AgentRef> {
        self.agents.iter().find(|a| a.starts_active)
    }

    /// The agent holding the task after the last hand-off.
    pub fn completer(&self) -> Option<&str> {
        match self.handoffs.last() {
            Some(h) => Some(h.to.as_str()),
            None => self.coordinator().map(|a| a.agent_id.as_str()),
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> PackError {
        PackError::InvalidScenario {
            scenario_id: self.scenario_id.clone(),
            reason: reason.into(),
        }
    }

    /// Structural checks: non-empty ids, unique roster, known agents, and
    /// every agent activated either at start or by a hand-off.
    pub fn validate(&self) -> Result<()> {
        if self.scenario_id.trim().is_empty() {
            return Err(self.invalid("scenario_id must not be empty"));
        }
        if self.agents.is_empty() {
            return Err(self.invalid("agent roster must not be empty"));
        }

        let mut seen = BTreeSet::new();
        for agent in &self.agents {
            if agent.agent_id.is_empty() {
                return Err(self.invalid("agent_id must not be empty"));
            }
            if !seen.insert(agent.agent_id.as_str()) {
                return Err(self.invalid(format!("duplicate agent_id {:?}", agent.agent_id)));
            }
        }

        if self.coordinator().is_none() {
            return Err(self.invalid("at least one agent must start active"));
        }

        for step in &self.steps {
            if !seen.contains(step.agent.as_str()) {
                return Err(self.invalid(format!(
                    "step {:?} names unknown agent {:?}",
                    step.key, step.agent
                )));
            }
            if step.key.is_empty() {
                return Err(self.invalid("step key must not be empty"));
            }
        }
        if self.steps.is_empty() {
            return Err(self.invalid("plan must contain at least one step"));
        }

        let mut active: BTreeSet<&str> = self
            .agents
            .iter()
            .filter(|a| a.starts_active)
            .map(|a| a.agent_id.as_str())
            .collect();
        for handoff in &self.handoffs {
            for id in [&handoff.from, &handoff.to] {
                if !seen.contains(id.as_str()) {
                    return Err(self.invalid(format!("handoff names unknown agent {id:?}")));
                }
            }
            if handoff.from == handoff.to {
                return Err(self.invalid(format!("agent {:?} hands off to itself", handoff.from)));
            }
            if !active.contains(handoff.from.as_str()) {
                return Err(self.invalid(format!(
                    "agent {:?} hands off before it is active",
                    handoff.from
                )));
            }
            if handoff.task.is_empty() {
                return Err(self.invalid("handoff task must not be empty"));
            }
            active.insert(handoff.to.as_str());
        }

        if let Some(idle) = self.agents.iter().find(|a| !active.contains(a.agent_id.as_str())) {
            return Err(self.invalid(format!("agent {:?} is never activated", idle.agent_id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_agent() -> Scenario {
        Scenario {
            scenario_id: "gf-01-multi-agent-lifecycle".to_string(),
            run_id: None,
            pack_id: None,
            approach: "coordinate".to_string(),
            agents: vec![
                AgentRef::new("coordinator", "coordinator"),
                AgentRef::new("executor", "executor").inactive(),
            ],
            steps: vec![StepSpec {
                agent: "coordinator".to_string(),
                key: "plan.step.1".to_string(),
            }],
            handoffs: vec![HandoffSpec {
                from: "coordinator".to_string(),
                to: "executor".to_string(),
                task: "execute_plan".to_string(),
            }],
            substrate: Substrate::Named("langchain".to_string()),
            substrate_version: Some("0.2.16".to_string()),
            generator: GeneratorInfo {
                name: "gen".to_string(),
                version: "0.1.0".to_string(),
            },
            lock: None,
            responses: BTreeMap::new(),
        }
    }

    #[test]
    fn test_valid_two_agent_scenario() {
        let scenario = two_agent();
        scenario.validate().expect("valid");
        assert!(scenario.is_multi_agent());
        assert_eq!(scenario.completer(), Some("executor"));
        assert_eq!(scenario.id_seed(), "gf-01-multi-agent-lifecycle");
    }

    #[test]
    fn test_duplicate_agent_rejected() {
        let mut scenario = two_agent();
        scenario.agents[1].agent_id = "coordinator".to_string();
        assert!(matches!(
            scenario.validate(),
            Err(PackError::InvalidScenario { .. })
        ));
    }

    #[test]
    fn test_never_activated_agent_rejected() {
        let mut scenario = two_agent();
        scenario.handoffs.clear();
        let err = scenario.validate().unwrap_err();
        assert!(err.to_string().contains("never activated"));
    }

    #[test]
    fn test_handoff_from_inactive_agent_rejected() {
        let mut scenario = two_agent();
        scenario.handoffs[0] = HandoffSpec {
            from: "executor".to_string(),
            to: "coordinator".to_string(),
            task: "t".to_string(),
        };
        let err = scenario.validate().unwrap_err();
        assert!(err.to_string().contains("before it is active"));
    }

    #[test]
    fn test_substrate_untagged_forms() {
        let named: Substrate = serde_json::from_str(r#""crewai""#).expect("named");
        assert_eq!(named.name(), "crewai");

        let detailed: Substrate = serde_json::from_str(
            r#"{ "type": "langchain", "version": "0.2.16", "packages": ["langchain==0.2.16"] }"#,
        )
        .expect("detailed");
        assert_eq!(detailed.name(), "langchain");
        let back = serde_json::to_value(&detailed).expect("serialize");
        assert!(back.get("deterministic_mode").is_none());
    }

    #[test]
    fn test_scenario_json_defaults() {
        let raw = r#"{
            "scenario_id": "demo",
            "approach": "single",
            "agents": [{ "agent_id": "agent", "role": "worker" }],
            "steps": [{ "agent": "agent", "key": "plan.step.1" }],
            "substrate": "mock",
            "generator": { "name": "g", "version": "1.0.0" },
            "responses": { "context.summary": "s", "plan.step.1": "do it" }
        }"#;
        let scenario: Scenario = serde_json::from_str(raw).expect("parse");
        scenario.validate().expect("valid");
        assert!(scenario.agents[0].starts_active);
        assert!(scenario.handoffs.is_empty());
        assert_eq!(scenario.response_table().len(), 2);
    }
}
