//! Built-in reference scenarios.
//!
//! These reproduce the `gf-01` cross-substrate vectors: a single agent
//! planning a three-step task, and a coordinator handing a six-step plan to
//! an executor. Each ships with the canned responses its producers fed to
//! their fake LLMs, so assembling them needs no live framework.

use std::collections::BTreeMap;

use crate::scenario::{
    AgentRef, GeneratorInfo, HandoffSpec, Scenario, StepSpec, Substrate, SubstrateInfo,
    CONTEXT_SUMMARY_KEY,
};

pub const SINGLE_AGENT_LIFECYCLE: &str = "gf-01-single-agent-lifecycle";
pub const MULTI_AGENT_LIFECYCLE: &str = "gf-01-multi-agent-lifecycle";

/// Names of all built-in scenarios, sorted.
pub fn names() -> Vec<&'static str> {
    vec![MULTI_AGENT_LIFECYCLE, SINGLE_AGENT_LIFECYCLE]
}

/// Look up a built-in scenario by id.
pub fn get(name: &str) -> Option<Scenario> {
    match name {
        SINGLE_AGENT_LIFECYCLE => Some(single_agent_lifecycle()),
        MULTI_AGENT_LIFECYCLE => Some(multi_agent_lifecycle()),
        _ => None,
    }
}

fn steps(agent_seq: &[&str]) -> Vec<StepSpec> {
    agent_seq
        .iter()
        .enumerate()
        .map(|(i, agent)| StepSpec {
            agent: agent.to_string(),
            key: format!("plan.step.{}", i + 1),
        })
        .collect()
}

fn responses(summary: &str, step_texts: &[&str]) -> BTreeMap<String, String> {
    let mut table = BTreeMap::new();
    table.insert(CONTEXT_SUMMARY_KEY.to_string(), summary.to_string());
    for (i, text) in step_texts.iter().enumerate() {
        table.insert(format!("plan.step.{}", i + 1), text.to_string());
    }
    table
}

/// One agent, three plan steps, no hand-offs.
pub fn single_agent_lifecycle() -> Scenario {
    Scenario {
        scenario_id: SINGLE_AGENT_LIFECYCLE.to_string(),
        run_id: None,
        pack_id: None,
        approach: "Deterministic single-agent planning".to_string(),
        agents: vec![AgentRef::new("agent", "planner")],
        steps: steps(&["agent", "agent", "agent"]),
        handoffs: Vec::new(),
        substrate: Substrate::Detailed(SubstrateInfo {
            kind: "langchain".to_string(),
            version: "0.2.16".to_string(),
            deterministic_mode: Some("FakeListLLM".to_string()),
            packages: vec![
                "langchain==0.2.16".to_string(),
                "langchain-community==0.2.16".to_string(),
            ],
        }),
        substrate_version: None,
        generator: GeneratorInfo {
            name: "evpack-reference-generator".to_string(),
            version: crate::VERSION.to_string(),
        },
        lock: None,
        responses: responses(
            "Summarize: Plan a simple multi-step task",
            &[
                "Step 1: Initialize task environment",
                "Step 2: Process input data",
                "Step 3: Generate output results",
            ],
        ),
    }
}

/// Coordinator plans and hands off to an executor that starts idle.
pub fn multi_agent_lifecycle() -> Scenario {
    Scenario {
        scenario_id: MULTI_AGENT_LIFECYCLE.to_string(),
        run_id: None,
        pack_id: None,
        approach: "Coordinator creates plan, hands off to executor for implementation"
            .to_string(),
        agents: vec![
            AgentRef::new("coordinator", "coordinator"),
            AgentRef::new("executor", "executor").inactive(),
        ],
        steps: steps(&[
            "coordinator",
            "coordinator",
            "coordinator",
            "executor",
            "executor",
            "executor",
        ]),
        handoffs: vec![HandoffSpec {
            from: "coordinator".to_string(),
            to: "executor".to_string(),
            task: "execute_plan".to_string(),
        }],
        substrate: Substrate::Named("langchain".to_string()),
        substrate_version: Some("0.2.16".to_string()),
        generator: GeneratorInfo {
            name: "evpack-reference-generator".to_string(),
            version: crate::VERSION.to_string(),
        },
        lock: None,
        responses: responses(
            "Multi-agent lifecycle validation with handoff",
            &[
                "Analyze requirements",
                "Create plan",
                "Handoff to executor",
                "Receive handoff",
                "Execute plan",
                "Report completion",
            ],
        ),
    }
}
