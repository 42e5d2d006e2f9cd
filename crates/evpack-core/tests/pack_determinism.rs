//! Determinism contract for assembled packs.
//!
//! Two assemblies from identical inputs must produce byte-identical trees,
//! and every identifier and timestamp inside a pack must be derivable from
//! the configuration alone.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use evpack_core::{catalog, PackAssembler, PackConfig, Scenario};
use uuid::Uuid;

/// Every file under `root`, keyed by pack-relative path.
fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<String, Vec<u8>>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
                out.insert(rel, std::fs::read(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

fn assemble(scenario: &Scenario, config: PackConfig, dir: &Path) -> String {
    PackAssembler::new(config)
        .assemble(scenario, &scenario.response_table(), dir)
        .expect("assemble")
        .root_hash()
        .to_hex()
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn repeated_assembly_is_byte_identical() {
    for name in catalog::names() {
        let scenario = catalog::get(name).unwrap();
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();

        let hash_a = assemble(&scenario, PackConfig::default(), a.path());
        let hash_b = assemble(&scenario, PackConfig::default(), b.path());

        assert_eq!(hash_a, hash_b, "root hash drift for {name}");
        assert_eq!(snapshot(a.path()), snapshot(b.path()), "tree drift for {name}");
    }
}

#[test]
fn reassembly_into_same_dir_is_stable() {
    let scenario = catalog::multi_agent_lifecycle();
    let dir = tempfile::tempdir().unwrap();
    let first = assemble(&scenario, PackConfig::default(), dir.path());
    let before = snapshot(dir.path());
    let second = assemble(&scenario, PackConfig::default(), dir.path());
    assert_eq!(first, second);
    assert_eq!(before, snapshot(dir.path()));
}

#[test]
fn context_id_is_namespace_derived() {
    let scenario = catalog::single_agent_lifecycle();
    let dir = tempfile::tempdir().unwrap();
    assemble(&scenario, PackConfig::default(), dir.path());

    let context = read_json(&dir.path().join("artifacts/context.json"));
    assert_eq!(context["context_id"], "1fca870e-d065-5930-8cbc-0c86ebc4c13a");

    let plan = read_json(&dir.path().join("artifacts/plan.json"));
    assert_eq!(plan["plan_id"], "6e267b6a-eccc-5b04-8df5-0823d1b0575c");
    assert_eq!(plan["context_ref"], context["context_id"]);
}

#[test]
fn namespace_and_timestamp_flow_into_pack() {
    let scenario = catalog::single_agent_lifecycle();
    let default_dir = tempfile::tempdir().unwrap();
    let custom_dir = tempfile::tempdir().unwrap();

    let custom = PackConfig::default()
        .with_namespace(Uuid::from_u128(1))
        .with_timestamp("2030-05-06T07:08:09Z".parse().unwrap());

    let default_hash = assemble(&scenario, PackConfig::default(), default_dir.path());
    let custom_hash = assemble(&scenario, custom, custom_dir.path());
    assert_ne!(default_hash, custom_hash);

    let context = read_json(&custom_dir.path().join("artifacts/context.json"));
    assert_ne!(context["context_id"], "1fca870e-d065-5930-8cbc-0c86ebc4c13a");
    assert_eq!(context["created_at"], "2030-05-06T07:08:09Z");
}

#[test]
fn timeline_is_ordered_ndjson_with_fixed_timestamp() {
    let scenario = catalog::multi_agent_lifecycle();
    let dir = tempfile::tempdir().unwrap();
    assemble(&scenario, PackConfig::default(), dir.path());

    let text = std::fs::read_to_string(dir.path().join("timeline/events.ndjson")).unwrap();
    assert!(text.ends_with('\n'));

    let mut seen = HashSet::new();
    let events: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is a JSON object"))
        .collect();
    for (i, event) in events.iter().enumerate() {
        let id = event["event_id"].as_str().unwrap();
        assert_eq!(id, format!("evt-{:03}", i + 1));
        assert!(seen.insert(id.to_string()), "duplicate {id}");
        assert_eq!(event["timestamp"], "2026-01-01T00:00:00Z");
    }

    let types: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
    assert_eq!(
        types,
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
    assert_eq!(events[3]["from_agent"], "coordinator");
    assert_eq!(events[3]["to_agent"], "executor");
    assert_eq!(events[4]["received_from"], "coordinator");
}

#[test]
fn artifacts_are_canonical_json() {
    let scenario = catalog::multi_agent_lifecycle();
    let dir = tempfile::tempdir().unwrap();
    assemble(&scenario, PackConfig::default(), dir.path());

    for rel in [
        "manifest.json",
        "artifacts/context.json",
        "artifacts/plan.json",
        "artifacts/trace.json",
    ] {
        let text = std::fs::read_to_string(dir.path().join(rel)).unwrap();
        assert!(text.ends_with("}\n"), "{rel} must end with a newline");
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let mut rendered = serde_json::to_string_pretty(&value).unwrap();
        rendered.push('\n');
        assert_eq!(text, rendered, "{rel} is not in canonical form");
    }
}

#[test]
fn manifest_hashes_stay_pending() {
    let scenario = catalog::multi_agent_lifecycle();
    let dir = tempfile::tempdir().unwrap();
    assemble(&scenario, PackConfig::default(), dir.path());

    let manifest = read_json(&dir.path().join("manifest.json"));
    assert_eq!(manifest["hashes"]["pack_root_hash"], "pending");
    assert_eq!(manifest["hashes"]["canonical_pack_root_hash"], "pending");
    assert_eq!(manifest["multi_agent"]["agent_count"], 2);
    assert_eq!(manifest["multi_agent"]["handoff_count"], 1);
}
