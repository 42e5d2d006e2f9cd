//! Canonical JSON serialization and atomic file writes.
//!
//! Canonical form for pack files:
//! - object keys sorted by byte-wise order of the UTF-8 key, at every depth
//! - array order preserved exactly as supplied
//! - two-space indentation and a single trailing `\n` for `.json` files
//! - compact single-line objects for NDJSON timelines
//!
//! Files are written through a temp file in the destination directory and
//! renamed into place, so a concurrent reader sees either the old content or
//! the complete new content.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::error::{PackError, Result};

/// Recursively rebuild `value` with object keys in byte-wise order.
///
/// Insertion happens in sorted order, so the result is canonical whether or
/// not `serde_json` was built with `preserve_order`.
pub fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            let mut sorted = Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted.insert(key.clone(), sort_keys(v));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

fn canonical_value<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Value> {
    let raw = serde_json::to_value(value)?;
    Ok(sort_keys(&raw))
}

/// Pretty canonical form: sorted keys, two-space indent, trailing newline.
pub fn to_canonical_string<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let canonical = canonical_value(value)?;
    let mut out = serde_json::to_string_pretty(&canonical)?;
    out.push('\n');
    Ok(out)
}

/// Compact canonical form on a single line, without a newline.
pub fn to_canonical_line<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let canonical = canonical_value(value)?;
    serde_json::to_string(&canonical)
}

/// Render `values` as NDJSON: one compact canonical object per line, each
/// terminated by `\n`, no blank lines.
pub fn to_ndjson<T: Serialize>(values: &[T]) -> serde_json::Result<String> {
    let mut out = String::new();
    for value in values {
        out.push_str(&to_canonical_line(value)?);
        out.push('\n');
    }
    Ok(out)
}

/// Atomically replace `path` with `bytes`, creating parent directories.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| PackError::io(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| PackError::io(parent, e))?;
    tmp.write_all(bytes).map_err(|e| PackError::io(path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| PackError::io(path, e))?;
    tmp.persist(path).map_err(|e| PackError::io(path, e.error))?;
    Ok(())
}

/// Write `value` to `path` in pretty canonical form.
pub fn write_canonical_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let body = to_canonical_string(value).map_err(|e| PackError::serialization(path, e))?;
    write_atomic(path, body.as_bytes())
}

/// Write `values` to `path` as NDJSON.
pub fn write_ndjson<T: Serialize>(path: &Path, values: &[T]) -> Result<()> {
    let body = to_ndjson(values).map_err(|e| PackError::serialization(path, e))?;
    write_atomic(path, body.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_keys_sorted_at_every_depth() {
        let input = json!({
            "b": 1,
            "a": { "z": 1, "y": 2 },
        });
        let line = to_canonical_line(&input).expect("canonical line");
        assert_eq!(line, r#"{"a":{"y":2,"z":1},"b":1}"#);
    }

    #[test]
    fn test_byte_wise_key_order() {
        // Uppercase sorts before lowercase, underscore between them.
        let input = json!({ "b": 0, "_": 0, "B": 0, "a": 0 });
        let line = to_canonical_line(&input).expect("canonical line");
        assert_eq!(line, r#"{"B":0,"_":0,"a":0,"b":0}"#);
    }

    #[test]
    fn test_array_order_preserved() {
        let a = to_canonical_line(&json!({ "steps": [3, 1, 2] })).expect("a");
        let b = to_canonical_line(&json!({ "steps": [1, 2, 3] })).expect("b");
        assert_ne!(a, b);
        assert_eq!(a, r#"{"steps":[3,1,2]}"#);
    }

    #[test]
    fn test_hashmap_input_is_canonical() {
        let mut map = HashMap::new();
        for key in ["delta", "alpha", "charlie", "bravo"] {
            map.insert(key.to_string(), key.len());
        }
        let line = to_canonical_line(&map).expect("canonical line");
        assert_eq!(line, r#"{"alpha":5,"bravo":5,"charlie":7,"delta":5}"#);
    }

    #[test]
    fn test_pretty_form_has_two_space_indent_and_single_newline() {
        let out = to_canonical_string(&json!({ "b": [1], "a": "x" })).expect("pretty");
        assert_eq!(out, "{\n  \"a\": \"x\",\n  \"b\": [\n    1\n  ]\n}\n");
        assert!(!out.ends_with("\n\n"));
    }

    #[test]
    fn test_ndjson_one_object_per_line() {
        let events = vec![
            json!({ "type": "a", "event_id": "evt-001" }),
            json!({ "event_id": "evt-002" }),
        ];
        let out = to_ndjson(&events).expect("ndjson");
        assert_eq!(
            out,
            "{\"event_id\":\"evt-001\",\"type\":\"a\"}\n{\"event_id\":\"evt-002\"}\n"
        );
    }

    #[test]
    fn test_write_canonical_json_creates_parents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("artifacts").join("context.json");
        write_canonical_json(&path, &json!({ "a": 1 })).expect("write");
        let content = std::fs::read_to_string(&path).expect("read");
        assert_eq!(content, "{\n  \"a\": 1\n}\n");
    }

    #[test]
    fn test_write_overwrites_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("manifest.json");
        write_canonical_json(&path, &json!({ "v": 1 })).expect("first");
        write_canonical_json(&path, &json!({ "v": 2 })).expect("second");

        let content = std::fs::read_to_string(&path).expect("read");
        assert!(content.contains("2"));
        let entries: Vec<_> = std::fs::read_dir(dir.path()).expect("read_dir").collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_write_into_file_parent_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file").expect("write blocker");

        let err = write_canonical_json(&blocker.join("x.json"), &json!({})).unwrap_err();
        assert!(matches!(err, PackError::Io { .. }), "got {err:?}");
    }

    #[test]
    fn test_non_string_keys_are_serialization_errors() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(vec![1u8], 1);
        assert!(to_canonical_line(&map).is_err());
    }
}
