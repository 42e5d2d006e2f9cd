//! Pack verification and integrity recompute.
//!
//! A verifier never trusts the recorded listing: it walks the tree again,
//! hashes every file and compares against `integrity/sha256sums.txt` and
//! `pack_root_hash.txt`. The stored listing must be byte-identical to the
//! canonical one, so reordered lines, CRLF endings or uppercase hex fail
//! even when every digest agrees. The first disagreement is reported as
//! [`PackError::IntegrityMismatch`] naming the offending path.
//!
//! Once the bytes check out, the pack must also be complete: every file in
//! [`REQUIRED_FILES`] present, the JSON documents objects, and the timeline
//! a gap-free run of `evt-` ids. Failures there are
//! [`PackError::InvalidPack`].

use std::cmp::Ordering;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{PackError, Result};
use crate::integrity::{self, Digest, IntegrityRecord, PackDigest, ROOT_HASH_PATH, SUMS_PATH};
use crate::metrics::METRICS;
use crate::model::{event_id, event_sequence};
use crate::obs;
use crate::pack::{MANIFEST_PATH, REQUIRED_FILES, TIMELINE_PATH};

const ABSENT: &str = "<absent>";
const MANIFEST_FIELDS: [&str; 4] = ["pack_id", "scenario_id", "protocol_version", "created_at"];

/// Outcome of a successful [`verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub root_hash: Digest,
    pub files: usize,
    pub events: usize,
    /// Whether `pack_root_hash.txt` was present and checked.
    pub root_hash_checked: bool,
}

/// Recompute the pack digest and check it against the recorded integrity
/// files, then check that the pack is complete.
pub fn verify(root: &Path) -> Result<VerifyReport> {
    let computed = integrity::compute(root)?;
    check(root, computed)
}

/// [`verify`] with hashing on the blocking pool.
pub async fn verify_parallel(root: &Path) -> Result<VerifyReport> {
    let computed = integrity::compute_parallel(root).await?;
    check(root, computed)
}

fn check(root: &Path, computed: PackDigest) -> Result<VerifyReport> {
    let listing = integrity::read_sums_bytes(root)?;
    let recorded = IntegrityRecord::parse_bytes(&listing)?;
    compare_records(root, &recorded, &computed.record)?;

    if listing != computed.record.to_sums_text().as_bytes() {
        return Err(mismatch(
            root,
            SUMS_PATH,
            &Digest::compute(&listing).to_hex(),
            &computed.root_hash.to_hex(),
        ));
    }

    let stored_root = integrity::read_root_hash(root)?;
    if let Some(stored) = &stored_root {
        if *stored != computed.root_hash {
            return Err(mismatch(
                root,
                ROOT_HASH_PATH,
                &stored.to_hex(),
                &computed.root_hash.to_hex(),
            ));
        }
    }

    let events = check_structure(root)?;

    info!(
        event = "pack.verified",
        pack_root = %root.display(),
        files = computed.record.len(),
        events,
        root_hash = %computed.root_hash,
    );
    Ok(VerifyReport {
        root_hash: computed.root_hash,
        files: computed.record.len(),
        events,
        root_hash_checked: stored_root.is_some(),
    })
}

/// Required files, JSON object documents and the timeline sequence.
/// Returns the number of timeline events.
fn check_structure(root: &Path) -> Result<usize> {
    for rel in REQUIRED_FILES {
        if !root.join(rel).is_file() {
            return Err(invalid(root, rel, "required file is missing".to_string()));
        }
    }

    for rel in REQUIRED_FILES.iter().filter(|rel| rel.ends_with(".json")) {
        let text = read_text(root, rel)?;
        let Ok(Value::Object(doc)) = serde_json::from_str::<Value>(&text) else {
            return Err(invalid(root, rel, "not a JSON object".to_string()));
        };
        if *rel == MANIFEST_PATH {
            if let Some(field) = MANIFEST_FIELDS
                .iter()
                .find(|f| !doc.get(**f).is_some_and(Value::is_string))
            {
                return Err(invalid(root, rel, format!("missing string field {field:?}")));
            }
        }
    }

    check_timeline(root)
}

fn check_timeline(root: &Path) -> Result<usize> {
    let text = read_text(root, TIMELINE_PATH)?;
    let mut count = 0;
    for (index, line) in text.lines().enumerate() {
        let lineno = index + 1;
        let event: Value = serde_json::from_str(line)
            .map_err(|e| invalid(root, TIMELINE_PATH, format!("line {lineno}: {e}")))?;
        let id = event.get("event_id").and_then(Value::as_str).ok_or_else(|| {
            invalid(root, TIMELINE_PATH, format!("line {lineno}: no string event_id"))
        })?;
        if !event.get("type").is_some_and(Value::is_string) {
            return Err(invalid(root, TIMELINE_PATH, format!("line {lineno}: no string type")));
        }
        let expected = lineno as u64;
        if event_sequence(id) != Some(expected) {
            return Err(invalid(
                root,
                TIMELINE_PATH,
                format!("line {lineno}: event_id {id:?}, expected {:?}", event_id(expected)),
            ));
        }
        count = lineno;
    }
    if count == 0 {
        return Err(invalid(root, TIMELINE_PATH, "timeline has no events".to_string()));
    }
    Ok(count)
}

fn read_text(root: &Path, rel: &str) -> Result<String> {
    let path = root.join(rel);
    std::fs::read_to_string(&path).map_err(|e| PackError::io(&path, e))
}

fn invalid(root: &Path, path: &str, reason: String) -> PackError {
    METRICS.inc_verify_failures();
    obs::emit_invalid_pack(root, path, &reason);
    PackError::InvalidPack {
        path: path.to_string(),
        reason,
    }
}

/// Walk both sorted listings together; the first differing path wins.
fn compare_records(
    root: &Path,
    recorded: &IntegrityRecord,
    actual: &IntegrityRecord,
) -> Result<()> {
    let mut rec = recorded.entries().iter().peekable();
    let mut act = actual.entries().iter().peekable();
    loop {
        match (rec.peek(), act.peek()) {
            (None, None) => return Ok(()),
            (Some(r), None) => return Err(mismatch(root, &r.path, &r.digest.to_hex(), ABSENT)),
            (None, Some(a)) => return Err(mismatch(root, &a.path, ABSENT, &a.digest.to_hex())),
            (Some(r), Some(a)) => match r.path.as_bytes().cmp(a.path.as_bytes()) {
                Ordering::Less => {
                    return Err(mismatch(root, &r.path, &r.digest.to_hex(), ABSENT));
                }
                Ordering::Greater => {
                    return Err(mismatch(root, &a.path, ABSENT, &a.digest.to_hex()));
                }
                Ordering::Equal => {
                    if r.digest != a.digest {
                        let (expected, actual) = (r.digest.to_hex(), a.digest.to_hex());
                        return Err(mismatch(root, &r.path, &expected, &actual));
                    }
                    rec.next();
                    act.next();
                }
            },
        }
    }
}

fn mismatch(root: &Path, path: &str, expected: &str, actual: &str) -> PackError {
    METRICS.inc_verify_failures();
    obs::emit_verify_mismatch(root, path, expected, actual);
    PackError::IntegrityMismatch {
        path: path.to_string(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

/// Outcome of [`recompute`].
#[derive(Debug, Clone, Serialize)]
pub struct RecomputeReport {
    pub root_hash: Digest,
    pub files: usize,
    /// Contents of `pack_root_hash.txt` before this call, if any.
    pub previous: Option<Digest>,
    pub written: bool,
    #[serde(skip)]
    pub record: IntegrityRecord,
}

impl RecomputeReport {
    /// `None` when there was no previous root hash to compare against.
    pub fn matches_previous(&self) -> Option<bool> {
        self.previous.as_ref().map(|p| *p == self.root_hash)
    }
}

/// Recompute the listing and root hash of `root`. With `write`, both
/// integrity files are rewritten; otherwise nothing on disk changes.
pub fn recompute(root: &Path, write: bool) -> Result<RecomputeReport> {
    let previous = integrity::read_root_hash(root)?;
    let computed = integrity::compute(root)?;

    if write {
        integrity::write_sums(root, &computed.record)?;
        integrity::write_root_hash(root, &computed.root_hash)?;
    }
    debug!(
        pack_root = %root.display(),
        write,
        root_hash = %computed.root_hash,
        "integrity recomputed"
    );

    Ok(RecomputeReport {
        root_hash: computed.root_hash,
        files: computed.record.len(),
        previous,
        written: write,
        record: computed.record,
    })
}
