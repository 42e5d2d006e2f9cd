//! Integrity digests over a pack tree.
//!
//! Every regular file under the pack root, except the two self-referential
//! integrity files, is hashed with SHA-256. The `(path, digest)` pairs are
//! sorted by byte-wise path order and serialized as
//!
//! ```text
//! <64 hex chars>  <relative/path>\n
//! ```
//!
//! into `integrity/sha256sums.txt`. The pack root hash is the SHA-256 of
//! that listing. Directory-walk order, mtimes and permissions never reach
//! the hash.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest as Sha2Digest, Sha256};
use tracing::{debug, warn};

use crate::canonical::write_atomic;
use crate::error::{PackError, Result};
use crate::metrics::METRICS;

pub const SUMS_PATH: &str = "integrity/sha256sums.txt";
pub const ROOT_HASH_PATH: &str = "pack_root_hash.txt";

const EXCLUDED: [&str; 2] = [SUMS_PATH, ROOT_HASH_PATH];
const READ_ATTEMPTS: usize = 3;

/// SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
    pub fn compute(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hash);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex().chars().take(12).collect::<String>())
    }
}

impl FromStr for Digest {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|_| PackError::InvalidDigest(s.to_string()))?;
        if bytes.len() != 32 {
            return Err(PackError::InvalidDigest(s.to_string()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One line of the sums listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityEntry {
    /// Pack-relative path with `/` separators.
    pub path: String,
    pub digest: Digest,
}

/// Sorted per-file digests of a pack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityRecord {
    entries: Vec<IntegrityEntry>,
}

impl IntegrityRecord {
    /// Sort `entries` by byte-wise path order.
    pub fn from_entries(mut entries: Vec<IntegrityEntry>) -> Self {
        entries.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));
        Self { entries }
    }

    pub fn entries(&self) -> &[IntegrityEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&Digest> {
        self.entries
            .iter()
            .find(|e| e.path == path)
            .map(|e| &e.digest)
    }

    /// Render the `sha256sums.txt` body. Empty record renders as `""`.
    pub fn to_sums_text(&self) -> String {
        let mut out = String::with_capacity(self.entries.len() * 96);
        for entry in &self.entries {
            out.push_str(&entry.digest.to_hex());
            out.push_str("  ");
            out.push_str(&entry.path);
            out.push('\n');
        }
        out
    }

    /// SHA-256 of [`IntegrityRecord::to_sums_text`].
    pub fn root_hash(&self) -> Digest {
        Digest::compute(self.to_sums_text().as_bytes())
    }

    /// [`IntegrityRecord::parse`] over raw listing bytes.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| PackError::InvalidDigest(format!("{SUMS_PATH} is not valid UTF-8")))?;
        Self::parse(text)
    }

    /// Parse a `sha256sums.txt` body.
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let (hex, path) = line.split_once("  ").ok_or_else(|| {
                PackError::InvalidDigest(format!(
                    "line {}: expected \"<hex>  <path>\"",
                    lineno + 1
                ))
            })?;
            entries.push(IntegrityEntry {
                path: path.to_string(),
                digest: hex.parse()?,
            });
        }
        Ok(Self::from_entries(entries))
    }
}

/// Result of [`digest`]: the sorted listing and its root hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackDigest {
    pub record: IntegrityRecord,
    pub root_hash: Digest,
}

impl PackDigest {
    fn from_record(record: IntegrityRecord) -> Self {
        let root_hash = record.root_hash();
        Self { record, root_hash }
    }
}

fn invalid_path(path: &Path, reason: &str) -> PackError {
    PackError::io(path, std::io::Error::new(ErrorKind::InvalidInput, reason.to_string()))
}

/// Pack-relative path of `path` with `/` separators.
///
/// Names that are not UTF-8 or that contain a line break cannot be written
/// into the listing unambiguously and are rejected.
fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| invalid_path(path, "path escapes pack root"))?;
    let mut parts = Vec::new();
    for component in rel.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| invalid_path(path, "file name is not valid UTF-8"))?;
        if part.contains(['\n', '\r']) {
            return Err(invalid_path(path, "file name contains a line break"));
        }
        parts.push(part);
    }
    Ok(parts.join("/"))
}

/// All regular files under `dir`, recursively. Symlinks are not followed.
fn walk_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let read_dir = std::fs::read_dir(dir).map_err(|e| PackError::io(dir, e))?;
    for entry in read_dir {
        let entry = entry.map_err(|e| PackError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| PackError::io(&path, e))?;
        if file_type.is_dir() {
            files.extend(walk_files(&path)?);
        } else if file_type.is_file() {
            files.push(path);
        } else {
            debug!(path = %path.display(), "skipping non-regular file");
        }
    }
    Ok(files)
}

/// Files that participate in the digest, as `(relative, absolute)` pairs.
fn hashable_files(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for path in walk_files(root)? {
        let rel = relative_path(root, &path)?;
        if EXCLUDED.contains(&rel.as_str()) {
            continue;
        }
        files.push((rel, path));
    }
    Ok(files)
}

/// Read `path`, retrying only transient failures.
fn read_with_retry(path: &Path) -> Result<Vec<u8>> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match std::fs::read(path) {
            Ok(bytes) => return Ok(bytes),
            Err(e)
                if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock)
                    && attempt < READ_ATTEMPTS =>
            {
                warn!(
                    path = %path.display(),
                    attempt,
                    error = %e,
                    "transient read error, retrying"
                );
            }
            Err(e) => return Err(PackError::io(path, e)),
        }
    }
}

fn hash_file(rel: String, path: &Path) -> Result<IntegrityEntry> {
    let bytes = read_with_retry(path)?;
    METRICS.inc_files_hashed();
    Ok(IntegrityEntry {
        path: rel,
        digest: Digest::compute(&bytes),
    })
}

/// Compute the integrity record and root hash of the tree at `root` without
/// writing anything.
pub fn compute(root: &Path) -> Result<PackDigest> {
    let mut entries = Vec::new();
    for (rel, path) in hashable_files(root)? {
        entries.push(hash_file(rel, &path)?);
    }
    Ok(PackDigest::from_record(IntegrityRecord::from_entries(entries)))
}

/// [`compute`] with per-file hashing spread over the blocking thread pool.
/// The sort happens after every hash has been collected.
pub async fn compute_parallel(root: &Path) -> Result<PackDigest> {
    let files = hashable_files(root)?;
    let tasks = files.into_iter().map(|(rel, path)| {
        tokio::task::spawn_blocking(move || hash_file(rel, &path))
    });

    let joined = futures::future::join_all(tasks).await;
    let mut entries = Vec::with_capacity(joined.len());
    for result in joined {
        let entry = result.map_err(|e| {
            PackError::io(root, std::io::Error::new(ErrorKind::Other, e.to_string()))
        })??;
        entries.push(entry);
    }
    Ok(PackDigest::from_record(IntegrityRecord::from_entries(entries)))
}

/// Compute the digest of `root` and write `integrity/sha256sums.txt`.
pub fn digest(root: &Path) -> Result<PackDigest> {
    let result = compute(root)?;
    write_sums(root, &result.record)?;
    debug!(
        root = %root.display(),
        files = result.record.len(),
        root_hash = %result.root_hash,
        "pack digested"
    );
    Ok(result)
}

pub fn write_sums(root: &Path, record: &IntegrityRecord) -> Result<()> {
    write_atomic(&root.join(SUMS_PATH), record.to_sums_text().as_bytes())
}

/// Persist `hash` to `pack_root_hash.txt` as `<hex>\n`.
pub fn write_root_hash(root: &Path, hash: &Digest) -> Result<()> {
    write_atomic(&root.join(ROOT_HASH_PATH), format!("{}\n", hash.to_hex()).as_bytes())
}

/// Read `pack_root_hash.txt` if present.
pub fn read_root_hash(root: &Path) -> Result<Option<Digest>> {
    let path = root.join(ROOT_HASH_PATH);
    match std::fs::read_to_string(&path) {
        Ok(text) => Ok(Some(text.trim().parse()?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PackError::io(path, e)),
    }
}

/// The stored `integrity/sha256sums.txt` bytes, unparsed.
pub fn read_sums_bytes(root: &Path) -> Result<Vec<u8>> {
    let path = root.join(SUMS_PATH);
    std::fs::read(&path).map_err(|e| PackError::io(&path, e))
}

/// Read and parse `integrity/sha256sums.txt`.
pub fn read_sums(root: &Path) -> Result<IntegrityRecord> {
    IntegrityRecord::parse_bytes(&read_sums_bytes(root)?)
}
