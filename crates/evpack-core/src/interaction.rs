//! Interaction sources: where step and task responses come from.
//!
//! The run model builder never talks to an agent framework directly. It asks
//! an [`InteractionSource`] for the response text stored under a key such as
//! `context.summary` or `plan.step.2`. A [`TableSource`] answers from a fixed
//! table and is the only source that guarantees reproducible packs.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, warn};

use crate::error::{PackError, Result};

/// Capability to resolve a step/task key to its textual response.
///
/// `Ok(None)` means the source has no entry for `key`; the builder turns that
/// into [`PackError::ScenarioIncomplete`].
pub trait InteractionSource {
    fn response(&self, key: &str) -> Result<Option<String>>;

    /// Short label for logs.
    fn describe(&self) -> String;
}

impl<S: InteractionSource + ?Sized> InteractionSource for &S {
    fn response(&self, key: &str) -> Result<Option<String>> {
        (**self).response(key)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Canned responses keyed by step or task name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSource {
    responses: BTreeMap<String, String>,
}

impl TableSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, response: impl Into<String>) -> Self {
        self.insert(key, response);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, response: impl Into<String>) {
        self.responses.insert(key.into(), response.into());
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TableSource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            responses: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<BTreeMap<String, String>> for TableSource {
    fn from(responses: BTreeMap<String, String>) -> Self {
        Self { responses }
    }
}

impl InteractionSource for TableSource {
    fn response(&self, key: &str) -> Result<Option<String>> {
        Ok(self.responses.get(key).cloned())
    }

    fn describe(&self) -> String {
        format!("table({} entries)", self.responses.len())
    }
}

/// Live source backed by an external program, typically a framework driver
/// script. The key is appended as the final argument and trimmed stdout is
/// the response.
///
/// Packs built from this source are only reproducible if the program itself
/// answers deterministically (canned or seeded model output).
#[derive(Debug, Clone)]
pub struct CommandSource {
    program: PathBuf,
    args: Vec<OsString>,
}

impl CommandSource {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        warn!(
            program = %program.display(),
            "command-backed interaction source; pack determinism depends on the program"
        );
        Self {
            program,
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl InteractionSource for CommandSource {
    fn response(&self, key: &str) -> Result<Option<String>> {
        debug!(program = %self.program.display(), key = %key, "querying command source");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(key)
            .output()
            .map_err(|e| PackError::Interaction {
                key: key.to_string(),
                reason: format!("failed to run {}: {e}", self.program.display()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PackError::Interaction {
                key: key.to_string(),
                reason: format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    output.status,
                    stderr.trim()
                ),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Ok(None);
        }
        Ok(Some(text))
    }

    fn describe(&self) -> String {
        format!("command({})", self.program.display())
    }
}
