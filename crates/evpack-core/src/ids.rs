//! Deterministic identifier derivation.
//!
//! Every identifier written into a pack is an RFC-4122 version 5 UUID of a
//! logical name under a fixed namespace, so regenerating a pack on another
//! machine (or another day) yields the same bytes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace used by the reference `gf-01` producers.
pub const DEFAULT_NAMESPACE: Uuid = Uuid::from_u128(0x12345678_1234_5678_1234_567812345678);

/// Derive the v5 UUID of `name` under `namespace`.
///
/// # Panics
///
/// Panics if `name` is empty. Callers build names from scenario ids and
/// fixed suffixes, so an empty name is a programming error.
pub fn derive(namespace: &Uuid, name: &str) -> Uuid {
    assert!(!name.is_empty(), "deterministic id name must not be empty");
    Uuid::new_v5(namespace, name.as_bytes())
}

/// Id generator bound to one namespace and one name prefix.
///
/// `IdGenerator::new(ns, "gf-01").id("context")` derives the name
/// `gf-01-context`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdGenerator {
    namespace: Uuid,
    seed: String,
}

impl IdGenerator {
    pub fn new(namespace: Uuid, seed: impl Into<String>) -> Self {
        Self {
            namespace,
            seed: seed.into(),
        }
    }

    pub fn namespace(&self) -> &Uuid {
        &self.namespace
    }

    /// Derive the id for `<seed>-<suffix>`.
    pub fn id(&self, suffix: &str) -> Uuid {
        derive(&self.namespace, &format!("{}-{}", self.seed, suffix))
    }

    /// Same as [`IdGenerator::id`], hyphenated lowercase.
    pub fn id_string(&self, suffix: &str) -> String {
        self.id(suffix).hyphenated().to_string()
    }
}
