//! Generator configuration: namespace, logical clock, protocol version.
//!
//! Nothing in this crate samples the wall clock. Every timestamp written into
//! a pack is the configured [`LogicalTimestamp`].

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::{PackError, Result};
use crate::ids::DEFAULT_NAMESPACE;

pub const DEFAULT_TIMESTAMP: &str = "2026-01-01T00:00:00Z";
pub const DEFAULT_PROTOCOL_VERSION: &str = "1.0.0";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

fn semver_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(-[0-9A-Za-z.-]+)?(\+[0-9A-Za-z.-]+)?$",
        )
        .expect("semver regex is valid")
    })
}

/// Fixed UTC instant rendered as `YYYY-MM-DDTHH:MM:SSZ`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogicalTimestamp(DateTime<Utc>);

impl LogicalTimestamp {
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for LogicalTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl FromStr for LogicalTimestamp {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self> {
        let naive = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).map_err(|e| {
            PackError::InvalidConfig(format!(
                "timestamp {s:?} is not of the form YYYY-MM-DDTHH:MM:SSZ: {e}"
            ))
        })?;
        Ok(Self(naive.and_utc()))
    }
}

impl Default for LogicalTimestamp {
    fn default() -> Self {
        DEFAULT_TIMESTAMP
            .parse()
            .expect("default timestamp is well-formed")
    }
}

impl Serialize for LogicalTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LogicalTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Per-producer configuration passed into the run model builder.
///
/// Deserialization goes through [`PackConfig::new`], so a config read from
/// disk is always validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPackConfig")]
pub struct PackConfig {
    /// Seed space for every derived identifier.
    pub namespace: Uuid,
    /// The only timestamp ever written into a pack.
    pub fixed_timestamp: LogicalTimestamp,
    pub protocol_version: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPackConfig {
    #[serde(default = "default_namespace")]
    namespace: Uuid,
    #[serde(default)]
    fixed_timestamp: LogicalTimestamp,
    #[serde(default = "default_protocol_version")]
    protocol_version: String,
}

impl TryFrom<RawPackConfig> for PackConfig {
    type Error = PackError;

    fn try_from(raw: RawPackConfig) -> Result<Self> {
        Self::new(raw.namespace, raw.fixed_timestamp, raw.protocol_version)
    }
}

fn default_namespace() -> Uuid {
    DEFAULT_NAMESPACE
}

fn default_protocol_version() -> String {
    DEFAULT_PROTOCOL_VERSION.to_string()
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE,
            fixed_timestamp: LogicalTimestamp::default(),
            protocol_version: default_protocol_version(),
        }
    }
}

impl PackConfig {
    pub fn new(
        namespace: Uuid,
        fixed_timestamp: LogicalTimestamp,
        protocol_version: impl Into<String>,
    ) -> Result<Self> {
        let config = Self {
            namespace,
            fixed_timestamp,
            protocol_version: protocol_version.into(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !semver_re().is_match(&self.protocol_version) {
            return Err(PackError::InvalidConfig(format!(
                "protocol_version {:?} is not a semver string",
                self.protocol_version
            )));
        }
        Ok(())
    }

    pub fn with_namespace(mut self, namespace: Uuid) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn with_timestamp(mut self, timestamp: LogicalTimestamp) -> Self {
        self.fixed_timestamp = timestamp;
        self
    }
}
