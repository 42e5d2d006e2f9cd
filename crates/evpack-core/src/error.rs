//! Error taxonomy for evidence-pack generation and verification.

use std::fmt;
use std::path::PathBuf;

/// Phase of [`crate::pack::PackAssembler::assemble`] that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyStep {
    BuildModel,
    WriteArtifacts,
    WriteManifest,
    WriteTimeline,
    Digest,
    WriteRootHash,
}

impl fmt::Display for AssemblyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BuildModel => "build_model",
            Self::WriteArtifacts => "write_artifacts",
            Self::WriteManifest => "write_manifest",
            Self::WriteTimeline => "write_timeline",
            Self::Digest => "digest",
            Self::WriteRootHash => "write_root_hash",
        };
        f.write_str(name)
    }
}

/// Evidence-pack errors.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("scenario {scenario_id} incomplete: no response for key {key:?}")]
    ScenarioIncomplete { scenario_id: String, key: String },

    #[error("invalid scenario {scenario_id}: {reason}")]
    InvalidScenario { scenario_id: String, reason: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("serialization error at {path:?}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("integrity mismatch at {path}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("invalid pack at {path}: {reason}")]
    InvalidPack { path: String, reason: String },

    #[error("invalid digest hex: {0}")]
    InvalidDigest(String),

    #[error("interaction source failed for key {key:?}: {reason}")]
    Interaction { key: String, reason: String },

    #[error("assembly failed during {step}: {source}")]
    Assembly {
        step: AssemblyStep,
        #[source]
        source: Box<PackError>,
    },
}

impl PackError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn serialization(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Serialization {
            path: path.into(),
            source,
        }
    }

    /// The assembly step that failed, if this error came out of the assembler.
    pub fn failed_step(&self) -> Option<AssemblyStep> {
        match self {
            Self::Assembly { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Result type for evidence-pack operations.
pub type Result<T> = std::result::Result<T, PackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_incomplete_display() {
        let err = PackError::ScenarioIncomplete {
            scenario_id: "gf-01".to_string(),
            key: "context.summary".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("gf-01"));
        assert!(msg.contains("context.summary"));
    }

    #[test]
    fn test_integrity_mismatch_display() {
        let err = PackError::IntegrityMismatch {
            path: "pack_root_hash.txt".to_string(),
            expected: "abc123".to_string(),
            actual: "def456".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc123"));
        assert!(msg.contains("def456"));
    }

    #[test]
    fn test_assembly_error_reports_step() {
        let inner = PackError::io(
            "/nope/manifest.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let err = PackError::Assembly {
            step: AssemblyStep::WriteManifest,
            source: Box::new(inner),
        };
        assert_eq!(err.failed_step(), Some(AssemblyStep::WriteManifest));
        assert!(err.to_string().contains("write_manifest"));
        assert!(err.to_string().contains("manifest.json"));
    }
}
