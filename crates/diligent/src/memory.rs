//! Versioned, append-only artifact memory.
//!
//! Every research session owns one [`Artifact`]. Each successful module run
//! appends an immutable [`Version`]; nothing is ever edited in place. The
//! store lives for the process lifetime only. Callers that need durability
//! snapshot artifacts with [`ArtifactMemory::export_artifact`] and restore
//! them with [`ArtifactMemory::import_artifact`].
//!
//! Invariants held for every stored artifact:
//!
//! - `versions[i].version_number == i + 1`
//! - `current_version` equals the last version number, or 0 when empty
//!
//! A single [`append_version`](ArtifactMemory::append_version) runs under one
//! write lock. Whole chains for the same id are not serialized here; run one
//! chain per session id at a time.

use crate::error::DiligentError;
use crate::json_schema_for;
use crate::router::Mode;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tracing::debug;

// ── Types ──────────────────────────────────────────────────────────

/// Descriptive fields captured when a session starts.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    pub topic: Option<String>,
    pub region: Option<String>,
    pub mode: Mode,
    #[serde(default)]
    pub notes: String,
    pub timestamp: String,
}

impl ArtifactMetadata {
    /// Metadata stamped with the current time.
    pub fn new(mode: Mode, topic: Option<String>, region: Option<String>) -> Self {
        Self {
            topic,
            region,
            mode,
            notes: String::new(),
            timestamp: crate::now_rfc3339(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

/// Lifecycle state of an artifact.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    Active,
    Completed,
}

/// One immutable append, produced by exactly one module run.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    #[schemars(range(min = 1))]
    pub version_number: u32,
    pub module: String,
    pub timestamp: String,
    pub data: serde_json::Value,
}

/// The versioned record of one research session.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: String,
    pub created: String,
    pub metadata: ArtifactMetadata,
    pub versions: Vec<Version>,
    pub current_version: u32,
    pub status: ArtifactStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl Artifact {
    /// Verify the version-numbering invariants.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (i, version) in self.versions.iter().enumerate() {
            let expected = i as u32 + 1;
            if version.version_number != expected {
                return Err(format!(
                    "versions[{i}] has versionNumber {} (expected {expected})",
                    version.version_number
                ));
            }
        }
        let last = self.versions.last().map_or(0, |v| v.version_number);
        if self.current_version != last {
            return Err(format!(
                "currentVersion is {} but the last version is {last}",
                self.current_version
            ));
        }
        Ok(())
    }

    /// `content` of the newest version that carries text content.
    pub fn latest_content(&self) -> Option<&str> {
        self.versions
            .iter()
            .rev()
            .find_map(|v| v.data.get("content").and_then(|c| c.as_str()))
    }
}

/// Row returned by [`ArtifactMemory::list_artifacts`].
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactListing {
    pub id: String,
    pub created: String,
    pub last_modified: Option<String>,
    pub versions: usize,
    pub status: ArtifactStatus,
    pub metadata: ArtifactMetadata,
}

/// Display summary returned by [`ArtifactMemory::get_summary`].
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSummary {
    pub id: String,
    pub topic: Option<String>,
    pub created: String,
    pub last_modified: Option<String>,
    pub total_versions: usize,
    pub modules: Vec<String>,
    pub status: ArtifactStatus,
}

/// JSON Schema of the exported artifact shape.
pub fn artifact_schema() -> serde_json::Value {
    json_schema_for::<Artifact>()
}

/// Generate a unique session id: `rs-<hex millis>-<4 hex counter>`.
pub fn generate_session_id() -> String {
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("rs-{ts:x}-{count:04x}")
}

// ── Store ──────────────────────────────────────────────────────────

/// In-memory artifact store keyed by session id.
#[derive(Debug, Default)]
pub struct ArtifactMemory {
    artifacts: RwLock<HashMap<String, Artifact>>,
}

impl ArtifactMemory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Artifact>> {
        self.artifacts.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Artifact>> {
        self.artifacts.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a fresh artifact, replacing any existing one with the same id.
    pub fn create_artifact(&self, session_id: &str, metadata: ArtifactMetadata) -> Artifact {
        let artifact = Artifact {
            id: session_id.to_string(),
            created: crate::now_rfc3339(),
            metadata,
            versions: Vec::new(),
            current_version: 0,
            status: ArtifactStatus::Active,
            last_modified: None,
        };
        debug!("Created artifact {session_id}");
        self.write()
            .insert(session_id.to_string(), artifact.clone());
        artifact
    }

    /// Append a new version produced by `module`.
    pub fn append_version(
        &self,
        session_id: &str,
        module: &str,
        data: serde_json::Value,
    ) -> Result<Artifact, DiligentError> {
        let mut artifacts = self.write();
        let artifact = artifacts
            .get_mut(session_id)
            .ok_or_else(|| DiligentError::ArtifactNotFound(session_id.to_string()))?;

        let version = Version {
            version_number: artifact.versions.len() as u32 + 1,
            module: module.to_string(),
            timestamp: crate::now_rfc3339(),
            data,
        };
        artifact.current_version = version.version_number;
        artifact.last_modified = Some(version.timestamp.clone());
        debug!(
            "Artifact {session_id}: appended version {} from {module}",
            version.version_number
        );
        artifact.versions.push(version);
        Ok(artifact.clone())
    }

    /// Mark an artifact as completed.
    pub fn mark_completed(&self, session_id: &str) -> Result<Artifact, DiligentError> {
        let mut artifacts = self.write();
        let artifact = artifacts
            .get_mut(session_id)
            .ok_or_else(|| DiligentError::ArtifactNotFound(session_id.to_string()))?;
        artifact.status = ArtifactStatus::Completed;
        artifact.last_modified = Some(crate::now_rfc3339());
        Ok(artifact.clone())
    }

    pub fn get_artifact(&self, session_id: &str) -> Option<Artifact> {
        self.read().get(session_id).cloned()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.read().contains_key(session_id)
    }

    /// Fetch one version by its 1-based number.
    pub fn get_version(&self, session_id: &str, version_number: u32) -> Option<Version> {
        self.read().get(session_id).and_then(|a| {
            a.versions
                .iter()
                .find(|v| v.version_number == version_number)
                .cloned()
        })
    }

    pub fn get_all_versions(&self, session_id: &str) -> Option<Vec<Version>> {
        self.read().get(session_id).map(|a| a.versions.clone())
    }

    /// Text content of the artifact's newest content-bearing version.
    pub fn latest_content(&self, session_id: &str) -> Option<String> {
        self.read()
            .get(session_id)
            .and_then(|a| a.latest_content().map(str::to_string))
    }

    /// Serialize the artifact as pretty-printed JSON.
    pub fn export_artifact(&self, session_id: &str) -> Result<String, DiligentError> {
        let artifacts = self.read();
        let artifact = artifacts
            .get(session_id)
            .ok_or_else(|| DiligentError::ArtifactNotFound(session_id.to_string()))?;
        Ok(serde_json::to_string_pretty(artifact)?)
    }

    /// Parse an exported artifact and store it under its embedded id,
    /// replacing any existing entry. Nothing is stored on failure.
    pub fn import_artifact(&self, text: &str) -> Result<Artifact, DiligentError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        validate_artifact_value(&value)?;
        let artifact: Artifact = serde_json::from_value(value)?;
        artifact
            .check_invariants()
            .map_err(DiligentError::Serialization)?;

        debug!(
            "Imported artifact {} ({} versions)",
            artifact.id,
            artifact.versions.len()
        );
        self.write().insert(artifact.id.clone(), artifact.clone());
        Ok(artifact)
    }

    /// Remove an artifact. Returns whether it existed.
    pub fn delete_artifact(&self, session_id: &str) -> bool {
        self.write().remove(session_id).is_some()
    }

    /// All artifacts, oldest first.
    pub fn list_artifacts(&self) -> Vec<ArtifactListing> {
        let mut listings: Vec<ArtifactListing> = self
            .read()
            .values()
            .map(|a| ArtifactListing {
                id: a.id.clone(),
                created: a.created.clone(),
                last_modified: a.last_modified.clone(),
                versions: a.versions.len(),
                status: a.status,
                metadata: a.metadata.clone(),
            })
            .collect();
        listings.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        listings
    }

    pub fn get_summary(&self, session_id: &str) -> Option<ArtifactSummary> {
        self.read().get(session_id).map(|a| ArtifactSummary {
            id: a.id.clone(),
            topic: a.metadata.topic.clone(),
            created: a.created.clone(),
            last_modified: a.last_modified.clone(),
            total_versions: a.versions.len(),
            modules: a.versions.iter().map(|v| v.module.clone()).collect(),
            status: a.status,
        })
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

/// Check an artifact payload against [`artifact_schema`], reporting every
/// violation with its JSON path.
fn validate_artifact_value(value: &serde_json::Value) -> Result<(), DiligentError> {
    let schema = artifact_schema();
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| DiligentError::Serialization(format!("invalid artifact schema: {e}")))?;

    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| format!("  - {}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(DiligentError::Serialization(format!(
            "artifact payload does not match schema:\n{}",
            errors.join("\n")
        )))
    }
}
