//! On-disk record of module invocations.
//!
//! When enabled, every prompt sent to the LLM is written together with its
//! response and the caller's metadata as one JSON file per invocation:
//!
//! ```text
//! logs/
//!   session_2026-03-01T10-15-02-118Z_0000.json
//!   session_2026-03-01T10-15-09-540Z_0001.json
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// One (prompt, response, metadata) triple.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionEntry {
    pub timestamp: String,
    pub model: String,
    pub metadata: serde_json::Value,
    pub prompt: String,
    pub response: String,
}

/// Sink for invocation records. Failures are reported to the caller, which
/// decides whether they matter.
pub trait SessionLog: Send + Sync {
    fn record(&self, entry: &SessionEntry) -> std::io::Result<()>;
}

/// Writes each entry to its own file under a directory.
#[derive(Debug)]
pub struct FileSessionLog {
    dir: PathBuf,
    counter: AtomicU64,
}

impl FileSessionLog {
    /// The directory is created lazily on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn next_path(&self) -> PathBuf {
        let ts = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ");
        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!("session_{ts}_{count:04}.json"))
    }
}

impl SessionLog for FileSessionLog {
    /// Atomic write: serialize to a temp file, then rename into place.
    fn record(&self, entry: &SessionEntry) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.next_path();
        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(entry)?;
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &path)?;
        tracing::trace!("Session logged to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(prompt: &str) -> SessionEntry {
        SessionEntry {
            timestamp: crate::now_rfc3339(),
            model: "openai/gpt-4".into(),
            metadata: serde_json::json!({"module": "foundational_research"}),
            prompt: prompt.into(),
            response: "ok".into(),
        }
    }

    fn json_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().is_some_and(|e| e == "json"))
            .collect();
        files.sort();
        files
    }

    #[test]
    fn writes_one_file_per_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let log = FileSessionLog::new(tmp.path().join("logs"));
        log.record(&entry("first")).unwrap();
        log.record(&entry("second")).unwrap();

        let files = json_files(log.dir());
        assert_eq!(files.len(), 2);
        let name = files[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("session_"));
        assert!(!name.contains(':'));

        let text = std::fs::read_to_string(&files[0]).unwrap();
        let parsed: SessionEntry = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.prompt, "first");
        assert_eq!(parsed.metadata["module"], "foundational_research");
    }

    #[test]
    fn no_temp_files_remain() {
        let tmp = tempfile::tempdir().unwrap();
        let log = FileSessionLog::new(tmp.path());
        log.record(&entry("p")).unwrap();
        let leftovers = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn unwritable_dir_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let log = FileSessionLog::new(blocker.join("logs"));
        assert!(log.record(&entry("p")).is_err());
    }
}
