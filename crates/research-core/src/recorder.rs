use crate::error::AgentError;
use chrono::Local;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Appends formatted, timestamped text records to a durable log file.
///
/// Purely additive: prior content is never truncated or rewritten. Each
/// record is written with a single `write_all` on a file opened in append
/// mode, so concurrent writers never interleave partial records.
pub struct Recorder {
    path: PathBuf,
}

impl Recorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and return a human-readable status.
    pub async fn append(&self, body: &str) -> Result<String, AgentError> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let record = format_record(&timestamp, body);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| AgentError::Recorder(format!("create {}: {}", parent.display(), e)))?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| AgentError::Recorder(format!("open {}: {}", self.path.display(), e)))?;
        file.write_all(record.as_bytes())
            .await
            .map_err(|e| AgentError::Recorder(format!("write {}: {}", self.path.display(), e)))?;

        Ok(format!("Data successfully saved to {}", self.path.display()))
    }
}

/// One log record: timestamp header, body, separator footer.
fn format_record(timestamp: &str, body: &str) -> String {
    format!(
        "--- Research Output ---\nTimestamp: {}\n\n{}\n\n{}\n\n",
        timestamp,
        body,
        "=".repeat(50)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_block_format() {
        let record = format_record("2026-08-07 12:00:00", "Paris is the capital of France.");
        assert!(record.starts_with("--- Research Output ---\nTimestamp: 2026-08-07 12:00:00\n\n"));
        assert!(record.contains("Paris is the capital of France.\n\n"));
        assert!(record.ends_with(&format!("{}\n\n", "=".repeat(50))));
    }

    #[tokio::test]
    async fn test_sequential_appends_preserve_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("research_output.txt");
        let recorder = Recorder::new(&path);

        recorder.append("first finding").await.unwrap();
        recorder.append("second finding").await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let first = contents.find("first finding").unwrap();
        let second = contents.find("second finding").unwrap();
        assert!(first < second);
        assert_eq!(contents.matches("--- Research Output ---").count(), 2);
    }

    #[tokio::test]
    async fn test_append_creates_parent_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("log.txt");
        let recorder = Recorder::new(&path);

        let status = recorder.append("finding").await.unwrap();
        assert!(status.contains("saved to"));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_io_failure_surfaces_as_recorder_error() {
        let dir = tempfile::TempDir::new().unwrap();
        // A destination that is a directory cannot be opened for append.
        let recorder = Recorder::new(dir.path());

        let err = recorder.append("finding").await.unwrap_err();
        assert!(matches!(err, AgentError::Recorder(_)));
    }
}
