use crate::types::ResearchRun;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One completed run as kept for display and download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub answer: String,
    pub degraded: bool,
}

/// Caller-owned record of completed research runs.
///
/// Each presentation layer constructs its own instance and decides its
/// lifetime; nothing here is process-global.
#[derive(Debug, Clone, Default)]
pub struct ResearchHistory {
    entries: Vec<HistoryEntry>,
}

impl ResearchHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed run, returning the new entry's id.
    pub fn record(&mut self, run: &ResearchRun) -> String {
        let entry = HistoryEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: run.finished_at,
            question: run.question.clone(),
            answer: run.answer.clone(),
            degraded: run.degraded,
        };
        let id = entry.id.clone();
        self.entries.push(entry);
        id
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(question: &str, answer: &str) -> ResearchRun {
        ResearchRun {
            question: question.into(),
            answer: answer.into(),
            degraded: false,
            iterations_used: 1,
            history: Vec::new(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_record_and_lookup() {
        let mut history = ResearchHistory::new();
        let id = history.record(&run("q1", "a1"));
        history.record(&run("q2", "a2"));

        assert_eq!(history.len(), 2);
        assert_eq!(history.get(&id).unwrap().answer, "a1");
        assert_eq!(history.entries()[0].question, "q1");
        assert_eq!(history.entries()[1].question, "q2");
    }

    #[test]
    fn test_clear() {
        let mut history = ResearchHistory::new();
        history.record(&run("q", "a"));
        history.clear();
        assert!(history.is_empty());
    }
}
