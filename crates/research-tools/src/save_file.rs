use research_core::error::AgentError;
use research_core::recorder::Recorder;
use research_core::tool_registry::Tool;
use async_trait::async_trait;

/// The `save_text_to_file` tool: appends the input text to the research log.
///
/// An I/O failure propagates as `Err` and is absorbed into an observation by
/// dispatch, so a failed save never aborts an otherwise-successful run.
pub struct SaveTextTool {
    recorder: Recorder,
}

impl SaveTextTool {
    pub fn new(recorder: Recorder) -> Self {
        Self { recorder }
    }
}

#[async_trait]
impl Tool for SaveTextTool {
    fn name(&self) -> &str {
        "save_text_to_file"
    }

    fn description(&self) -> &str {
        "Saves structured research data to a text file. Input should be the text \
         content to save."
    }

    async fn invoke(&self, input: &str) -> Result<String, AgentError> {
        self.recorder.append(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_core::tool_registry::ToolRegistry;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_save_appends_record() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("research_output.txt");
        let tool = SaveTextTool::new(Recorder::new(&path));

        let status = tool.invoke("the findings").await.unwrap();
        assert!(status.contains("saved to"));

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("--- Research Output ---"));
        assert!(contents.contains("the findings"));
    }

    #[tokio::test]
    async fn test_save_failure_becomes_observation_via_dispatch() {
        let dir = tempfile::TempDir::new().unwrap();
        // The destination is a directory, so the append must fail.
        let tool = SaveTextTool::new(Recorder::new(dir.path()));

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(tool)).unwrap();

        let obs = registry.dispatch("save_text_to_file", "doomed").await;
        assert!(obs.is_error);
        assert!(obs.content.contains("Error:"));
    }
}
