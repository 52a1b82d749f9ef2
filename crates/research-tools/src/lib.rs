pub mod save_file;
pub mod web_search;
pub mod wikipedia;

use research_core::config::AppConfig;
use research_core::error::AgentError;
use research_core::recorder::Recorder;
use research_core::tool_registry::ToolRegistry;
use std::sync::Arc;

/// Register all built-in research tools into the registry.
pub fn register_all(registry: &mut ToolRegistry, config: &AppConfig) -> Result<(), AgentError> {
    let wikipedia = wikipedia::WikipediaClient::new(&config.wikipedia);
    let search = web_search::SearchClient::new(&config.search);

    registry.register(Arc::new(web_search::WebSearchTool::new(
        search,
        wikipedia.clone(),
    )))?;
    registry.register(Arc::new(wikipedia::WikipediaTool::new(wikipedia)))?;
    registry.register(Arc::new(save_file::SaveTextTool::new(Recorder::new(
        config.output.log_path.clone(),
    ))))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all_assembles_three_tools() {
        let mut registry = ToolRegistry::new();
        register_all(&mut registry, &AppConfig::default()).unwrap();

        assert_eq!(
            registry.names(),
            vec!["web_search", "wikipedia", "save_text_to_file"]
        );
    }
}
