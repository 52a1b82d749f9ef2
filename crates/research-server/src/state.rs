use research_core::agent_loop::AgentLoop;
use research_core::config::AppConfig;
use research_core::history::ResearchHistory;
use research_core::model::{ModelClient, OpenAiModel};
use research_core::tool_registry::ToolRegistry;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for the server.
///
/// The run history is caller-owned state with server lifetime; each request
/// clones cheap `Arc` handles.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub agent: Arc<AgentLoop>,
    pub history: Arc<RwLock<ResearchHistory>>,
}

impl AppState {
    pub fn new(config: AppConfig, tools: Arc<ToolRegistry>) -> Self {
        let model = Arc::new(OpenAiModel::new(&config));
        Self::with_model(config, model, tools)
    }

    /// Build state around an explicit model capability (used by tests to
    /// substitute a scripted one).
    pub fn with_model(
        config: AppConfig,
        model: Arc<dyn ModelClient>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let agent = Arc::new(AgentLoop::new(model, tools, config.agent.max_iterations));
        Self {
            config,
            agent,
            history: Arc::new(RwLock::new(ResearchHistory::new())),
        }
    }
}
