use crate::error::AgentError;
use crate::types::ToolDescriptor;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait that all tools must implement. Tools take a single string input and
/// produce a single string observation, mirroring what the model is told.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (used in function calling).
    fn name(&self) -> &str;

    /// Human-readable description the model uses to decide applicability.
    fn description(&self) -> &str;

    /// Execute the tool with the given input.
    async fn invoke(&self, input: &str) -> Result<String, AgentError>;
}

/// The textual result of a dispatch, fed back into the agent's next step.
#[derive(Debug, Clone)]
pub struct Observation {
    pub content: String,
    pub is_error: bool,
}

/// Closed set of tools, fixed once assembly completes.
///
/// Registration order is preserved so the descriptor set advertised to the
/// model is stable across calls.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Duplicate names are rejected at assembly time rather
    /// than shadowing each other at call time.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), AgentError> {
        let name = tool.name().to_string();
        if self.tools.iter().any(|t| t.name() == name) {
            return Err(AgentError::Config(format!(
                "duplicate tool name '{}'",
                name
            )));
        }
        tracing::debug!("Registered tool: {}", name);
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// The descriptor set advertised to the model.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|t| ToolDescriptor {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    /// Execute a named tool against a string input.
    ///
    /// Never returns an error: an unknown name and a failing tool both come
    /// back as error-marked observations, because the calling loop must keep
    /// iterating and the model must be able to recover by re-choosing.
    pub async fn dispatch(&self, name: &str, input: &str) -> Observation {
        let Some(tool) = self.get(name) else {
            return Observation {
                content: format!(
                    "Unknown tool '{}'. Available tools: {}",
                    name,
                    self.names().join(", ")
                ),
                is_error: true,
            };
        };

        match tool.invoke(input).await {
            Ok(content) => Observation {
                content,
                is_error: false,
            },
            Err(e) => Observation {
                content: format!("Error: {}", e),
                is_error: true,
            },
        }
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the input back"
        }

        async fn invoke(&self, input: &str) -> Result<String, AgentError> {
            Ok(format!("echo: {}", input))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        async fn invoke(&self, _input: &str) -> Result<String, AgentError> {
            Err(AgentError::ToolExecution {
                tool_name: "broken".into(),
                message: "backend exploded".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_dispatch_known_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();

        let obs = registry.dispatch("echo", "hello").await;
        assert!(!obs.is_error);
        assert_eq!(obs.content, "echo: hello");
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool_is_recovered() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();

        let obs = registry.dispatch("telepathy", "hello").await;
        assert!(obs.is_error);
        assert!(obs.content.contains("Unknown tool 'telepathy'"));
        assert!(obs.content.contains("echo"));
    }

    #[tokio::test]
    async fn test_dispatch_absorbs_tool_failure() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FailingTool)).unwrap();

        let obs = registry.dispatch("broken", "anything").await;
        assert!(obs.is_error);
        assert!(obs.content.contains("backend exploded"));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        let err = registry.register(Arc::new(EchoTool)).unwrap_err();
        assert!(err.to_string().contains("duplicate tool name 'echo'"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_descriptors_preserve_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FailingTool)).unwrap();
        registry.register(Arc::new(EchoTool)).unwrap();

        let names: Vec<String> = registry
            .descriptors()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["broken", "echo"]);
    }
}
