use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tool as advertised to the model: a unique name plus the description the
/// model uses to decide applicability. The invoke capability itself lives
/// behind the `Tool` trait in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Correlation id for replaying the exchange back to the model.
    pub call_id: String,
    pub tool_name: String,
    pub tool_input: String,
}

impl ActionRequest {
    pub fn new(tool_name: impl Into<String>, tool_input: impl Into<String>) -> Self {
        Self {
            call_id: Uuid::new_v4().to_string(),
            tool_name: tool_name.into(),
            tool_input: tool_input.into(),
        }
    }

    pub fn with_call_id(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        tool_input: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            tool_input: tool_input.into(),
        }
    }
}

/// One executed (or synthesized) step of a run: the requested action paired
/// with the observation that came back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action: ActionRequest,
    pub observation: String,
    pub is_error: bool,
}

/// What the model capability decided to do next.
#[derive(Debug, Clone)]
pub enum ModelStep {
    /// The model is done and this is its answer.
    Final(String),
    /// The model wants a tool executed before it answers.
    Action(ActionRequest),
}

/// Terminal output of a research run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRun {
    pub question: String,
    pub answer: String,
    /// True when the run terminated on budget exhaustion rather than a
    /// model-emitted final answer.
    pub degraded: bool,
    pub iterations_used: usize,
    pub history: Vec<ActionResult>,
    pub finished_at: DateTime<Utc>,
}

/// Streaming event emitted while a run executes.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// The agent is dispatching a tool.
    ActionStart {
        call_id: String,
        tool_name: String,
        tool_input: String,
    },
    /// A tool dispatch (or synthesized step) completed.
    Observation(ActionResult),
    /// The run finished, successfully or degraded.
    Done(ResearchRun),
    /// The run failed fatally.
    Error(String),
}
