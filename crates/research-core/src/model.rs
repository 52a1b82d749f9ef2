use crate::config::AppConfig;
use crate::types::{ActionRequest, ActionResult, ModelStep, ToolDescriptor};

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionToolArgs, ChatCompletionToolType, CreateChatCompletionRequestArgs,
    FunctionObjectArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

/// How a model call can fail, from the loop's point of view.
#[derive(Error, Debug)]
pub enum ModelError {
    /// The backend cannot be reached or refused our credentials. Fatal.
    #[error("model backend unavailable: {0}")]
    Unavailable(String),

    /// The reply was interpretable as neither a final answer nor a
    /// well-formed action. Recoverable — the loop feeds it back as an
    /// observation.
    #[error("unparsable model response: {0}")]
    Parse(String),
}

/// The model capability: given the question, the fixed tool descriptor set,
/// and the accumulated history, decide the next step.
///
/// Any concrete backend satisfying this contract is substitutable; the tests
/// script one directly.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn next_step(
        &self,
        question: &str,
        history: &[ActionResult],
        tools: &[ToolDescriptor],
    ) -> Result<ModelStep, ModelError>;
}

/// `ModelClient` backed by any OpenAI-compatible chat-completions endpoint.
pub struct OpenAiModel {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    system_prompt: String,
}

impl OpenAiModel {
    pub fn new(config: &AppConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_base(&config.provider.api_base)
            .with_api_key(
                config
                    .provider
                    .resolve_api_key()
                    .unwrap_or_else(|| "not-needed".to_string()),
            );

        Self {
            client: Client::with_config(openai_config),
            model: config.provider.model.clone(),
            max_tokens: config.provider.max_tokens,
            temperature: config.provider.temperature,
            system_prompt: config.agent.system_prompt.clone(),
        }
    }

    /// Replay the run so far as chat messages: system prompt, the question,
    /// then each action as an assistant tool call paired with its result.
    fn build_messages(
        &self,
        question: &str,
        history: &[ActionResult],
    ) -> Result<Vec<ChatCompletionRequestMessage>, ModelError> {
        let mut messages = Vec::with_capacity(2 + history.len() * 2);

        let sys = ChatCompletionRequestSystemMessageArgs::default()
            .content(self.system_prompt.as_str())
            .build()
            .map_err(|e| ModelError::Unavailable(e.to_string()))?;
        messages.push(ChatCompletionRequestMessage::System(sys));

        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(question)
            .build()
            .map_err(|e| ModelError::Unavailable(e.to_string()))?;
        messages.push(ChatCompletionRequestMessage::User(user));

        for result in history {
            let tool_call = ChatCompletionMessageToolCall {
                id: result.action.call_id.clone(),
                r#type: ChatCompletionToolType::Function,
                function: async_openai::types::FunctionCall {
                    name: result.action.tool_name.clone(),
                    arguments: json!({ "input": result.action.tool_input }).to_string(),
                },
            };
            let assistant = ChatCompletionRequestAssistantMessageArgs::default()
                .tool_calls(vec![tool_call])
                .build()
                .map_err(|e| ModelError::Unavailable(e.to_string()))?;
            messages.push(ChatCompletionRequestMessage::Assistant(assistant));

            let tool_msg = ChatCompletionRequestToolMessageArgs::default()
                .tool_call_id(result.action.call_id.as_str())
                .content(result.observation.as_str())
                .build()
                .map_err(|e| ModelError::Unavailable(e.to_string()))?;
            messages.push(ChatCompletionRequestMessage::Tool(tool_msg));
        }

        Ok(messages)
    }

    /// Advertise each tool as a function taking a single string `input`.
    fn build_tools(
        &self,
        tools: &[ToolDescriptor],
    ) -> Result<Vec<async_openai::types::ChatCompletionTool>, ModelError> {
        tools
            .iter()
            .map(|t| {
                let func = FunctionObjectArgs::default()
                    .name(&t.name)
                    .description(&t.description)
                    .parameters(json!({
                        "type": "object",
                        "properties": {
                            "input": {
                                "type": "string",
                                "description": "The input to pass to the tool"
                            }
                        },
                        "required": ["input"]
                    }))
                    .build()
                    .map_err(|e| ModelError::Unavailable(format!("function '{}': {}", t.name, e)))?;
                ChatCompletionToolArgs::default()
                    .r#type(ChatCompletionToolType::Function)
                    .function(func)
                    .build()
                    .map_err(|e| ModelError::Unavailable(format!("tool '{}': {}", t.name, e)))
            })
            .collect()
    }
}

/// Pull the single string argument out of a function-call arguments payload.
///
/// Accepts `{"input": "..."}` (what we advertise) and a bare JSON string
/// (formatting drift some models exhibit).
fn decode_tool_input(arguments: &str) -> Result<String, ModelError> {
    let value: serde_json::Value = serde_json::from_str(arguments)
        .map_err(|e| ModelError::Parse(format!("tool call arguments are not valid JSON: {}", e)))?;

    if let Some(input) = value.get("input").and_then(|v| v.as_str()) {
        return Ok(input.to_string());
    }
    if let Some(input) = value.as_str() {
        return Ok(input.to_string());
    }
    Err(ModelError::Parse(format!(
        "tool call arguments missing string 'input': {}",
        arguments
    )))
}

#[async_trait]
impl ModelClient for OpenAiModel {
    async fn next_step(
        &self,
        question: &str,
        history: &[ActionResult],
        tools: &[ToolDescriptor],
    ) -> Result<ModelStep, ModelError> {
        let messages = self.build_messages(question, history)?;

        let mut request_builder = CreateChatCompletionRequestArgs::default();
        request_builder
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_completion_tokens(self.max_tokens);

        if !tools.is_empty() {
            request_builder.tools(self.build_tools(tools)?);
        }

        let request = request_builder
            .build()
            .map_err(|e| ModelError::Unavailable(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| ModelError::Unavailable(e.to_string()))?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| ModelError::Parse("no choices in response".into()))?;

        let assistant_msg = &choice.message;

        if let Some(tool_calls) = &assistant_msg.tool_calls {
            // Strictly sequential: take the first call, the next iteration
            // re-plans with its observation in context.
            if let Some(tc) = tool_calls.first() {
                debug!(tool = %tc.function.name, "model requested tool call");
                let input = decode_tool_input(&tc.function.arguments)?;
                return Ok(ModelStep::Action(ActionRequest::with_call_id(
                    tc.id.clone(),
                    tc.function.name.clone(),
                    input,
                )));
            }
        }

        match assistant_msg.content.as_deref() {
            Some(content) if !content.trim().is_empty() => {
                Ok(ModelStep::Final(content.to_string()))
            }
            _ => Err(ModelError::Parse(
                "model returned neither content nor a tool call".into(),
            )),
        }
    }
}
