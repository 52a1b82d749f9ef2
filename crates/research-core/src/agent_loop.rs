use crate::error::AgentError;
use crate::model::{ModelClient, ModelError};
use crate::tool_registry::ToolRegistry;
use crate::types::{ActionRequest, ActionResult, AgentEvent, ModelStep, ResearchRun};

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Pseudo-tool name recorded for synthesized parse-failure steps.
const MALFORMED_RESPONSE: &str = "malformed_response";

/// The orchestration core: alternates model calls and tool dispatches until
/// the model emits a final answer or the iteration budget is exhausted.
pub struct AgentLoop {
    model: Arc<dyn ModelClient>,
    tools: Arc<ToolRegistry>,
    budget: usize,
}

impl AgentLoop {
    pub fn new(model: Arc<dyn ModelClient>, tools: Arc<ToolRegistry>, budget: usize) -> Self {
        Self {
            model,
            tools,
            budget,
        }
    }

    /// The configured iteration budget.
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Run a research question with the configured budget.
    pub async fn run(
        &self,
        question: &str,
        event_tx: mpsc::UnboundedSender<AgentEvent>,
    ) -> Result<ResearchRun, AgentError> {
        self.run_with_budget(question, self.budget, event_tx).await
    }

    /// Run a research question with an explicit budget.
    ///
    /// The budget caps tool dispatches and synthesized parse-failure steps
    /// alike, enforced before every dispatch: once `iterations_used` reaches
    /// it, the run terminates with a degraded answer instead.
    pub async fn run_with_budget(
        &self,
        question: &str,
        budget: usize,
        event_tx: mpsc::UnboundedSender<AgentEvent>,
    ) -> Result<ResearchRun, AgentError> {
        let descriptors = self.tools.descriptors();
        let mut history: Vec<ActionResult> = Vec::new();
        let mut iterations_used = 0usize;

        loop {
            let step = match self
                .model
                .next_step(question, &history, &descriptors)
                .await
            {
                Ok(step) => step,
                Err(ModelError::Unavailable(msg)) => {
                    let _ = event_tx.send(AgentEvent::Error(msg.clone()));
                    return Err(AgentError::AgentUnavailable(msg));
                }
                Err(ModelError::Parse(msg)) => {
                    if iterations_used == budget {
                        return Ok(finish_degraded(
                            question,
                            history,
                            iterations_used,
                            &event_tx,
                        ));
                    }
                    debug!("Recovering from unparsable model response: {}", msg);
                    let result = ActionResult {
                        action: ActionRequest::new(MALFORMED_RESPONSE, ""),
                        observation: format!(
                            "The previous response could not be interpreted as a final \
                             answer or a tool call ({}). Reply with either a tool call \
                             or a final answer.",
                            msg
                        ),
                        is_error: true,
                    };
                    let _ = event_tx.send(AgentEvent::Observation(result.clone()));
                    history.push(result);
                    iterations_used += 1;
                    continue;
                }
            };

            match step {
                ModelStep::Final(answer) => {
                    let run = ResearchRun {
                        question: question.to_string(),
                        answer,
                        degraded: false,
                        iterations_used,
                        history,
                        finished_at: Utc::now(),
                    };
                    let _ = event_tx.send(AgentEvent::Done(run.clone()));
                    return Ok(run);
                }
                ModelStep::Action(action) => {
                    // Hard ceiling, checked before the dispatch rather than after.
                    if iterations_used == budget {
                        warn!(
                            "Iteration budget ({}) exhausted, forcing termination",
                            budget
                        );
                        return Ok(finish_degraded(
                            question,
                            history,
                            iterations_used,
                            &event_tx,
                        ));
                    }

                    let _ = event_tx.send(AgentEvent::ActionStart {
                        call_id: action.call_id.clone(),
                        tool_name: action.tool_name.clone(),
                        tool_input: action.tool_input.clone(),
                    });

                    let observation = self
                        .tools
                        .dispatch(&action.tool_name, &action.tool_input)
                        .await;
                    let result = ActionResult {
                        action,
                        observation: observation.content,
                        is_error: observation.is_error,
                    };
                    let _ = event_tx.send(AgentEvent::Observation(result.clone()));
                    history.push(result);
                    iterations_used += 1;
                }
            }
        }
    }
}

/// Build the degraded run returned on budget exhaustion: an explicit marker
/// plus the most recent useful observation, never silently empty.
fn finish_degraded(
    question: &str,
    history: Vec<ActionResult>,
    iterations_used: usize,
    event_tx: &mpsc::UnboundedSender<AgentEvent>,
) -> ResearchRun {
    let mut answer = String::from(
        "Research incomplete: iteration budget exhausted before the agent \
         produced a final answer.",
    );
    let partial = history
        .iter()
        .rev()
        .find(|r| !r.is_error)
        .or_else(|| history.last());
    if let Some(result) = partial {
        answer.push_str("\n\nMost recent observation:\n");
        answer.push_str(&result.observation);
    }

    let run = ResearchRun {
        question: question.to_string(),
        answer,
        degraded: true,
        iterations_used,
        history,
        finished_at: Utc::now(),
    };
    let _ = event_tx.send(AgentEvent::Done(run.clone()));
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool_registry::Tool;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Model capability that replays a fixed script of steps.
    struct ScriptedModel {
        steps: Mutex<VecDeque<Result<ModelStep, ModelError>>>,
    }

    impl ScriptedModel {
        fn new(steps: Vec<Result<ModelStep, ModelError>>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
            }
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedModel {
        async fn next_step(
            &self,
            _question: &str,
            _history: &[ActionResult],
            _tools: &[crate::types::ToolDescriptor],
        ) -> Result<ModelStep, ModelError> {
            self.steps
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted model ran out of steps")
        }
    }

    /// Model capability that never emits a final answer.
    struct AlwaysActs;

    #[async_trait]
    impl ModelClient for AlwaysActs {
        async fn next_step(
            &self,
            _question: &str,
            _history: &[ActionResult],
            _tools: &[crate::types::ToolDescriptor],
        ) -> Result<ModelStep, ModelError> {
            Ok(ModelStep::Action(ActionRequest::new("counter", "again")))
        }
    }

    /// Model capability that never produces a well-formed step.
    struct AlwaysGarbles;

    #[async_trait]
    impl ModelClient for AlwaysGarbles {
        async fn next_step(
            &self,
            _question: &str,
            _history: &[ActionResult],
            _tools: &[crate::types::ToolDescriptor],
        ) -> Result<ModelStep, ModelError> {
            Err(ModelError::Parse("free-form rambling".into()))
        }
    }

    struct CountingTool {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            "counter"
        }

        fn description(&self) -> &str {
            "Counts invocations"
        }

        async fn invoke(&self, _input: &str) -> Result<String, AgentError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("call #{}", n))
        }
    }

    struct FakeWikipedia;

    #[async_trait]
    impl Tool for FakeWikipedia {
        fn name(&self) -> &str {
            "wikipedia"
        }

        fn description(&self) -> &str {
            "Encyclopedic lookup"
        }

        async fn invoke(&self, _input: &str) -> Result<String, AgentError> {
            Ok("Paris is the capital of France and its most populous city.".into())
        }
    }

    fn registry_with(tools: Vec<Arc<dyn Tool>>) -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool).unwrap();
        }
        Arc::new(registry)
    }

    fn channel() -> (
        mpsc::UnboundedSender<AgentEvent>,
        mpsc::UnboundedReceiver<AgentEvent>,
    ) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn test_round_trip_question() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ModelStep::Action(ActionRequest::new(
                "wikipedia",
                "capital of France",
            ))),
            Ok(ModelStep::Final("The capital of France is Paris.".into())),
        ]));
        let tools = registry_with(vec![Arc::new(FakeWikipedia)]);
        let agent = AgentLoop::new(model, tools, 10);

        let (tx, _rx) = channel();
        let run = agent.run("capital of France", tx).await.unwrap();

        assert_eq!(run.answer, "The capital of France is Paris.");
        assert!(!run.degraded);
        assert_eq!(run.iterations_used, 1);
        assert_eq!(run.history.len(), 1);
        assert_eq!(run.history[0].action.tool_name, "wikipedia");
        assert!(run.history[0].observation.contains("Paris"));
    }

    #[tokio::test]
    async fn test_budget_exhaustion_caps_dispatches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let tools = registry_with(vec![Arc::new(CountingTool {
            calls: calls.clone(),
        })]);
        let agent = AgentLoop::new(Arc::new(AlwaysActs), tools, 2);

        let (tx, _rx) = channel();
        let run = agent.run("never finishes", tx).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(run.degraded);
        assert_eq!(run.iterations_used, 2);
        assert!(run.answer.contains("budget exhausted"), "got: {}", run.answer);
        assert!(run.answer.contains("call #2"));
    }

    #[tokio::test]
    async fn test_zero_budget_never_dispatches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let tools = registry_with(vec![Arc::new(CountingTool {
            calls: calls.clone(),
        })]);
        let agent = AgentLoop::new(Arc::new(AlwaysActs), tools, 0);

        let (tx, _rx) = channel();
        let run = agent.run("never starts", tx).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(run.degraded);
        assert_eq!(run.iterations_used, 0);
        assert!(run.history.is_empty());
        assert!(run.answer.contains("budget exhausted"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_recovered_and_run_continues() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ModelStep::Action(ActionRequest::new("telepathy", "hmm"))),
            Ok(ModelStep::Final("done anyway".into())),
        ]));
        let tools = registry_with(vec![Arc::new(FakeWikipedia)]);
        let agent = AgentLoop::new(model, tools, 10);

        let (tx, _rx) = channel();
        let run = agent.run("q", tx).await.unwrap();

        assert_eq!(run.answer, "done anyway");
        assert_eq!(run.history.len(), 1);
        assert!(run.history[0].is_error);
        assert!(run.history[0].observation.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_parse_failure_synthesized_into_history() {
        let model = Arc::new(ScriptedModel::new(vec![
            Err(ModelError::Parse("not a tool call".into())),
            Ok(ModelStep::Final("recovered".into())),
        ]));
        let tools = registry_with(vec![Arc::new(FakeWikipedia)]);
        let agent = AgentLoop::new(model, tools, 10);

        let (tx, _rx) = channel();
        let run = agent.run("q", tx).await.unwrap();

        assert_eq!(run.answer, "recovered");
        assert_eq!(run.iterations_used, 1);
        assert_eq!(run.history.len(), 1);
        assert_eq!(run.history[0].action.tool_name, MALFORMED_RESPONSE);
        assert!(run.history[0].observation.contains("not a tool call"));
    }

    #[tokio::test]
    async fn test_permanent_parse_failure_is_bounded_by_budget() {
        let tools = registry_with(vec![Arc::new(FakeWikipedia)]);
        let agent = AgentLoop::new(Arc::new(AlwaysGarbles), tools, 3);

        let (tx, _rx) = channel();
        let run = agent.run("q", tx).await.unwrap();

        assert!(run.degraded);
        assert_eq!(run.iterations_used, 3);
        assert_eq!(run.history.len(), 3);
    }

    #[tokio::test]
    async fn test_unavailable_model_fails_before_any_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let tools = registry_with(vec![Arc::new(CountingTool {
            calls: calls.clone(),
        })]);
        let model = Arc::new(ScriptedModel::new(vec![Err(ModelError::Unavailable(
            "401 invalid api key".into(),
        ))]));
        let agent = AgentLoop::new(model, tools, 10);

        let (tx, _rx) = channel();
        let err = agent.run("q", tx).await.unwrap_err();

        assert!(matches!(err, AgentError::AgentUnavailable(_)));
        assert!(err.to_string().contains("invalid api key"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_event_stream_order() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ModelStep::Action(ActionRequest::new(
                "wikipedia",
                "capital of France",
            ))),
            Ok(ModelStep::Final("Paris.".into())),
        ]));
        let tools = registry_with(vec![Arc::new(FakeWikipedia)]);
        let agent = AgentLoop::new(model, tools, 10);

        let (tx, mut rx) = channel();
        agent.run("capital of France", tx).await.unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], AgentEvent::ActionStart { .. }));
        assert!(matches!(events[1], AgentEvent::Observation(_)));
        assert!(matches!(events[2], AgentEvent::Done(_)));
    }
}
