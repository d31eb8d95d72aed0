//! Action dispatcher
//!
//! One dispatch handles one inbound message against one action:
//!
//! 1. resolve state (compose if absent, then refresh the recent-message window)
//! 2. validate
//! 3. extract parameters
//! 4. run interceptors, then invoke the tool exactly once
//! 5. compose a success or error context, generate text, relay
//!
//! Eligible dispatches invoke the callback exactly once. Generation failures
//! never escape: a failed success reply falls back to the result summary and a
//! failed error reply falls back to a fixed sentence.

use crate::actions::composer::{
    TemplateKind, ACTION_DESCRIPTION, ACTION_ERROR, ACTION_NAME, ACTION_RESULT,
};
use crate::actions::descriptor::{Action, ExtractionContext};
use crate::actions::relay::{emit, ActionResult, HandlerCallback};
use crate::interceptors::{InterceptorDecision, ToolCallContext, ToolInterceptor};
use crate::runtime::{fallback_state, AgentRuntime, Memory, ModelClass};
use crate::state::State;
use crate::tools::ActionContent;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Default, Clone)]
pub struct Dispatcher {
    interceptors: Vec<Arc<dyn ToolInterceptor>>,
    tool_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interceptor; they run in insertion order
    pub fn with_interceptor(mut self, interceptor: impl ToolInterceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Bound the tool invocation step
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    pub fn interceptor_count(&self) -> usize {
        self.interceptors.len()
    }

    /// Dispatch and report whether the action ran successfully.
    ///
    /// Returns `false` without touching the callback when the validator
    /// rejects the message.
    pub async fn dispatch(
        &self,
        action: &Action,
        runtime: &dyn AgentRuntime,
        message: &Memory,
        state: Option<State>,
        callback: Option<&HandlerCallback>,
    ) -> bool {
        self.run(action, runtime, message, state, callback)
            .await
            .is_some_and(|result| result.success)
    }

    /// Like [`Dispatcher::dispatch`] but returns the full result, or `None`
    /// when the action was not eligible.
    pub async fn run(
        &self,
        action: &Action,
        runtime: &dyn AgentRuntime,
        message: &Memory,
        state: Option<State>,
        callback: Option<&HandlerCallback>,
    ) -> Option<ActionResult> {
        let name = action.name();
        let state = resolve_state(runtime, message, state).await;

        if !action.descriptor.validate(runtime, message, &state) {
            info!(action = name, message_id = %message.id, "Action not eligible for message");
            return None;
        }

        let invocation_context = action.templates.compose(
            TemplateKind::Invocation,
            &state,
            &[
                (ACTION_NAME, name),
                (ACTION_DESCRIPTION, &action.descriptor.description),
            ],
        );

        let result = match self
            .execute(action, runtime, message, &state, &invocation_context)
            .await
        {
            Ok(content) => succeed(action, runtime, state, content).await,
            Err(e) => fail(action, runtime, &state, e).await,
        };

        emit(callback, result.response());
        Some(result)
    }

    /// Steps 3 and 4
    async fn execute(
        &self,
        action: &Action,
        runtime: &dyn AgentRuntime,
        message: &Memory,
        state: &State,
        invocation_context: &str,
    ) -> Result<ActionContent> {
        let ctx = ExtractionContext {
            runtime,
            message,
            state,
            invocation_context,
        };
        let call = action.handler.extract(&ctx).await?;
        debug!(action = action.name(), ?call, "Extracted tool call");

        let call_ctx = ToolCallContext {
            action: action.name().to_string(),
            call,
            message_id: message.id,
        };

        for (admitted, interceptor) in self.interceptors.iter().enumerate() {
            let refusal = match interceptor.intercept_tool_call(&call_ctx).await {
                Ok(InterceptorDecision::Allow) => continue,
                Ok(InterceptorDecision::Block(reason)) => Error::Blocked(reason),
                Err(e) => e,
            };
            for earlier in &self.interceptors[..admitted] {
                earlier.on_tool_call_blocked(&call_ctx).await;
            }
            return Err(refusal);
        }

        let started = Instant::now();
        let invocation = action.handler.invoke(&call_ctx.call);
        // A timed-out call may already have taken effect
        let result = match self.tool_timeout {
            Some(limit) => tokio::time::timeout(limit, invocation)
                .await
                .unwrap_or_else(|_| {
                    Err(Error::OutcomeUnknown(format!(
                        "{} timed out after {}ms",
                        action.name(),
                        limit.as_millis()
                    )))
                }),
            None => invocation.await,
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        for interceptor in &self.interceptors {
            interceptor
                .on_tool_call_complete(&call_ctx, &result, duration_ms)
                .await;
        }

        result
    }
}

async fn resolve_state(
    runtime: &dyn AgentRuntime,
    message: &Memory,
    state: Option<State>,
) -> State {
    let state = match state {
        Some(state) => state,
        None => match runtime.compose_state(message).await {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Failed to compose state, using message-only state");
                fallback_state(message)
            }
        },
    };

    match runtime
        .update_recent_message_state(message, state.clone())
        .await
    {
        Ok(state) => state,
        Err(e) => {
            warn!(error = %e, "Failed to refresh recent messages");
            state
        }
    }
}

async fn succeed(
    action: &Action,
    runtime: &dyn AgentRuntime,
    mut state: State,
    content: ActionContent,
) -> ActionResult {
    let name = action.name();
    state.extend(content.state_entries());

    let serialized = serde_json::to_string(&content).unwrap_or_else(|_| content.summary());
    let context = action
        .templates
        .compose(TemplateKind::Success, &state, &[(ACTION_RESULT, &serialized)]);

    let text = match runtime.generate_text(&context, ModelClass::Small).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            error!(action = name, "Generated an empty success reply, relaying result summary");
            content.summary()
        }
        Err(e) => {
            error!(
                action = name,
                error = %e,
                "Success reply generation failed, relaying result summary"
            );
            content.summary()
        }
    };

    info!(action = name, "Action succeeded");
    ActionResult::succeeded(text, content)
}

async fn fail(
    action: &Action,
    runtime: &dyn AgentRuntime,
    state: &State,
    e: Error,
) -> ActionResult {
    let name = action.name();
    let message = e.to_string();
    warn!(action = name, error = %message, "Action failed");

    let context = action
        .templates
        .compose(TemplateKind::Error, state, &[(ACTION_ERROR, &message)]);

    let text = match runtime.generate_text(&context, ModelClass::Small).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => fallback_error_text(&message),
        Err(generation) => {
            error!(action = name, error = %generation, "Error reply generation failed");
            fallback_error_text(&message)
        }
    };

    ActionResult::failed(text, message)
}

fn fallback_error_text(error: &str) -> String {
    format!("Sorry, I couldn't complete that request. The error was: {}", error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::composer::Templates;
    use crate::actions::descriptor::{validator, ActionDescriptor, ActionHandler};
    use crate::actions::relay::ResponseContent;
    use crate::state::keys;
    use crate::testing::{capture, ScriptedRuntime};
    use crate::tools::{SearchOutcome, SearchRequest, ToolCall};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Search-shaped handler with scripted outcomes and call counters
    #[derive(Default)]
    struct FakeHandler {
        extract_error: Option<String>,
        invoke_error: Option<String>,
        invoke_delay: Option<Duration>,
        extracts: AtomicUsize,
        invokes: AtomicUsize,
    }

    #[async_trait]
    impl ActionHandler for FakeHandler {
        async fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<ToolCall> {
            self.extracts.fetch_add(1, Ordering::SeqCst);
            match &self.extract_error {
                Some(e) => Err(Error::ParameterExtraction(e.clone())),
                None => Ok(ToolCall::Search(SearchRequest {
                    query: ctx.message.text().to_string(),
                })),
            }
        }

        async fn invoke(&self, call: &ToolCall) -> Result<ActionContent> {
            self.invokes.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.invoke_delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(e) = &self.invoke_error {
                return Err(Error::ToolInvocation(e.clone()));
            }
            let ToolCall::Search(request) = call else {
                return Err(Error::ToolInvocation("unexpected call".into()));
            };
            Ok(ActionContent::Search(SearchOutcome {
                query: request.query.clone(),
                answer: Some("Rust is fast".into()),
                results: Vec::new(),
            }))
        }
    }

    fn action_with(handler: Arc<FakeHandler>, templates: Templates) -> Action {
        Action {
            descriptor: Arc::new(ActionDescriptor::new("SEARCH_WEB", "Search the web")),
            handler,
            templates: Arc::new(templates),
        }
    }

    fn message(text: &str) -> Memory {
        Memory::new("alice", "Coach", "room", text)
    }

    struct Blocker;

    #[async_trait]
    impl ToolInterceptor for Blocker {
        async fn intercept_tool_call(&self, _: &ToolCallContext) -> Result<InterceptorDecision> {
            Ok(InterceptorDecision::Block("not today".into()))
        }

        async fn on_tool_call_blocked(&self, _: &ToolCallContext) {
            panic!("the refusing interceptor is not told about its own block");
        }
    }

    /// Allows everything and counts released and settled calls
    #[derive(Default)]
    struct Admitter {
        released: Arc<AtomicUsize>,
        settled: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ToolInterceptor for Admitter {
        async fn intercept_tool_call(&self, _: &ToolCallContext) -> Result<InterceptorDecision> {
            Ok(InterceptorDecision::Allow)
        }

        async fn on_tool_call_complete(
            &self,
            _: &ToolCallContext,
            _: &Result<ActionContent>,
            _: u64,
        ) {
            self.settled.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_tool_call_blocked(&self, _: &ToolCallContext) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn success_relays_generated_text_once() {
        let handler = Arc::new(FakeHandler::default());
        let templates = Templates {
            success: "{{searchQuery}}|{{actionResult}}".to_string(),
            ..Templates::default()
        };
        let action = action_with(handler.clone(), templates);
        let runtime = ScriptedRuntime::new().with_reply("Here is what I found.");
        let (callback, seen) = capture();

        let ok = Dispatcher::new()
            .dispatch(&action, &runtime, &message("rust"), None, Some(&callback))
            .await;

        assert!(ok);
        assert_eq!(handler.invokes.load(Ordering::SeqCst), 1);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].text, "Here is what I found.");
        assert!(seen[0].error().is_none());
        assert!(matches!(seen[0].content, ResponseContent::Success(ActionContent::Search(_))));

        // Result entries were merged into state before the success context
        let prompts = runtime.prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].1, ModelClass::Small);
        assert!(prompts[0].0.starts_with("rust|{\"kind\":\"search\""));
    }

    #[tokio::test]
    async fn extraction_failure_never_invokes_tool() {
        let handler = Arc::new(FakeHandler {
            extract_error: Some("No valid wallet address found in the message".into()),
            ..Default::default()
        });
        let action = action_with(handler.clone(), Templates::default());
        let runtime = ScriptedRuntime::new().with_reply("Could you share your address?");
        let (callback, seen) = capture();

        let ok = Dispatcher::new()
            .dispatch(&action, &runtime, &message("hi"), None, Some(&callback))
            .await;

        assert!(!ok);
        assert_eq!(handler.invokes.load(Ordering::SeqCst), 0);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].text, "Could you share your address?");
        assert_eq!(
            seen[0].error(),
            Some("No valid wallet address found in the message")
        );
        assert!(runtime.prompts()[0]
            .0
            .contains("The error was:\nNo valid wallet address found in the message"));
    }

    #[tokio::test]
    async fn invocation_failure_takes_error_path() {
        let handler = Arc::new(FakeHandler {
            invoke_error: Some("rate limited".into()),
            ..Default::default()
        });
        let action = action_with(handler.clone(), Templates::default());
        let runtime = ScriptedRuntime::new().with_reply("The search service is busy.");
        let (callback, seen) = capture();

        let ok = Dispatcher::new()
            .dispatch(&action, &runtime, &message("rust"), None, Some(&callback))
            .await;

        assert!(!ok);
        assert_eq!(handler.invokes.load(Ordering::SeqCst), 1);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].error(), Some("Tool invocation failed: rate limited"));
    }

    #[tokio::test]
    async fn success_generation_failure_relays_summary() {
        let handler = Arc::new(FakeHandler::default());
        let action = action_with(handler, Templates::default());
        let runtime = ScriptedRuntime::new().with_failure("model offline");
        let (callback, seen) = capture();

        let ok = Dispatcher::new()
            .dispatch(&action, &runtime, &message("rust"), None, Some(&callback))
            .await;

        assert!(ok);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].text.starts_with("Here are the latest updates about rust:"));
    }

    #[tokio::test]
    async fn error_generation_failure_relays_fixed_sentence() {
        let handler = Arc::new(FakeHandler {
            invoke_error: Some("boom".into()),
            ..Default::default()
        });
        let action = action_with(handler, Templates::default());
        let runtime = ScriptedRuntime::new().with_failure("model offline");
        let (callback, seen) = capture();

        let ok = Dispatcher::new()
            .dispatch(&action, &runtime, &message("rust"), None, Some(&callback))
            .await;

        assert!(!ok);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].text,
            "Sorry, I couldn't complete that request. The error was: Tool invocation failed: boom"
        );
    }

    #[tokio::test]
    async fn ineligible_action_skips_callback() {
        let handler = Arc::new(FakeHandler::default());
        let mut action = action_with(handler.clone(), Templates::default());
        action.descriptor = Arc::new(
            ActionDescriptor::new("SEARCH_WEB", "Search")
                .with_validator(validator(|_, _, _| false)),
        );
        let runtime = ScriptedRuntime::new();
        let (callback, seen) = capture();

        let ok = Dispatcher::new()
            .dispatch(&action, &runtime, &message("rust"), None, Some(&callback))
            .await;

        assert!(!ok);
        assert_eq!(handler.extracts.load(Ordering::SeqCst), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blocked_call_never_reaches_tool() {
        let handler = Arc::new(FakeHandler::default());
        let action = action_with(handler.clone(), Templates::default());
        let runtime = ScriptedRuntime::new().with_reply("I can't do that right now.");
        let (callback, seen) = capture();

        let ok = Dispatcher::new()
            .with_interceptor(Blocker)
            .dispatch(&action, &runtime, &message("rust"), None, Some(&callback))
            .await;

        assert!(!ok);
        assert_eq!(handler.invokes.load(Ordering::SeqCst), 0);
        assert_eq!(seen.lock().unwrap()[0].error(), Some("Blocked: not today"));
    }

    #[tokio::test]
    async fn block_releases_earlier_interceptors_only() {
        let handler = Arc::new(FakeHandler::default());
        let action = action_with(handler.clone(), Templates::default());
        let runtime = ScriptedRuntime::new().with_reply("Not now.");
        let first = Admitter::default();
        let (released, settled) = (first.released.clone(), first.settled.clone());

        let ok = Dispatcher::new()
            .with_interceptor(first)
            .with_interceptor(Blocker)
            .dispatch(&action, &runtime, &message("rust"), None, None)
            .await;

        assert!(!ok);
        assert_eq!(handler.invokes.load(Ordering::SeqCst), 0);
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(settled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn tool_timeout_reports_unknown_outcome() {
        let handler = Arc::new(FakeHandler {
            invoke_delay: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let action = action_with(handler, Templates::default());
        let runtime = ScriptedRuntime::new().with_reply("That took too long.");
        let (callback, seen) = capture();

        let ok = Dispatcher::new()
            .with_tool_timeout(Duration::from_millis(20))
            .dispatch(&action, &runtime, &message("rust"), None, Some(&callback))
            .await;

        assert!(!ok);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].error(),
            Some("Outcome unknown: SEARCH_WEB timed out after 20ms")
        );
    }

    #[tokio::test]
    async fn state_failure_falls_back_to_message_state() {
        let handler = Arc::new(FakeHandler::default());
        let templates = Templates {
            success: "{{recentMessages}}".to_string(),
            ..Templates::default()
        };
        let action = action_with(handler, templates);
        let runtime = ScriptedRuntime::new().failing_compose().with_reply("done");

        let ok = Dispatcher::new()
            .dispatch(&action, &runtime, &message("rust"), None, None)
            .await;

        assert!(ok);
        assert_eq!(runtime.prompts()[0].0, "alice: rust");
    }

    #[tokio::test]
    async fn supplied_state_is_not_recomposed() {
        let handler = Arc::new(FakeHandler::default());
        let templates = Templates {
            success: "{{agentName}}".to_string(),
            ..Templates::default()
        };
        let action = action_with(handler, templates);
        let runtime = ScriptedRuntime::new().with_reply("done");
        let mut state = State::new();
        state.set(keys::AGENT_NAME, "Supplied");

        let ok = Dispatcher::new()
            .dispatch(&action, &runtime, &message("rust"), Some(state), None)
            .await;

        assert!(ok);
        assert_eq!(runtime.compose_calls(), 0);
        assert_eq!(runtime.prompts()[0].0, "Supplied");
    }
}
