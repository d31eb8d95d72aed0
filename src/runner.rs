//! Agent runner module
//!
//! Hosts the initialized plugins behind one dispatcher with the configured
//! interceptor chain, and routes inbound messages to an action or to a plain
//! conversational reply.

use crate::actions::{
    compose_context, emit, render_examples, Action, ActionResponse, Dispatcher, HandlerCallback,
    ResponseContent,
};
use crate::config::{Config, GuardConfig};
use crate::interceptors::{
    AuditLogInterceptor, PolicyConfig, PolicyInterceptor, RecipientCooldownInterceptor,
    SpendLimitInterceptor,
};
use crate::plugins::Plugin;
use crate::runtime::{fallback_state, AgentRuntime, Memory, ModelClass};
use crate::state::{keys, State};
use crate::tokens::parse_base_units;
use crate::{Error, Result};
use alloy::primitives::U256;
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Selection answer meaning "just talk"
const NO_ACTION: &str = "NONE";

const SELECTION_TEMPLATE: &str = "# Knowledge
{{knowledge}}

About {{agentName}}:
{{bio}}
{{lore}}

{{providers}}

# Available Actions
{{actions}}

# Action Examples
{{actionExamples}}

{{recentMessages}}

# Task: Decide whether {{agentName}} should take one of the available actions in response to the last message.
Respond with only the action name, or NONE if no action fits.";

const REPLY_TEMPLATE: &str = "# Knowledge
{{knowledge}}

About {{agentName}}:
{{bio}}
{{lore}}

{{providers}}

{{recentMessages}}

# Task: Write the next message for {{agentName}}. Respond with only the message text.";

/// Routes messages to the actions of the hosted plugins
pub struct AgentRunner {
    runtime: Arc<dyn AgentRuntime>,
    dispatcher: Dispatcher,
    plugins: Vec<Plugin>,
    actions: Vec<Action>,
}

impl AgentRunner {
    /// Create a runner over initialized plugins.
    ///
    /// Fails when two enabled plugins expose the same action name.
    pub fn new(
        runtime: Arc<dyn AgentRuntime>,
        dispatcher: Dispatcher,
        plugins: Vec<Plugin>,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut actions = Vec::new();
        for plugin in &plugins {
            for action in &plugin.actions {
                if !seen.insert(action.name().to_string()) {
                    return Err(Error::Config(format!(
                        "Duplicate action name: {}",
                        action.name()
                    )));
                }
                actions.push(action.clone());
            }
        }

        info!(
            plugins = plugins.len(),
            actions = actions.len(),
            interceptors = dispatcher.interceptor_count(),
            "Agent runner ready"
        );

        Ok(Self {
            runtime,
            dispatcher,
            plugins,
            actions,
        })
    }

    /// Build the dispatcher with every configured interceptor
    pub async fn build_dispatcher(config: &Config) -> Result<Dispatcher> {
        let guards = &config.guards;
        let mut dispatcher = Dispatcher::new();

        // 1. Policy
        if let Some(path) = &guards.policy_path {
            let policy = PolicyConfig::load(Path::new(path)).await?;
            dispatcher = dispatcher.with_interceptor(PolicyInterceptor::new(policy));
            info!(policy_path = path, "Added policy interceptor");
        }

        // 2. Spend limit
        let (max_transfer, daily_budget) = transfer_limits(guards)?;
        if max_transfer.is_some() || daily_budget.is_some() {
            dispatcher =
                dispatcher.with_interceptor(SpendLimitInterceptor::new(max_transfer, daily_budget));
            info!(
                max_transfer = ?max_transfer,
                daily_budget = ?daily_budget,
                "Added spend limit interceptor"
            );
        }

        // 3. Recipient cooldown
        if guards.recipient_cooldown_seconds > 0 {
            dispatcher = dispatcher.with_interceptor(RecipientCooldownInterceptor::new(
                guards.recipient_cooldown_seconds,
            ));
            info!(
                cooldown_seconds = guards.recipient_cooldown_seconds,
                "Added recipient cooldown interceptor"
            );
        }

        // 4. Audit log
        if let Some(audit_path) = &config.audit_log_path {
            dispatcher = dispatcher.with_interceptor(AuditLogInterceptor::new(audit_path));
            info!(audit_path = audit_path, "Added audit log interceptor");
        }

        if let Some(secs) = config.tool_timeout_secs {
            dispatcher = dispatcher.with_tool_timeout(Duration::from_secs(secs));
            info!(timeout_secs = secs, "Tool invocations are time-bounded");
        }

        Ok(dispatcher)
    }

    pub fn plugins(&self) -> &[Plugin] {
        &self.plugins
    }

    pub fn runtime(&self) -> &Arc<dyn AgentRuntime> {
        &self.runtime
    }

    /// Executable action by name
    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name() == name)
    }

    /// Handle one inbound message.
    ///
    /// With `action` set, that action is dispatched directly. Otherwise the
    /// large model picks one of the eligible actions, or `NONE` for a plain
    /// reply. Every outcome is relayed through `callback`.
    pub async fn handle_message(
        &self,
        message: &Memory,
        action: Option<&str>,
        callback: Option<&HandlerCallback>,
    ) -> Result<bool> {
        let runtime = self.runtime.as_ref();
        let mut state = match runtime.compose_state(message).await {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Failed to compose state, using message-only state");
                fallback_state(message)
            }
        };

        let eligible: Vec<&Action> = self
            .actions
            .iter()
            .filter(|a| a.descriptor.validate(runtime, message, &state))
            .collect();

        let providers = self.render_providers(message).await;
        let examples: Vec<_> = eligible
            .iter()
            .flat_map(|a| a.descriptor.examples.iter().cloned())
            .collect();
        state.extend([
            (keys::PROVIDERS, Value::String(providers)),
            (keys::ACTIONS, Value::String(describe_actions(&eligible))),
            (
                keys::ACTION_EXAMPLES,
                Value::String(render_examples(&examples, runtime.agent_name())),
            ),
        ]);

        if let Some(name) = action {
            let action = self
                .action(name)
                .ok_or_else(|| Error::Config(format!("No enabled action named {}", name)))?;
            return Ok(self
                .dispatcher
                .dispatch(action, runtime, message, Some(state), callback)
                .await);
        }

        match self.select_action(&eligible, &state).await {
            Some(action) => {
                info!(action = action.name(), message_id = %message.id, "Selected action");
                Ok(self
                    .dispatcher
                    .dispatch(action, runtime, message, Some(state), callback)
                    .await)
            }
            None => self.reply(&state, callback).await,
        }
    }

    /// Outputs of every provider, failures skipped
    async fn render_providers(&self, message: &Memory) -> String {
        let runtime = self.runtime.as_ref();
        let providers = self.plugins.iter().flat_map(|p| p.providers.iter());
        let outputs = join_all(providers.map(|provider| async move {
            (provider.name().to_string(), provider.get(runtime, message).await)
        }))
        .await;

        outputs
            .into_iter()
            .filter_map(|(name, output)| match output {
                Ok(text) if !text.trim().is_empty() => Some(text),
                Ok(_) => None,
                Err(e) => {
                    warn!(provider = name, error = %e, "Provider failed");
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    async fn select_action<'a>(&self, eligible: &[&'a Action], state: &State) -> Option<&'a Action> {
        if eligible.is_empty() {
            return None;
        }

        let context = compose_context(SELECTION_TEMPLATE, state, &[]);
        let answer = match self.runtime.generate_text(&context, ModelClass::Large).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "Action selection failed, replying without an action");
                return None;
            }
        };
        debug!(answer = answer.trim(), "Action selection");

        answer
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter(|token| !token.is_empty())
            .map(str::to_ascii_uppercase)
            .take_while(|token| *token != NO_ACTION)
            .find_map(|token| eligible.iter().copied().find(|a| a.name() == token))
    }

    async fn reply(&self, state: &State, callback: Option<&HandlerCallback>) -> Result<bool> {
        let context = compose_context(REPLY_TEMPLATE, state, &[]);
        let text = self
            .runtime
            .generate_text(&context, ModelClass::Small)
            .await?;
        emit(
            callback,
            ActionResponse {
                text,
                content: ResponseContent::Reply {},
            },
        );
        Ok(true)
    }
}

/// One `NAME: description` line per action
fn describe_actions(actions: &[&Action]) -> String {
    actions
        .iter()
        .map(|a| format!("{}: {}", a.name(), a.descriptor.description))
        .collect::<Vec<_>>()
        .join("\n")
}

fn transfer_limits(guards: &GuardConfig) -> Result<(Option<U256>, Option<U256>)> {
    let parse = |key: &str, raw: &Option<String>| -> Result<Option<U256>> {
        raw.as_deref()
            .map(|value| {
                parse_base_units(value.trim()).ok_or_else(|| {
                    Error::Config(format!(
                        "Invalid guards.{}: '{}' must be an integer in base units",
                        key, value
                    ))
                })
            })
            .transpose()
    };
    Ok((
        parse("max_transfer_amount", &guards.max_transfer_amount)?,
        parse("daily_transfer_budget", &guards.daily_transfer_budget)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{validator, ActionDescriptor};
    use crate::config::RewardsConfig;
    use crate::plugins::rewards::SEND_TOKEN;
    use crate::plugins::{bundle, Provider, RewardsPlugin};
    use crate::testing::{capture, ScriptedRuntime, SpyTransfer};
    use async_trait::async_trait;

    const ADDRESS: &str = "0x1111111111111111111111111111111111111111";

    fn rewards(spy: Arc<SpyTransfer>) -> Plugin {
        let factory = RewardsPlugin::new(RewardsConfig::default());
        let tools = factory.tools(spy).unwrap();
        bundle(&factory, tools).unwrap()
    }

    fn runner(runtime: Arc<ScriptedRuntime>, plugins: Vec<Plugin>) -> AgentRunner {
        AgentRunner::new(runtime, Dispatcher::new(), plugins).unwrap()
    }

    fn workout() -> Memory {
        Memory::new(
            "alice",
            "Coach",
            "room",
            format!("Finished my run! Address: {}", ADDRESS),
        )
    }

    struct BrokenProvider;

    #[async_trait]
    impl Provider for BrokenProvider {
        fn name(&self) -> &str {
            "broken"
        }

        async fn get(&self, _: &dyn AgentRuntime, _: &Memory) -> Result<String> {
            Err(Error::Generation("provider offline".into()))
        }
    }

    #[test]
    fn duplicate_actions_across_plugins_rejected() {
        let runtime = Arc::new(ScriptedRuntime::new());
        let plugins = vec![
            rewards(Arc::new(SpyTransfer::new())),
            rewards(Arc::new(SpyTransfer::new())),
        ];
        let err = AgentRunner::new(runtime, Dispatcher::new(), plugins)
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Configuration error: Duplicate action name: SEND_TOKEN");
    }

    #[tokio::test]
    async fn model_selects_action() {
        let spy = Arc::new(SpyTransfer::new());
        let runtime = Arc::new(
            ScriptedRuntime::new()
                .with_reply("SEND_TOKEN")
                .with_reply("Reward sent, great run!"),
        );
        let runner = runner(runtime.clone(), vec![rewards(spy.clone())]);
        let (callback, seen) = capture();

        let ok = runner
            .handle_message(&workout(), None, Some(&callback))
            .await
            .unwrap();

        assert!(ok);
        assert_eq!(spy.calls().len(), 1);

        let prompts = runtime.prompts();
        assert_eq!(prompts[0].1, ModelClass::Large);
        assert!(prompts[0]
            .0
            .contains("SEND_TOKEN: Send AIccountabilityToken (ACC) as a reward"));
        assert!(prompts[0].0.contains("EVM Wallet Address (Arbitrum Sepolia)"));
        assert_eq!(prompts[1].1, ModelClass::Small);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].text, "Reward sent, great run!");
    }

    #[tokio::test]
    async fn none_falls_back_to_plain_reply() {
        let spy = Arc::new(SpyTransfer::new());
        let runtime = Arc::new(
            ScriptedRuntime::new()
                .with_reply("NONE")
                .with_reply("Nice run! Keep going."),
        );
        let runner = runner(runtime.clone(), vec![rewards(spy.clone())]);
        let (callback, seen) = capture();

        let ok = runner
            .handle_message(&workout(), None, Some(&callback))
            .await
            .unwrap();

        assert!(ok);
        assert!(spy.calls().is_empty());
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].content, ResponseContent::Reply {});
        assert_eq!(seen[0].text, "Nice run! Keep going.");
    }

    #[tokio::test]
    async fn named_action_skips_selection() {
        let spy = Arc::new(SpyTransfer::new());
        let runtime = Arc::new(ScriptedRuntime::new().with_reply("Sent!"));
        let runner = runner(runtime.clone(), vec![rewards(spy.clone())]);

        let ok = runner
            .handle_message(&workout(), Some(SEND_TOKEN), None)
            .await
            .unwrap();

        assert!(ok);
        assert_eq!(spy.calls().len(), 1);
        assert_eq!(runtime.prompts().len(), 1);
    }

    #[tokio::test]
    async fn unknown_named_action_is_an_error() {
        let runtime = Arc::new(ScriptedRuntime::new());
        let runner = runner(runtime, Vec::new());

        let err = runner
            .handle_message(&workout(), Some("SWAP"), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No enabled action named SWAP"));
    }

    #[tokio::test]
    async fn ineligible_actions_are_not_offered() {
        let spy = Arc::new(SpyTransfer::new());
        let mut plugin = rewards(spy.clone());
        let descriptor = ActionDescriptor {
            validator: validator(|_, _, _| false),
            ..(*plugin.actions[0].descriptor).clone()
        };
        plugin.actions[0].descriptor = Arc::new(descriptor);

        let runtime = Arc::new(ScriptedRuntime::new().with_reply("Keep it up!"));
        let runner = runner(runtime.clone(), vec![plugin]);

        let ok = runner.handle_message(&workout(), None, None).await.unwrap();

        assert!(ok);
        assert!(spy.calls().is_empty());
        let prompts = runtime.prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].1, ModelClass::Small);
    }

    #[tokio::test]
    async fn failing_provider_is_skipped() {
        let spy = Arc::new(SpyTransfer::new());
        let mut plugin = rewards(spy);
        plugin.providers.insert(0, Arc::new(BrokenProvider));

        let runtime = Arc::new(ScriptedRuntime::new().with_reply("NONE").with_reply("Hi!"));
        let runner = runner(runtime.clone(), vec![plugin]);

        assert!(runner.handle_message(&workout(), None, None).await.unwrap());
        assert!(runtime.prompts()[0].0.contains("EVM Wallet Address"));
    }

    #[tokio::test]
    async fn reply_generation_failure_is_returned() {
        let runtime = Arc::new(ScriptedRuntime::new().with_failure("model offline"));
        let runner = runner(runtime, Vec::new());

        let err = runner.handle_message(&workout(), None, None).await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }

    #[tokio::test]
    async fn default_guards_build_spend_limit_and_cooldown() {
        let dispatcher = AgentRunner::build_dispatcher(&Config::default()).await.unwrap();
        assert_eq!(dispatcher.interceptor_count(), 2);
    }

    #[tokio::test]
    async fn every_guard_is_wired() {
        let dir = tempfile::tempdir().unwrap();
        let policy = dir.path().join("policy.json");
        std::fs::write(
            &policy,
            r#"{"mode":"default-deny","rules":[{"action":"SEND_TOKEN","allowed":true}]}"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.guards.policy_path = Some(policy.display().to_string());
        config.audit_log_path = Some(dir.path().join("audit.jsonl").display().to_string());
        config.tool_timeout_secs = Some(30);

        let dispatcher = AgentRunner::build_dispatcher(&config).await.unwrap();
        assert_eq!(dispatcher.interceptor_count(), 4);
    }

    #[tokio::test]
    async fn guards_can_be_disabled() {
        let mut config = Config::default();
        config.guards = GuardConfig {
            max_transfer_amount: None,
            daily_transfer_budget: None,
            recipient_cooldown_seconds: 0,
            policy_path: None,
        };
        let dispatcher = AgentRunner::build_dispatcher(&config).await.unwrap();
        assert_eq!(dispatcher.interceptor_count(), 0);
    }

    #[tokio::test]
    async fn fractional_guard_amount_rejected() {
        let mut config = Config::default();
        config.guards.max_transfer_amount = Some("0.5".into());

        let err = AgentRunner::build_dispatcher(&config).await.err().expect("expected configuration error");
        assert!(err.is_configuration());
        assert!(err.to_string().contains("guards.max_transfer_amount"));
    }
}
