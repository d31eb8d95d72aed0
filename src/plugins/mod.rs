//! Plugin bundles and fail-closed initialization
//!
//! A plugin contributes static descriptors and binds its tools once. Any
//! configuration problem during init yields a disabled plugin: the descriptors
//! stay listed for documentation, but no action is executable and the
//! description carries the reason.

pub mod polymarket;
pub mod rewards;
pub mod search;

pub use polymarket::PolymarketPlugin;
pub use rewards::RewardsPlugin;
pub use search::SearchPlugin;

use crate::actions::{Action, ActionDescriptor, ActionHandler, ActionRegistry, Templates};
use crate::config::{Config, SettingsProvider};
use crate::runtime::{AgentRuntime, Memory};
use crate::tools::ToolCall;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Context source rendered into `{{providers}}`
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self, runtime: &dyn AgentRuntime, message: &Memory) -> Result<String>;
}

/// Descriptor bundle handed to the host
pub struct Plugin {
    pub name: String,
    pub description: String,
    pub providers: Vec<Arc<dyn Provider>>,
    pub evaluators: Vec<String>,
    pub services: Vec<String>,
    /// Executable actions; empty when disabled
    pub actions: Vec<Action>,
    /// Every descriptor, listed even when disabled
    pub documented: Vec<Arc<ActionDescriptor>>,
}

impl Plugin {
    pub fn is_enabled(&self) -> bool {
        !self.actions.is_empty()
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name() == name)
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("description", &self.description)
            .field(
                "actions",
                &self.actions.iter().map(Action::name).collect::<Vec<_>>(),
            )
            .field(
                "providers",
                &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Live handlers and providers produced by a successful bind
#[derive(Default)]
pub struct BoundTools {
    pub handlers: HashMap<String, Arc<dyn ActionHandler>>,
    pub providers: Vec<Arc<dyn Provider>>,
}

impl BoundTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, action: &str, handler: Arc<dyn ActionHandler>) -> Self {
        self.handlers.insert(action.to_string(), handler);
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.push(provider);
        self
    }
}

#[async_trait]
pub trait PluginFactory: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Base of the description when disabled
    fn disabled_label(&self) -> &str {
        self.description()
    }

    fn descriptors(&self) -> Vec<ActionDescriptor>;

    fn templates(&self) -> Templates {
        Templates::default()
    }

    /// Bind every tool the descriptors need. Must not perform network I/O.
    async fn bind(&self, settings: &dyn SettingsProvider) -> Result<BoundTools>;
}

/// Initialize a plugin, degrading to a disabled bundle on any error
pub async fn initialize(factory: &dyn PluginFactory, settings: &dyn SettingsProvider) -> Plugin {
    let descriptors = factory.descriptors();
    let documented: Vec<Arc<ActionDescriptor>> =
        descriptors.iter().cloned().map(Arc::new).collect();

    match assemble(factory, settings, descriptors).await {
        Ok(plugin) => {
            info!(
                plugin = factory.name(),
                actions = plugin.actions.len(),
                providers = plugin.providers.len(),
                "Plugin initialized"
            );
            plugin
        }
        Err(e) => {
            warn!(plugin = factory.name(), error = %e, "Plugin disabled");
            Plugin {
                name: factory.name().to_string(),
                description: format!("{} (Disabled - {})", factory.disabled_label(), e),
                providers: Vec::new(),
                evaluators: Vec::new(),
                services: Vec::new(),
                actions: Vec::new(),
                documented,
            }
        }
    }
}

async fn assemble(
    factory: &dyn PluginFactory,
    settings: &dyn SettingsProvider,
    descriptors: Vec<ActionDescriptor>,
) -> Result<Plugin> {
    let mut registry = ActionRegistry::new();
    registry.register(descriptors)?;
    let tools = factory.bind(settings).await?;
    pair(factory, registry, tools)
}

/// Build an enabled plugin from tools bound elsewhere
pub fn bundle(factory: &dyn PluginFactory, tools: BoundTools) -> Result<Plugin> {
    let mut registry = ActionRegistry::new();
    registry.register(factory.descriptors())?;
    pair(factory, registry, tools)
}

fn pair(factory: &dyn PluginFactory, registry: ActionRegistry, tools: BoundTools) -> Result<Plugin> {
    let BoundTools {
        mut handlers,
        providers,
    } = tools;
    let templates = Arc::new(factory.templates());

    let mut actions = Vec::with_capacity(registry.len());
    for descriptor in registry.list() {
        let handler = handlers.remove(&descriptor.name).ok_or_else(|| {
            Error::Config(format!("No handler bound for action {}", descriptor.name))
        })?;
        actions.push(Action {
            descriptor: descriptor.clone(),
            handler,
            templates: templates.clone(),
        });
    }
    if let Some(orphan) = handlers.keys().next() {
        return Err(Error::Config(format!(
            "Handler {} has no matching descriptor",
            orphan
        )));
    }

    Ok(Plugin {
        name: factory.name().to_string(),
        description: factory.description().to_string(),
        providers,
        evaluators: Vec::new(),
        services: Vec::new(),
        actions,
        documented: registry.list().to_vec(),
    })
}

/// Initialize the three bundled plugins from one config
pub async fn initialize_all(config: &Config, settings: &dyn SettingsProvider) -> Vec<Plugin> {
    let factories: Vec<Box<dyn PluginFactory>> = vec![
        Box::new(RewardsPlugin::new(config.rewards.clone())),
        Box::new(PolymarketPlugin::new(config.polymarket.clone())),
        Box::new(SearchPlugin::new(config.search.clone())),
    ];

    let mut plugins = Vec::with_capacity(factories.len());
    for factory in &factories {
        plugins.push(initialize(factory.as_ref(), settings).await);
    }
    plugins
}

/// Error for a handler handed a call of another tool family
pub(crate) fn unexpected_call(action: &str, call: &ToolCall) -> Error {
    let tool = match call {
        ToolCall::Transfer(_) => "transfer",
        ToolCall::Search(_) => "search",
        ToolCall::Market(_) => "market",
    };
    Error::ToolInvocation(format!("{} cannot run a {} call", action, tool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ExtractionContext;
    use crate::config::MapSettings;
    use crate::tools::ActionContent;

    struct NoopHandler;

    #[async_trait]
    impl ActionHandler for NoopHandler {
        async fn extract(&self, _: &ExtractionContext<'_>) -> Result<ToolCall> {
            Err(Error::ParameterExtraction("nothing to extract".into()))
        }

        async fn invoke(&self, call: &ToolCall) -> Result<ActionContent> {
            Err(unexpected_call("NOOP", call))
        }
    }

    struct FakeFactory {
        names: Vec<&'static str>,
        bound: Vec<&'static str>,
        bind_error: Option<&'static str>,
    }

    #[async_trait]
    impl PluginFactory for FakeFactory {
        fn name(&self) -> &str {
            "Fake"
        }

        fn description(&self) -> &str {
            "Fake plugin"
        }

        fn descriptors(&self) -> Vec<ActionDescriptor> {
            self.names
                .iter()
                .map(|n| ActionDescriptor::new(n, "fake"))
                .collect()
        }

        async fn bind(&self, _: &dyn SettingsProvider) -> Result<BoundTools> {
            if let Some(key) = self.bind_error {
                return Err(Error::MissingSetting(key.to_string()));
            }
            Ok(self.bound.iter().fold(BoundTools::new(), |tools, name| {
                tools.with_handler(name, Arc::new(NoopHandler))
            }))
        }
    }

    #[tokio::test]
    async fn pairs_every_descriptor_with_a_handler() {
        let factory = FakeFactory {
            names: vec!["FIRST", "SECOND"],
            bound: vec!["SECOND", "FIRST"],
            bind_error: None,
        };
        let plugin = initialize(&factory, &MapSettings::new()).await;
        assert!(plugin.is_enabled());
        assert_eq!(plugin.description, "Fake plugin");
        assert_eq!(
            plugin.actions.iter().map(Action::name).collect::<Vec<_>>(),
            vec!["FIRST", "SECOND"]
        );
        assert!(plugin.action("SECOND").is_some());
    }

    #[tokio::test]
    async fn bind_failure_disables_with_reason() {
        let factory = FakeFactory {
            names: vec!["FIRST"],
            bound: vec!["FIRST"],
            bind_error: Some("TAVILY_API_KEY"),
        };
        let plugin = initialize(&factory, &MapSettings::new()).await;
        assert!(!plugin.is_enabled());
        assert!(plugin.providers.is_empty());
        assert_eq!(
            plugin.description,
            "Fake plugin (Disabled - TAVILY_API_KEY not configured)"
        );
        assert_eq!(plugin.documented.len(), 1);
    }

    #[tokio::test]
    async fn missing_or_extra_handlers_disable() {
        let missing = FakeFactory {
            names: vec!["FIRST", "SECOND"],
            bound: vec!["FIRST"],
            bind_error: None,
        };
        let plugin = initialize(&missing, &MapSettings::new()).await;
        assert!(plugin.actions.is_empty());
        assert!(plugin.description.contains("No handler bound for action SECOND"));

        let extra = FakeFactory {
            names: vec!["FIRST"],
            bound: vec!["FIRST", "STRAY"],
            bind_error: None,
        };
        let plugin = initialize(&extra, &MapSettings::new()).await;
        assert!(plugin.actions.is_empty());
        assert!(plugin.description.contains("STRAY"));
    }

    #[tokio::test]
    async fn duplicate_descriptors_disable() {
        let factory = FakeFactory {
            names: vec!["FIRST", "FIRST"],
            bound: vec!["FIRST"],
            bind_error: None,
        };
        let plugin = initialize(&factory, &MapSettings::new()).await;
        assert!(plugin.actions.is_empty());
        assert!(plugin.description.contains("Duplicate action name: FIRST"));
    }

    #[tokio::test]
    async fn bundled_plugins_degrade_without_settings() {
        let plugins = initialize_all(&Config::default(), &MapSettings::new()).await;
        assert_eq!(plugins.len(), 3);
        for plugin in &plugins {
            assert!(!plugin.is_enabled(), "{} should be disabled", plugin.name);
            assert!(plugin.description.contains("Disabled"));
            assert!(!plugin.documented.is_empty());
        }
    }
}
