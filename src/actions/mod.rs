//! The action-handler pipeline
//!
//! - [`registry`]: descriptors keyed by unique name
//! - [`dispatcher`]: validate, extract, invoke, compose, relay
//! - [`composer`]: invocation, success and error templates
//! - [`relay`]: the single callback per dispatch
//! - [`extract`]: message-text parameter extraction

pub mod composer;
pub mod descriptor;
pub mod dispatcher;
pub mod extract;
pub mod registry;
pub mod relay;

pub use composer::{compose_context, TemplateKind, Templates};
pub use descriptor::{
    always, render_examples, validator, Action, ActionDescriptor, ActionExample, ActionHandler,
    ExtractionContext, Validator,
};
pub use dispatcher::Dispatcher;
pub use registry::ActionRegistry;
pub use relay::{emit, ActionResponse, ActionResult, HandlerCallback, ResponseContent};
