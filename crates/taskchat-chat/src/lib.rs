//! Conversational task engine for taskchat.
//!
//! Turns free-form chat messages into task-list changes: a completion model
//! proposes a structured action, a keyword fallback covers for it when it is
//! unavailable or unparseable, and the engine applies the result and keeps
//! the transcript bounded. Each user's engine runs as its own actor.

pub mod completion;
pub mod engine;
pub mod error;
pub mod extract;
pub mod extractor;
pub mod fallback;
pub mod prompt;
pub mod registry;
pub mod tasks;

#[cfg(test)]
mod test_support;

pub use completion::{
    CompletionClient, CompletionMessage, CompletionOptions, CompletionResponse,
    HttpCompletionClient,
};
pub use engine::{ConversationalTaskEngine, EngineLimits};
pub use error::ChatError;
pub use extractor::ActionExtractor;
pub use fallback::RuleBasedFallback;
pub use registry::{EngineFactory, EngineRegistry};
pub use tasks::TaskCollection;
