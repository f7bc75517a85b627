pub mod config;
pub mod error;
pub mod types;

pub use config::TaskChatConfig;
pub use error::{Result, TaskChatError};
pub use types::*;
