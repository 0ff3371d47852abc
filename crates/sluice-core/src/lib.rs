// Streaming response assembly and tool dispatch for chat-completion clients

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod test_utils;
pub mod tools;
pub mod utils;

pub use app::{Message, Orchestrator, Role, StreamEvent};
pub use error::{Error, Result};
