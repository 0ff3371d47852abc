pub mod accumulator;
pub mod conversation;
pub mod events;
pub mod orchestrator;
pub mod validation;

pub use accumulator::{Accumulated, ChunkAccumulator, accumulate};
pub use conversation::{Message, Role};
pub use events::StreamEvent;
pub use orchestrator::{Orchestrator, TurnStream};
pub use validation::{ContextGate, KeywordGate, PassThrough, Rejection, ToolCallValidator};
