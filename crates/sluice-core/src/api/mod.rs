pub mod error;
pub mod fragment;
pub mod openai;
pub mod provider;
pub mod sse;
pub mod util;

pub use error::{ApiError, SseParseError};
pub use fragment::{Fragment, FragmentDelta, FunctionDelta, ToolCallDelta};
pub use openai::OpenAIClient;
pub use provider::{CompletionRequest, FragmentStream, Provider, ToolChoice};
