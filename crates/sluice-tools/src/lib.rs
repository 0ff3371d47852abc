pub mod error;
pub mod result;
pub mod schema;
pub mod tools;

pub use error::{ToolError, ToolExecutionError};
pub use result::{Presentation, ToolResult};
pub use schema::{InputSchema, ToolCallRequest, ToolSchema, ToolSpec};
