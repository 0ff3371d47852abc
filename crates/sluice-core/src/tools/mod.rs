pub mod builtin;
pub mod cache;
pub mod dispatcher;
pub mod registry;
pub mod tool;

pub use dispatcher::ToolDispatcher;
pub use registry::ToolRegistry;
pub use tool::{FnTool, Tool, ToolContext, ToolErased};
