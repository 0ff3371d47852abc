use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use sluice_tools::{InputSchema, Presentation, ToolError, ToolSchema, ToolSpec};

#[derive(Debug, Clone)]
pub struct ToolContext {
    pub tool_call_id: String,
    pub cancellation_token: CancellationToken,
}

impl ToolContext {
    pub fn new(tool_call_id: impl Into<String>, cancellation_token: CancellationToken) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            cancellation_token,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}

/// A tool with typed parameters and results, described by its [`ToolSpec`].
#[async_trait]
pub trait Tool: Send + Sync + 'static {
    type Spec: ToolSpec;

    const DESCRIPTION: &'static str;

    fn presentation(&self) -> Presentation;

    async fn execute(
        &self,
        params: <Self::Spec as ToolSpec>::Params,
        ctx: &ToolContext,
    ) -> Result<<Self::Spec as ToolSpec>::Result, <Self::Spec as ToolSpec>::Error>;

    fn schema() -> ToolSchema
    where
        Self: Sized,
    {
        let settings = schemars::generate::SchemaSettings::draft07().with(|s| {
            s.inline_subschemas = true;
        });
        let schema_gen = settings.into_generator();
        let input_schema = schema_gen.into_root_schema_for::<<Self::Spec as ToolSpec>::Params>();

        ToolSchema {
            name: <Self::Spec as ToolSpec>::NAME.to_string(),
            display_name: <Self::Spec as ToolSpec>::DISPLAY_NAME.to_string(),
            description: Self::DESCRIPTION.to_string(),
            input_schema: input_schema.into(),
        }
    }
}

/// Object-safe view of a tool, as stored in the registry.
#[async_trait]
pub trait ToolErased: Send + Sync {
    fn name(&self) -> &str;
    fn schema(&self) -> ToolSchema;
    fn presentation(&self) -> Presentation;

    async fn execute_erased(&self, params: Value, ctx: &ToolContext) -> Result<Value, ToolError>;
}

#[async_trait]
impl<T> ToolErased for T
where
    T: Tool,
{
    fn name(&self) -> &str {
        <T::Spec as ToolSpec>::NAME
    }

    fn schema(&self) -> ToolSchema {
        <T as Tool>::schema()
    }

    fn presentation(&self) -> Presentation {
        Tool::presentation(self)
    }

    async fn execute_erased(&self, params: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let name = <T::Spec as ToolSpec>::NAME;
        let typed_params: <T::Spec as ToolSpec>::Params = serde_json::from_value(params)
            .map_err(|e| ToolError::invalid_params(name, e.to_string()))?;

        let output = tokio::select! {
            biased;
            () = ctx.cancellation_token.cancelled() => {
                return Err(ToolError::Cancelled(name.to_string()));
            }
            output = self.execute(typed_params, ctx) => output,
        };

        let result = output.map_err(|e| ToolError::Execution(T::Spec::execution_error(e)))?;
        serde_json::to_value(result).map_err(|e| ToolError::InternalError(e.to_string()))
    }
}

type BoxedHandler = Arc<
    dyn Fn(Value, ToolContext) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send>>
        + Send
        + Sync,
>;

/// A tool backed by an async closure and a hand-written schema.
///
/// ```no_run
/// use serde_json::json;
/// use sluice_core::tools::FnTool;
/// use sluice_tools::{InputSchema, Presentation};
///
/// let echo = FnTool::new(
///     "echo",
///     "Repeat the input",
///     InputSchema::object(serde_json::Map::new(), vec![]),
///     Presentation::ReenterModel,
///     |args, _ctx| async move { Ok(args) },
/// );
/// ```
#[derive(Clone)]
pub struct FnTool {
    schema: ToolSchema,
    presentation: Presentation,
    handler: BoxedHandler,
}

impl FnTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: InputSchema,
        presentation: Presentation,
        handler: F,
    ) -> Self
    where
        F: Fn(Value, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        let name = name.into();
        Self {
            schema: ToolSchema {
                display_name: name.clone(),
                name,
                description: description.into(),
                input_schema,
            },
            presentation,
            handler: Arc::new(move |args, ctx| Box::pin(handler(args, ctx))),
        }
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.schema.name)
            .field("presentation", &self.presentation)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ToolErased for FnTool {
    fn name(&self) -> &str {
        &self.schema.name
    }

    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    fn presentation(&self) -> Presentation {
        self.presentation.clone()
    }

    async fn execute_erased(&self, params: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        if ctx.is_cancelled() {
            return Err(ToolError::Cancelled(self.schema.name.clone()));
        }
        (self.handler)(params, ctx.clone()).await
    }
}
