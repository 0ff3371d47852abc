use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

use sluice_tools::result::TEXT_COMPONENT;
use sluice_tools::{Presentation, ToolCallRequest, ToolError, ToolResult};

use super::registry::ToolRegistry;
use super::tool::ToolContext;

/// Runs a batch of tool calls and classifies each result.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: ToolRegistry,
}

impl ToolDispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute every call concurrently. Results come back in call order,
    /// one per call; a failing call never aborts the rest of the batch.
    pub async fn dispatch(
        &self,
        calls: &[ToolCallRequest],
        token: &CancellationToken,
    ) -> Vec<ToolResult> {
        let runs = calls.iter().map(|call| {
            let span = info_span!("tool", tool.name = %call.name, tool.id = %call.id);
            self.run_one(call, token.child_token()).instrument(span)
        });
        join_all(runs).await
    }

    async fn run_one(&self, call: &ToolCallRequest, token: CancellationToken) -> ToolResult {
        let Some(tool) = self.registry.get(&call.name) else {
            warn!(target: "sluice::dispatcher", "Unknown tool requested: {}", call.name);
            return ToolResult::failure(
                &call.id,
                &call.name,
                &ToolError::UnknownTool(call.name.clone()),
                Presentation::inline(TEXT_COMPONENT),
            );
        };
        let presentation = tool.presentation();

        let params = match call.parse_arguments() {
            Ok(params) => params,
            Err(e) => {
                warn!(target: "sluice::dispatcher", "Skipping call with unparsable arguments: {}", e);
                return ToolResult::failure(&call.id, &call.name, &e, presentation);
            }
        };

        let ctx = ToolContext::new(&call.id, token);
        match tool.execute_erased(params, &ctx).await {
            Ok(payload) => {
                debug!(target: "sluice::dispatcher", "Tool succeeded");
                ToolResult::success(&call.id, &call.name, payload, presentation)
            }
            Err(e) => {
                warn!(target: "sluice::dispatcher", "Tool failed: {}", e);
                ToolResult::failure(&call.id, &call.name, &e, presentation)
            }
        }
    }
}
