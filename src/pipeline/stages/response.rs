use async_trait::async_trait;
use tracing::debug;

use crate::pipeline::{PipelineStage, RequestContext, StageResult};

/// Turns the staged status, body and headers into the HTTP response.
pub struct SendResponseStage;

#[async_trait]
impl PipelineStage for SendResponseStage {
    async fn execute(&self, ctx: &mut RequestContext) -> StageResult {
        let status = ctx.state.response.status();
        ctx.state.response.finalize()?;
        debug!(action = %ctx.action, status = %status, "Response sent");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "send_response"
    }
}
