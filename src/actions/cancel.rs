use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::{
    jobs::JobService,
    pipeline::{PipelineStage, RequestContext, ResponseBody, StageResult},
};

/// Cancellation semantics belong to the job service; whatever job it hands
/// back is what the client sees, including repeat cancels.
pub struct CancelJobStage {
    job_service: Arc<dyn JobService>,
}

impl CancelJobStage {
    pub fn new(job_service: Arc<dyn JobService>) -> Self {
        Self { job_service }
    }
}

#[async_trait]
impl PipelineStage for CancelJobStage {
    async fn execute(&self, ctx: &mut RequestContext) -> StageResult {
        let job = self.job_service.cancel(ctx.job_id()?).await?;
        info!(job_id = %job.job_id, status = %job.status, "Job cancel requested");

        ctx.state
            .response
            .stage(None, ResponseBody::Entity(job.serialize()))?;
        let action = ctx.action;
        ctx.checkpoint(action.as_ref());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "action"
    }
}
