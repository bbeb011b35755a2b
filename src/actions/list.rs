use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    jobs::JobService,
    pipeline::{PipelineStage, RequestContext, ResponseBody, StageResult},
};

/// Lists pending and running jobs. The service already returns transport
/// shaped summaries, so they are staged as-is.
pub struct ListWorkInProgressStage {
    job_service: Arc<dyn JobService>,
}

impl ListWorkInProgressStage {
    pub fn new(job_service: Arc<dyn JobService>) -> Self {
        Self { job_service }
    }
}

#[async_trait]
impl PipelineStage for ListWorkInProgressStage {
    async fn execute(&self, ctx: &mut RequestContext) -> StageResult {
        let jobs = self.job_service.list_work_in_progress_jobs().await?;
        debug!(count = jobs.len(), "Listed work in progress jobs");

        ctx.state
            .response
            .stage(None, ResponseBody::Collection(jobs))?;
        let action = ctx.action;
        ctx.checkpoint(action.as_ref());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "action"
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::{
        actions::JobAction, jobs::InMemoryJobService, pipeline::RequestInput,
        rate_limit::RateLimitClass,
    };

    #[tokio::test]
    async fn test_empty_listing() {
        let mut ctx = RequestContext::new(
            RequestInput::default(),
            JobAction::List,
            RateLimitClass::None,
            None,
        );
        ListWorkInProgressStage::new(Arc::new(InMemoryJobService::new()))
            .execute(&mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.state.response.status(), StatusCode::OK);
        assert_eq!(
            ctx.state.response.body(),
            Some(&ResponseBody::Collection(vec![]))
        );
    }
}
