use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    jobs::JobService,
    pipeline::{PipelineStage, RequestContext, ResponseBody, StageResult},
};

pub struct RetrieveJobStage {
    job_service: Arc<dyn JobService>,
}

impl RetrieveJobStage {
    pub fn new(job_service: Arc<dyn JobService>) -> Self {
        Self { job_service }
    }
}

#[async_trait]
impl PipelineStage for RetrieveJobStage {
    async fn execute(&self, ctx: &mut RequestContext) -> StageResult {
        let job = self.job_service.get(ctx.job_id()?).await?;

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

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        actions::JobAction,
        error::GatewayError,
        jobs::{InMemoryJobService, JobCreateRequest},
        pipeline::RequestInput,
        rate_limit::RateLimitClass,
    };

    fn ctx(job_id: &str) -> RequestContext {
        RequestContext::new(
            RequestInput::default().with_job_id(job_id),
            JobAction::Retrieve,
            RateLimitClass::JobGet,
            None,
        )
    }

    #[tokio::test]
    async fn test_retrieve_existing_job() {
        let service = Arc::new(InMemoryJobService::new());
        let job = service
            .create(JobCreateRequest {
                user: "vizzuality".to_string(),
                query: json!("SELECT 1"),
                host: "localhost".to_string(),
                port: 5432,
                pass: None,
                dbname: "db".to_string(),
                dbuser: "user".to_string(),
            })
            .await
            .unwrap();

        let mut ctx = ctx(&job.job_id);
        RetrieveJobStage::new(service).execute(&mut ctx).await.unwrap();
        assert_eq!(
            ctx.state.response.body(),
            Some(&ResponseBody::Entity(job.serialize()))
        );
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let stage = RetrieveJobStage::new(Arc::new(InMemoryJobService::new()));
        let err = stage.execute(&mut ctx("missing")).await.unwrap_err();
        assert!(matches!(err, GatewayError::JobNotFound(ref id) if id == "missing"));
    }
}
