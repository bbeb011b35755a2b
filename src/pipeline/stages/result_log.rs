use async_trait::async_trait;
use tracing::info;

use crate::pipeline::{PipelineStage, RequestContext, StageResult};

pub const RESULT_LOG_EVENT: &str = "sql_api_job";

/// Emits one structured record per successful job request.
///
/// Disabled for test environments so suites stay quiet.
pub struct ResultLogStage {
    enabled: bool,
}

impl ResultLogStage {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl PipelineStage for ResultLogStage {
    async fn execute(&self, ctx: &mut RequestContext) -> StageResult {
        if !self.enabled {
            return Ok(());
        }

        let user = ctx
            .state
            .user
            .as_ref()
            .map(|u| u.username.as_str())
            .unwrap_or_default();
        let job_id = ctx.state.job_id.as_deref().unwrap_or_default();

        info!(
            event = RESULT_LOG_EVENT,
            user = %user,
            action = %ctx.action,
            job_id = %job_id,
            elapsed_ms = ctx.start_time.elapsed().as_millis() as u64,
            "Job request completed"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "result_log"
    }
}
