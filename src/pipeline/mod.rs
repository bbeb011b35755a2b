//! Request-processing pipeline for job endpoints
//!
//! Every job endpoint runs one [`JobPipeline`]: an ordered list of
//! [`PipelineStage`]s that share a [`RequestContext`], plus an error path of
//! [`ErrorStage`]s. Stages run strictly in order. The first stage to return
//! `Err` stops the success path and the error stages run with that failure.
//!
//! ## Stage Order
//!
//! 1. **Prelude** - Endpoint-specific guards (payload size on create)
//! 2. **Profiler Start** - Open the request profile
//! 3. **User Resolution** - Authenticate the caller
//! 4. **Rate Limit** - Count the request against its quota class
//! 5. **Authorization** - Require master access
//! 6. **Connection Params** - Resolve database coordinates
//! 7. **Action** - Call the job service
//! 8. **Response Header** - Annotate the serving database host
//! 9. **Profiler Finish** - Close the profile
//! 10. **Result Log** - One structured record per request
//! 11. **Success Metric** - Count the success
//! 12. **Send Response** - Build the HTTP response
//!
//! Error path: **Error Metric** then **Error Tail**.

mod composer;
pub mod context;
pub mod stages;

use async_trait::async_trait;
use axum::response::Response;
pub use composer::{JobPipelines, PipelineComposer};
pub use context::{RequestContext, RequestInput, ResponseBody, StagedResponse};
use tracing::{debug, error};

use crate::{
    actions::JobAction,
    error::{self, GatewayError},
    observability::profiler::Profiler,
    rate_limit::RateLimitClass,
};

/// Result type for pipeline stage execution
///
/// - `Ok(())` - Stage completed, continue to next stage
/// - `Err(error)` - Abandon the success path and run the error stages
pub type StageResult = Result<(), GatewayError>;

/// A single stage on the success path.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    async fn execute(&self, ctx: &mut RequestContext) -> StageResult;

    /// Get the name of this stage (for logging and ordering checks)
    fn name(&self) -> &'static str;
}

/// A stage on the error path. Error stages observe the failure and never
/// raise their own.
#[async_trait]
pub trait ErrorStage: Send + Sync {
    async fn handle(&self, ctx: &mut RequestContext, error: &GatewayError);

    fn name(&self) -> &'static str;
}

/// Ordered stage list for one endpoint. Built once at startup.
pub struct JobPipeline {
    action: JobAction,
    rate_limit_class: RateLimitClass,
    profiling: bool,
    prelude: Vec<Box<dyn PipelineStage>>,
    stages: Vec<Box<dyn PipelineStage>>,
    error_stages: Vec<Box<dyn ErrorStage>>,
}

impl JobPipeline {
    pub(crate) fn new(
        action: JobAction,
        rate_limit_class: RateLimitClass,
        profiling: bool,
        prelude: Vec<Box<dyn PipelineStage>>,
        stages: Vec<Box<dyn PipelineStage>>,
        error_stages: Vec<Box<dyn ErrorStage>>,
    ) -> Self {
        Self {
            action,
            rate_limit_class,
            profiling,
            prelude,
            stages,
            error_stages,
        }
    }

    pub fn action(&self) -> JobAction {
        self.action
    }

    pub fn rate_limit_class(&self) -> RateLimitClass {
        self.rate_limit_class
    }

    /// Success-path stage names in execution order, prelude included.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.prelude
            .iter()
            .chain(self.stages.iter())
            .map(|s| s.name())
            .collect()
    }

    /// Success-path stage names without the endpoint prelude.
    pub fn core_stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn error_stage_names(&self) -> Vec<&'static str> {
        self.error_stages.iter().map(|s| s.name()).collect()
    }

    /// Run the pipeline for one request
    pub async fn execute(&self, input: RequestInput) -> Response {
        let profiler = self.profiling.then(Profiler::new);
        let mut ctx = RequestContext::new(input, self.action, self.rate_limit_class, profiler);

        if let Err(err) = self.run_success_path(&mut ctx).await {
            debug!(
                action = %self.action,
                error = %err,
                "Pipeline failed, running error stages"
            );
            for stage in &self.error_stages {
                debug!(stage = %stage.name(), "Executing error stage");
                stage.handle(&mut ctx, &err).await;
            }
        }

        match ctx.state.response.take_sent() {
            Some(response) => response,
            None => {
                error!(action = %self.action, "Pipeline completed without producing a response");
                error::internal_error(
                    "no_response",
                    "Internal error: pipeline completed without response",
                )
            }
        }
    }

    async fn run_success_path(&self, ctx: &mut RequestContext) -> StageResult {
        for stage in self.prelude.iter().chain(self.stages.iter()) {
            let stage_name = stage.name();
            debug!(stage = %stage_name, "Executing pipeline stage");
            stage.execute(ctx).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for JobPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPipeline")
            .field("action", &self.action)
            .field("rate_limit_class", &self.rate_limit_class)
            .field("stages", &self.stage_names())
            .field("error_stages", &self.error_stage_names())
            .finish()
    }
}
