//! Builds the per-endpoint pipelines from the shared application context.

use crate::{
    actions::{
        CancelJobStage, CreateJobStage, JobAction, ListWorkInProgressStage, RetrieveJobStage,
    },
    app_context::AppContext,
    pipeline::{
        stages::{
            AuthorizationStage, ConnectionParamsStage, DbHostHeaderStage, ErrorMetricStage,
            ErrorTailStage, PayloadSizeGuardStage, ProfilerFinishStage, ProfilerStartStage,
            RateLimitStage, ResultLogStage, SendResponseStage, SuccessMetricStage,
            UserResolutionStage,
        },
        ErrorStage, JobPipeline, PipelineStage,
    },
    rate_limit::RateLimitClass,
};

/// Wraps an action adapter with the shared resolution and finalization
/// stages. Every job endpoint gets the same skeleton; only the adapter, the
/// quota class and an optional prelude differ.
pub struct PipelineComposer<'a> {
    context: &'a AppContext,
}

impl<'a> PipelineComposer<'a> {
    pub fn new(context: &'a AppContext) -> Self {
        Self { context }
    }

    pub fn compose(
        &self,
        action: JobAction,
        adapter: Box<dyn PipelineStage>,
        class: RateLimitClass,
    ) -> JobPipeline {
        self.compose_with_prelude(action, Vec::new(), adapter, class)
    }

    pub fn compose_with_prelude(
        &self,
        action: JobAction,
        prelude: Vec<Box<dyn PipelineStage>>,
        adapter: Box<dyn PipelineStage>,
        class: RateLimitClass,
    ) -> JobPipeline {
        let ctx = self.context;
        let config = &ctx.config;

        let stages: Vec<Box<dyn PipelineStage>> = vec![
            Box::new(ProfilerStartStage),
            Box::new(UserResolutionStage::new(ctx.user_resolver.clone())),
            Box::new(RateLimitStage::new(ctx.rate_limiter.clone())),
            Box::new(AuthorizationStage::master(ctx.authorizer.clone())),
            Box::new(ConnectionParamsStage::new(ctx.connection_resolver.clone())),
            adapter,
            Box::new(DbHostHeaderStage),
            Box::new(ProfilerFinishStage),
            Box::new(ResultLogStage::new(!config.is_test())),
            Box::new(SuccessMetricStage::new(ctx.metrics.clone())),
            Box::new(SendResponseStage),
        ];

        let error_stages: Vec<Box<dyn ErrorStage>> = vec![
            Box::new(ErrorMetricStage::new(ctx.metrics.clone())),
            Box::new(ErrorTailStage),
        ];

        JobPipeline::new(
            action,
            class,
            config.profiling,
            prelude,
            stages,
            error_stages,
        )
    }
}

/// One pipeline per job endpoint, built once at startup.
#[derive(Debug)]
pub struct JobPipelines {
    pub list: JobPipeline,
    pub create: JobPipeline,
    pub retrieve: JobPipeline,
    pub cancel: JobPipeline,
}

impl JobPipelines {
    pub fn new(context: &AppContext) -> Self {
        let composer = PipelineComposer::new(context);
        let config = &context.config;
        let jobs = &context.job_service;

        let payload_guard = PayloadSizeGuardStage::new(
            context.payload_limits.clone(),
            config.default_max_payload_kb,
            config.import_api_docs_url.clone(),
        )
        .with_transport_cap(config.max_request_body_bytes as u64);

        Self {
            list: composer.compose(
                JobAction::List,
                Box::new(ListWorkInProgressStage::new(jobs.clone())),
                RateLimitClass::None,
            ),
            create: composer.compose_with_prelude(
                JobAction::Create,
                vec![Box::new(payload_guard)],
                Box::new(CreateJobStage::new(jobs.clone(), config.batch_port)),
                RateLimitClass::JobCreate,
            ),
            retrieve: composer.compose(
                JobAction::Retrieve,
                Box::new(RetrieveJobStage::new(jobs.clone())),
                RateLimitClass::JobGet,
            ),
            cancel: composer.compose(
                JobAction::Cancel,
                Box::new(CancelJobStage::new(jobs.clone())),
                RateLimitClass::JobDelete,
            ),
        }
    }

    pub fn get(&self, action: JobAction) -> &JobPipeline {
        match action {
            JobAction::List => &self.list,
            JobAction::Create => &self.create,
            JobAction::Retrieve => &self.retrieve,
            JobAction::Cancel => &self.cancel,
        }
    }
}
