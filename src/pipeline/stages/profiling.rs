//! Profiler bracket around the pipeline.
//!
//! Both stages are no-ops when no profiler is attached to the request.

use async_trait::async_trait;
use axum::http::HeaderName;
use tracing::debug;

use crate::{
    observability::metrics::JobMetrics,
    pipeline::{PipelineStage, RequestContext, StageResult},
};

pub const PROFILER_LABEL: &str = "sqlapi.job";
pub const PROFILER_HEADER: HeaderName = HeaderName::from_static("x-sqlapi-profiler");

pub struct ProfilerStartStage;

#[async_trait]
impl PipelineStage for ProfilerStartStage {
    async fn execute(&self, ctx: &mut RequestContext) -> StageResult {
        if let Some(profiler) = ctx.profiler.as_mut() {
            profiler.start(PROFILER_LABEL);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "profiler_start"
    }
}

/// Seals the profile, exports step timings and exposes them as a header.
pub struct ProfilerFinishStage;

#[async_trait]
impl PipelineStage for ProfilerFinishStage {
    async fn execute(&self, ctx: &mut RequestContext) -> StageResult {
        let Some(profiler) = ctx.profiler.as_mut() else {
            return Ok(());
        };

        let total = profiler.end().unwrap_or_default();
        debug!(
            label = profiler.label().unwrap_or_default(),
            total_ms = total.as_millis() as u64,
            steps = profiler.steps().len(),
            "Profile closed"
        );
        for step in profiler.steps() {
            JobMetrics::record_step_duration(&step.name, step.elapsed);
        }
        let summary = profiler.to_json_string();
        ctx.state.response.insert_header(PROFILER_HEADER, &summary);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "profiler_finish"
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::{
        actions::JobAction, observability::profiler::Profiler, pipeline::RequestInput,
        rate_limit::RateLimitClass,
    };

    #[tokio::test]
    async fn test_without_profiler_is_noop() {
        let mut ctx = RequestContext::new(
            RequestInput::default(),
            JobAction::List,
            RateLimitClass::None,
            None,
        );
        ProfilerStartStage.execute(&mut ctx).await.unwrap();
        ProfilerFinishStage.execute(&mut ctx).await.unwrap();
        assert!(ctx.state.response.headers().is_empty());
    }

    #[tokio::test]
    async fn test_profile_header_lists_steps() {
        let mut ctx = RequestContext::new(
            RequestInput::default(),
            JobAction::List,
            RateLimitClass::None,
            Some(Profiler::new()),
        );
        ProfilerStartStage.execute(&mut ctx).await.unwrap();
        ctx.checkpoint("list");
        ProfilerFinishStage.execute(&mut ctx).await.unwrap();

        let header = ctx
            .state
            .response
            .headers()
            .get(PROFILER_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let json: Value = serde_json::from_str(&header).unwrap();
        assert!(json.get("total").is_some());
        assert!(json.get("list").is_some());
    }
}
