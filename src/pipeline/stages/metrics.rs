//! Outcome counters. A pipeline without a metrics sink skips both.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::GatewayError,
    observability::metrics::{MetricsSink, JOB_ERROR_COUNTER, JOB_SUCCESS_COUNTER},
    pipeline::{ErrorStage, PipelineStage, RequestContext, StageResult},
};

pub struct SuccessMetricStage {
    sink: Option<Arc<dyn MetricsSink>>,
}

impl SuccessMetricStage {
    pub fn new(sink: Option<Arc<dyn MetricsSink>>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl PipelineStage for SuccessMetricStage {
    async fn execute(&self, ctx: &mut RequestContext) -> StageResult {
        if let Some(sink) = &self.sink {
            sink.increment(JOB_SUCCESS_COUNTER, ctx.action.into());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "success_metric"
    }
}

pub struct ErrorMetricStage {
    sink: Option<Arc<dyn MetricsSink>>,
}

impl ErrorMetricStage {
    pub fn new(sink: Option<Arc<dyn MetricsSink>>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl ErrorStage for ErrorMetricStage {
    async fn handle(&self, ctx: &mut RequestContext, _error: &GatewayError) {
        if let Some(sink) = &self.sink {
            sink.increment(JOB_ERROR_COUNTER, ctx.action.into());
        }
    }

    fn name(&self) -> &'static str {
        "error_metric"
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::{actions::JobAction, pipeline::RequestInput, rate_limit::RateLimitClass};

    #[derive(Default)]
    struct Counting {
        hits: Mutex<Vec<(&'static str, &'static str)>>,
    }

    impl MetricsSink for Counting {
        fn increment(&self, name: &'static str, action: &'static str) {
            self.hits.lock().push((name, action));
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new(
            RequestInput::default(),
            JobAction::Cancel,
            RateLimitClass::JobDelete,
            None,
        )
    }

    #[tokio::test]
    async fn test_counters_labelled_by_action() {
        let sink = Arc::new(Counting::default());
        let success = SuccessMetricStage::new(Some(sink.clone()));
        let error = ErrorMetricStage::new(Some(sink.clone()));

        success.execute(&mut ctx()).await.unwrap();
        error
            .handle(&mut ctx(), &GatewayError::Internal("x".to_string()))
            .await;

        assert_eq!(
            *sink.hits.lock(),
            vec![
                (JOB_SUCCESS_COUNTER, "cancel"),
                (JOB_ERROR_COUNTER, "cancel")
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_sink_is_noop() {
        assert!(SuccessMetricStage::new(None)
            .execute(&mut ctx())
            .await
            .is_ok());
        ErrorMetricStage::new(None)
            .handle(&mut ctx(), &GatewayError::Internal("x".to_string()))
            .await;
    }
}
