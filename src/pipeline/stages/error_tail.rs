use async_trait::async_trait;
use tracing::{error, warn};

use crate::{
    error::GatewayError,
    pipeline::{ErrorStage, RequestContext},
};

/// Last stage of the error path: the only place a failure becomes a response.
pub struct ErrorTailStage;

#[async_trait]
impl ErrorStage for ErrorTailStage {
    async fn handle(&self, ctx: &mut RequestContext, err: &GatewayError) {
        let user = ctx
            .state
            .user
            .as_ref()
            .map(|u| u.username.as_str())
            .unwrap_or_default();
        let job_id = ctx.state.job_id.as_deref().unwrap_or_default();

        if err.is_client_error() {
            warn!(
                action = %ctx.action,
                user = %user,
                job_id = %job_id,
                code = err.code(),
                error = %err,
                "Job request rejected"
            );
        } else {
            error!(
                action = %ctx.action,
                user = %user,
                job_id = %job_id,
                code = err.code(),
                error = %err,
                "Job request failed"
            );
        }

        let response = err.to_response();
        ctx.state.response.fail_with(response);
    }

    fn name(&self) -> &'static str {
        "error_tail"
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::{
        actions::JobAction,
        error::extract_error_code_from_response,
        pipeline::{RequestInput, ResponseBody},
        rate_limit::RateLimitClass,
    };

    #[tokio::test]
    async fn test_overrides_staged_success() {
        let mut ctx = RequestContext::new(
            RequestInput::default(),
            JobAction::Retrieve,
            RateLimitClass::JobGet,
            None,
        );
        ctx.state
            .response
            .stage(None, ResponseBody::Entity(serde_json::json!({})))
            .unwrap();

        ErrorTailStage
            .handle(&mut ctx, &GatewayError::JobNotFound("abc".to_string()))
            .await;

        let response = ctx.state.response.take_sent().unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(extract_error_code_from_response(&response), "job_not_found");
    }
}
