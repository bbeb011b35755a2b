//! Rate limit stage
//!
//! Asks the limiter about the request's quota class, publishes the verdict as
//! response headers and fails the request when the quota is exhausted.
//! Endpoints classified as [`RateLimitClass::None`] skip the limiter entirely.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderName;
use tracing::{debug, warn};

use crate::{
    error::GatewayError,
    pipeline::{PipelineStage, RequestContext, StageResult},
    rate_limit::{RateLimitClass, RateLimiter},
};

pub const RATE_LIMIT_LIMIT_HEADER: HeaderName = HeaderName::from_static("carto-rate-limit-limit");
pub const RATE_LIMIT_REMAINING_HEADER: HeaderName =
    HeaderName::from_static("carto-rate-limit-remaining");
pub const RATE_LIMIT_RESET_HEADER: HeaderName = HeaderName::from_static("carto-rate-limit-reset");

pub struct RateLimitStage {
    limiter: Arc<dyn RateLimiter>,
}

impl RateLimitStage {
    pub fn new(limiter: Arc<dyn RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl PipelineStage for RateLimitStage {
    async fn execute(&self, ctx: &mut RequestContext) -> StageResult {
        let class = ctx.rate_limit_class;
        if class == RateLimitClass::None {
            return Ok(());
        }

        let username = ctx.user()?.username.clone();
        let Some(decision) = self.limiter.check(&username, class).await? else {
            return Ok(());
        };

        let response = &mut ctx.state.response;
        response.insert_header(RATE_LIMIT_LIMIT_HEADER, &decision.limit.to_string());
        response.insert_header(
            RATE_LIMIT_REMAINING_HEADER,
            &decision.remaining.to_string(),
        );
        response.insert_header(
            RATE_LIMIT_RESET_HEADER,
            &decision.reset.as_secs().to_string(),
        );

        if !decision.allowed {
            warn!(user = %username, class = %class, "Rate limit exceeded");
            return Err(GatewayError::RateLimited {
                retry_after: decision.retry_after,
            });
        }

        debug!(user = %username, class = %class, remaining = decision.remaining, "Rate limit ok");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "rate_limit"
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        actions::JobAction,
        auth::{AccessLevel, AuthenticatedUser},
        pipeline::RequestInput,
        rate_limit::{NoopRateLimiter, SlidingWindowRateLimiter},
    };

    fn ctx(class: RateLimitClass) -> RequestContext {
        let mut ctx = RequestContext::new(RequestInput::default(), JobAction::Create, class, None);
        ctx.state.user = Some(AuthenticatedUser::new("vizzuality", AccessLevel::Master));
        ctx
    }

    #[tokio::test]
    async fn test_unclassified_endpoint_skips_limiter() {
        let stage = RateLimitStage::new(Arc::new(SlidingWindowRateLimiter::new(
            0,
            Duration::from_secs(60),
        )));
        let mut ctx = ctx(RateLimitClass::None);
        stage.execute(&mut ctx).await.unwrap();
        assert!(ctx.state.response.headers().is_empty());
    }

    #[tokio::test]
    async fn test_headers_published() {
        let stage = RateLimitStage::new(Arc::new(SlidingWindowRateLimiter::new(
            5,
            Duration::from_secs(60),
        )));
        let mut ctx = ctx(RateLimitClass::JobCreate);
        stage.execute(&mut ctx).await.unwrap();

        let headers = ctx.state.response.headers();
        assert_eq!(headers.get(RATE_LIMIT_LIMIT_HEADER).unwrap(), "5");
        assert_eq!(headers.get(RATE_LIMIT_REMAINING_HEADER).unwrap(), "4");
    }

    #[tokio::test]
    async fn test_exhausted_quota_fails() {
        let stage = RateLimitStage::new(Arc::new(SlidingWindowRateLimiter::new(
            1,
            Duration::from_secs(60),
        )));
        stage.execute(&mut ctx(RateLimitClass::JobGet)).await.unwrap();

        let mut second = ctx(RateLimitClass::JobGet);
        let err = stage.execute(&mut second).await.unwrap_err();
        assert!(matches!(err, GatewayError::RateLimited { .. }));
        assert_eq!(
            second
                .state
                .response
                .headers()
                .get(RATE_LIMIT_REMAINING_HEADER)
                .unwrap(),
            "0"
        );
    }

    #[tokio::test]
    async fn test_limiter_without_opinion() {
        let stage = RateLimitStage::new(Arc::new(NoopRateLimiter));
        let mut ctx = ctx(RateLimitClass::JobDelete);
        stage.execute(&mut ctx).await.unwrap();
        assert!(ctx.state.response.headers().is_empty());
    }
}
