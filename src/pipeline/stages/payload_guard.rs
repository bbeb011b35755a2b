//! Payload size guard for job creation
//!
//! The allowed size is `(per-user override in KB, or the configured default)
//! × 1024` bytes, never more than the transport cap. Overrides come from a
//! [`PayloadLimitResolver`]; the stock resolver never has one.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::{
    error::GatewayError,
    pipeline::{PipelineStage, RequestContext, StageResult},
};

/// Source of per-user payload limits, in kilobytes.
#[async_trait]
pub trait PayloadLimitResolver: Send + Sync {
    /// `api_key` is the unauthenticated hint from the request, if any.
    async fn max_payload_kb(&self, api_key: Option<&str>) -> Option<u64>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoPayloadOverride;

#[async_trait]
impl PayloadLimitResolver for NoPayloadOverride {
    async fn max_payload_kb(&self, _api_key: Option<&str>) -> Option<u64> {
        None
    }
}

pub fn max_payload_bytes(override_kb: Option<u64>, default_kb: u64) -> u64 {
    override_kb.unwrap_or(default_kb).saturating_mul(1024)
}

pub fn payload_too_large_message(actual: usize, max: u64, docs_url: &str) -> String {
    let max_kb = (max as f64 / 1024.0).round() as u64;
    format!(
        "Your payload is too large: {actual} bytes. Max size allowed is {max} bytes ({max_kb}kb). \
         Are you trying to import data?. Please, check out import api {docs_url}"
    )
}

pub struct PayloadSizeGuardStage {
    limits: Arc<dyn PayloadLimitResolver>,
    default_kb: u64,
    docs_url: String,
    /// Bodies above this were not read by the transport
    transport_cap: Option<u64>,
}

impl PayloadSizeGuardStage {
    pub fn new(
        limits: Arc<dyn PayloadLimitResolver>,
        default_kb: u64,
        docs_url: impl Into<String>,
    ) -> Self {
        Self {
            limits,
            default_kb,
            docs_url: docs_url.into(),
            transport_cap: None,
        }
    }

    pub fn with_transport_cap(mut self, cap: u64) -> Self {
        self.transport_cap = Some(cap);
        self
    }

    /// Effective limit for a caller with the given override.
    pub fn max_bytes(&self, override_kb: Option<u64>) -> u64 {
        let max = max_payload_bytes(override_kb, self.default_kb);
        self.transport_cap.map_or(max, |cap| max.min(cap))
    }

    pub fn guard(&self, body_len: usize, max: u64) -> StageResult {
        if body_len as u64 > max {
            return Err(GatewayError::PayloadTooLarge {
                actual: body_len,
                max,
                message: payload_too_large_message(body_len, max, &self.docs_url),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PipelineStage for PayloadSizeGuardStage {
    async fn execute(&self, ctx: &mut RequestContext) -> StageResult {
        let credentials = ctx.input.credentials();
        let override_kb = self
            .limits
            .max_payload_kb(credentials.api_key.as_deref())
            .await;
        let max = self.max_bytes(override_kb);
        let body_len = ctx.input.body_size();

        self.guard(body_len, max).inspect_err(|_| {
            warn!(size = body_len, max, "Rejected oversized job payload");
        })
    }

    fn name(&self) -> &'static str {
        "payload_size_guard"
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::{
        actions::JobAction, config::DEFAULT_IMPORT_API_DOCS_URL, pipeline::RequestInput,
        rate_limit::RateLimitClass,
    };

    struct FixedOverride(u64);

    #[async_trait]
    impl PayloadLimitResolver for FixedOverride {
        async fn max_payload_kb(&self, _api_key: Option<&str>) -> Option<u64> {
            Some(self.0)
        }
    }

    fn guard_stage() -> PayloadSizeGuardStage {
        PayloadSizeGuardStage::new(Arc::new(NoPayloadOverride), 16, DEFAULT_IMPORT_API_DOCS_URL)
    }

    fn ctx_with_body(len: usize) -> RequestContext {
        let input = RequestInput {
            body: Bytes::from(vec![b'a'; len]),
            ..Default::default()
        };
        RequestContext::new(input, JobAction::Create, RateLimitClass::JobCreate, None)
    }

    #[test]
    fn test_max_payload_bytes() {
        assert_eq!(max_payload_bytes(None, 16), 16384);
        assert_eq!(max_payload_bytes(Some(64), 16), 65536);
    }

    #[test]
    fn test_message_format() {
        let err = guard_stage().guard(20000, 16384).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Your payload is too large: 20000 bytes. Max size allowed is 16384 bytes (16kb). \
             Are you trying to import data?. Please, check out import api \
             https://carto.com/docs/carto-engine/import-api/"
        );
        match err {
            GatewayError::PayloadTooLarge { actual, max, .. } => {
                assert_eq!(actual, 20000);
                assert_eq!(max, 16384);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_kilobytes_are_rounded() {
        let message = payload_too_large_message(3000, 1536, "http://docs");
        assert!(message.contains("(2kb)"));
        let message = payload_too_large_message(3000, 1400, "http://docs");
        assert!(message.contains("(1kb)"));
    }

    #[tokio::test]
    async fn test_boundary() {
        let stage = guard_stage();
        for len in [0, 1, 16383, 16384] {
            assert!(
                stage.execute(&mut ctx_with_body(len)).await.is_ok(),
                "{len} bytes should pass"
            );
        }
        for len in [16385, 20000] {
            assert!(
                stage.execute(&mut ctx_with_body(len)).await.is_err(),
                "{len} bytes should fail"
            );
        }
    }

    #[tokio::test]
    async fn test_override_raises_limit() {
        let stage = PayloadSizeGuardStage::new(
            Arc::new(FixedOverride(32)),
            16,
            DEFAULT_IMPORT_API_DOCS_URL,
        );
        assert!(stage.execute(&mut ctx_with_body(20000)).await.is_ok());
        assert!(stage.execute(&mut ctx_with_body(40000)).await.is_err());
    }

    #[tokio::test]
    async fn test_override_is_capped_by_transport() {
        let stage = PayloadSizeGuardStage::new(
            Arc::new(FixedOverride(4096)),
            16,
            DEFAULT_IMPORT_API_DOCS_URL,
        )
        .with_transport_cap(65536);
        assert_eq!(stage.max_bytes(Some(4096)), 65536);
        assert!(stage.execute(&mut ctx_with_body(65536)).await.is_ok());
        assert!(stage.execute(&mut ctx_with_body(65537)).await.is_err());
    }

    #[tokio::test]
    async fn test_dropped_body_reports_its_size() {
        let stage = guard_stage().with_transport_cap(2 * 1024 * 1024);
        let input = RequestInput::dropped_body(Default::default(), Default::default(), 3_145_740);
        let mut ctx =
            RequestContext::new(input, JobAction::Create, RateLimitClass::JobCreate, None);

        match stage.execute(&mut ctx).await.unwrap_err() {
            GatewayError::PayloadTooLarge { actual, max, message } => {
                assert_eq!(actual, 3_145_740);
                assert_eq!(max, 16384);
                assert!(message.starts_with("Your payload is too large: 3145740 bytes."));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
