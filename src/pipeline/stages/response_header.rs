use async_trait::async_trait;
use axum::http::HeaderName;

use crate::pipeline::{PipelineStage, RequestContext, StageResult};

pub const SERVED_BY_DB_HOST_HEADER: HeaderName = HeaderName::from_static("x-served-by-db-host");

/// Tells the client which database host served the request.
pub struct DbHostHeaderStage;

#[async_trait]
impl PipelineStage for DbHostHeaderStage {
    async fn execute(&self, ctx: &mut RequestContext) -> StageResult {
        let host = ctx
            .state
            .connection
            .as_ref()
            .map(|c| c.host.clone())
            .filter(|h| !h.is_empty());

        if let Some(host) = host {
            ctx.state
                .response
                .insert_header(SERVED_BY_DB_HOST_HEADER, &host);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "response_header"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        actions::JobAction, jobs::DbConnectionParams, pipeline::RequestInput,
        rate_limit::RateLimitClass,
    };

    fn ctx() -> RequestContext {
        RequestContext::new(
            RequestInput::default(),
            JobAction::Retrieve,
            RateLimitClass::JobGet,
            None,
        )
    }

    #[tokio::test]
    async fn test_host_header_set() {
        let mut ctx = ctx();
        ctx.state.connection = Some(DbConnectionParams {
            host: "db-3.internal".to_string(),
            port: 5432,
            dbname: "db".to_string(),
            user: "u".to_string(),
            password: None,
        });
        DbHostHeaderStage.execute(&mut ctx).await.unwrap();
        assert_eq!(
            ctx.state
                .response
                .headers()
                .get(SERVED_BY_DB_HOST_HEADER)
                .unwrap(),
            "db-3.internal"
        );
    }

    #[tokio::test]
    async fn test_no_host_no_header() {
        let mut ctx = ctx();
        DbHostHeaderStage.execute(&mut ctx).await.unwrap();
        assert!(ctx.state.response.headers().is_empty());
    }
}
