use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    auth::{AccessLevel, Authorizer},
    pipeline::{PipelineStage, RequestContext, StageResult},
};

/// Checks the resolved user against a fixed access requirement.
pub struct AuthorizationStage {
    authorizer: Arc<dyn Authorizer>,
    required: AccessLevel,
}

impl AuthorizationStage {
    pub fn new(authorizer: Arc<dyn Authorizer>, required: AccessLevel) -> Self {
        Self {
            authorizer,
            required,
        }
    }

    /// Job endpoints only ever accept master credentials.
    pub fn master(authorizer: Arc<dyn Authorizer>) -> Self {
        Self::new(authorizer, AccessLevel::Master)
    }
}

#[async_trait]
impl PipelineStage for AuthorizationStage {
    async fn execute(&self, ctx: &mut RequestContext) -> StageResult {
        let user = ctx.user()?;
        self.authorizer.authorize(user, self.required).await?;
        ctx.checkpoint("authorization");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "authorization"
    }
}
