use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    auth::UserResolver,
    pipeline::{PipelineStage, RequestContext, StageResult},
};

/// Resolves the calling user from the request credentials.
pub struct UserResolutionStage {
    resolver: Arc<dyn UserResolver>,
}

impl UserResolutionStage {
    pub fn new(resolver: Arc<dyn UserResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl PipelineStage for UserResolutionStage {
    async fn execute(&self, ctx: &mut RequestContext) -> StageResult {
        let credentials = ctx.input.credentials();
        let user = self.resolver.resolve(&credentials).await?;

        debug!(user = %user.username, access = ?user.access, "Resolved user");
        ctx.state.user = Some(user);
        ctx.checkpoint("getUser");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "user_resolution"
    }
}
