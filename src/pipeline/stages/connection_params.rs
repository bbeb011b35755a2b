use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    connection::ConnectionParamsResolver,
    pipeline::{PipelineStage, RequestContext, StageResult},
};

pub struct ConnectionParamsStage {
    resolver: Arc<dyn ConnectionParamsResolver>,
}

impl ConnectionParamsStage {
    pub fn new(resolver: Arc<dyn ConnectionParamsResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl PipelineStage for ConnectionParamsStage {
    async fn execute(&self, ctx: &mut RequestContext) -> StageResult {
        let params = self.resolver.resolve(ctx.user()?).await?;
        debug!(host = %params.host, dbname = %params.dbname, "Resolved connection params");
        ctx.state.connection = Some(params);
        ctx.checkpoint("setDBAuth");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "connection_params"
    }
}
