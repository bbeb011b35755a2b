use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use axum::http::{header, HeaderMap, StatusCode};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::{
    error::{GatewayError, GatewayResult},
    jobs::{JobCreateRequest, JobService},
    pipeline::{PipelineStage, RequestContext, ResponseBody, StageResult},
};

/// Query-string parameters overlaid by body parameters; the body wins.
pub fn merge_params(query: &HashMap<String, String>, body: Map<String, Value>) -> Map<String, Value> {
    let mut params: Map<String, Value> = query
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    params.extend(body);
    params
}

fn is_form_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| {
            ct.to_ascii_lowercase()
                .starts_with("application/x-www-form-urlencoded")
        })
}

fn parse_body(headers: &HeaderMap, body: &[u8]) -> GatewayResult<Map<String, Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    if is_form_encoded(headers) {
        return Ok(url::form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect());
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(GatewayError::InvalidRequest(
            "Request body must be a JSON object".to_string(),
        )),
        Err(e) => Err(GatewayError::InvalidRequest(format!(
            "Invalid JSON body: {e}"
        ))),
    }
}

pub struct CreateJobStage {
    job_service: Arc<dyn JobService>,
    /// Replaces the resolved database port when set
    batch_port: Option<u16>,
}

impl CreateJobStage {
    pub fn new(job_service: Arc<dyn JobService>, batch_port: Option<u16>) -> Self {
        Self {
            job_service,
            batch_port,
        }
    }

    fn build_request(&self, ctx: &RequestContext) -> GatewayResult<JobCreateRequest> {
        let body = parse_body(&ctx.input.headers, &ctx.input.body)?;
        let mut params = merge_params(&ctx.input.query, body);

        let query = match params.remove("query") {
            Some(Value::Null) | None => {
                return Err(GatewayError::InvalidRequest(
                    "You must indicate a sql query".to_string(),
                ))
            }
            Some(query) => query,
        };

        let user = ctx.user()?;
        let connection = ctx.connection()?;

        Ok(JobCreateRequest {
            user: user.username.clone(),
            query,
            host: connection.host.clone(),
            port: self.batch_port.unwrap_or(connection.port),
            pass: connection.password.clone(),
            dbname: connection.dbname.clone(),
            dbuser: connection.user.clone(),
        })
    }
}

#[async_trait]
impl PipelineStage for CreateJobStage {
    async fn execute(&self, ctx: &mut RequestContext) -> StageResult {
        let request = self.build_request(ctx)?;
        debug!(user = %request.user, host = %request.host, port = request.port, "Creating job");

        let job = self.job_service.create(request).await?;

        info!(job_id = %job.job_id, user = %job.user, "Job created");
        ctx.state.job_id = Some(job.job_id.clone());
        ctx.state
            .response
            .stage(Some(StatusCode::CREATED), ResponseBody::Entity(job.serialize()))?;
        let action = ctx.action;
        ctx.checkpoint(action.as_ref());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "action"
    }
}
