//! Per-request state threaded through the job pipeline.
//!
//! A [`RequestContext`] is created when a request enters its pipeline and is
//! dropped when the response leaves. It is never shared between requests.

use std::{collections::HashMap, time::Instant};

use axum::{
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::Value;
use tracing::warn;

use crate::{
    actions::JobAction,
    auth::{AuthenticatedUser, Credentials},
    error::{GatewayError, GatewayResult},
    jobs::DbConnectionParams,
    observability::profiler::Profiler,
    rate_limit::RateLimitClass,
};

/// What the transport handed us for this request.
#[derive(Debug, Clone, Default)]
pub struct RequestInput {
    /// `job_id` route parameter, when the route has one
    pub job_id: Option<String>,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    /// Body exactly as received
    pub body: Bytes,
    /// Size of a body that was dropped at the transport cap, in bytes.
    /// `body` is empty when this is set.
    pub oversized: Option<usize>,
}

impl RequestInput {
    pub fn new(headers: HeaderMap, query: HashMap<String, String>, body: Bytes) -> Self {
        Self {
            job_id: None,
            query,
            headers,
            body,
            oversized: None,
        }
    }

    /// Input for a request whose body exceeded the transport cap.
    pub fn dropped_body(headers: HeaderMap, query: HashMap<String, String>, size: usize) -> Self {
        Self {
            oversized: Some(size),
            ..Self::new(headers, query, Bytes::new())
        }
    }

    /// Body size as the client sent it.
    pub fn body_size(&self) -> usize {
        self.oversized.unwrap_or(self.body.len())
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::from_parts(&self.headers, &self.query)
    }
}

/// Staged response payload.
///
/// Single jobs are serialized by the job itself; collections come back from
/// the job service already shaped and pass through untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Entity(Value),
    Collection(Vec<Value>),
}

impl ResponseBody {
    pub fn into_value(self) -> Value {
        match self {
            ResponseBody::Entity(value) => value,
            ResponseBody::Collection(items) => Value::Array(items),
        }
    }
}

/// Response under construction.
///
/// Status and body may be staged once. Headers accumulate from any stage and
/// survive onto error responses.
#[derive(Debug, Default)]
pub struct StagedResponse {
    status: Option<StatusCode>,
    body: Option<ResponseBody>,
    headers: HeaderMap,
    sent: Option<Response>,
}

impl StagedResponse {
    pub fn stage(&mut self, status: Option<StatusCode>, body: ResponseBody) -> GatewayResult<()> {
        if self.body.is_some() || self.status.is_some() {
            return Err(GatewayError::Internal(
                "response already staged for this request".to_string(),
            ));
        }
        self.status = status;
        self.body = Some(body);
        Ok(())
    }

    /// Status that will be sent; unset means 200.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn body(&self) -> Option<&ResponseBody> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Add a response header. Values that are not valid header text are dropped.
    pub fn insert_header(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(val) => {
                self.headers.insert(name, val);
            }
            Err(_) => warn!(header = %name, "Dropping response header with invalid value"),
        }
    }

    pub fn is_sent(&self) -> bool {
        self.sent.is_some()
    }

    /// Build the success response from staged state. Runs at most once.
    pub fn finalize(&mut self) -> GatewayResult<()> {
        if self.sent.is_some() {
            return Err(GatewayError::Internal(
                "response already sent for this request".to_string(),
            ));
        }

        let status = self.status();
        let headers = self.headers.clone();
        let response = match self.body.take() {
            Some(body) => (status, headers, Json(body.into_value())).into_response(),
            None => (status, headers).into_response(),
        };
        self.sent = Some(response);
        Ok(())
    }

    /// Replace whatever was staged or sent with an error response, keeping
    /// headers gathered so far.
    pub fn fail_with(&mut self, mut response: Response) {
        for (name, value) in self.headers.iter() {
            if !response.headers().contains_key(name) {
                response.headers_mut().insert(name.clone(), value.clone());
            }
        }
        self.status = None;
        self.body = None;
        self.sent = Some(response);
    }

    pub fn take_sent(&mut self) -> Option<Response> {
        self.sent.take()
    }
}

/// Mutable state filled in by stages.
#[derive(Debug, Default)]
pub struct RequestState {
    pub user: Option<AuthenticatedUser>,
    pub connection: Option<DbConnectionParams>,
    /// From the route, or set once create returns
    pub job_id: Option<String>,
    pub response: StagedResponse,
}

#[derive(Debug)]
pub struct RequestContext {
    pub input: RequestInput,
    pub state: RequestState,
    pub action: JobAction,
    pub rate_limit_class: RateLimitClass,
    pub profiler: Option<Profiler>,
    pub start_time: Instant,
}

impl RequestContext {
    pub fn new(
        input: RequestInput,
        action: JobAction,
        rate_limit_class: RateLimitClass,
        profiler: Option<Profiler>,
    ) -> Self {
        let state = RequestState {
            job_id: input.job_id.clone(),
            ..Default::default()
        };
        Self {
            input,
            state,
            action,
            rate_limit_class,
            profiler,
            start_time: Instant::now(),
        }
    }

    pub fn user(&self) -> GatewayResult<&AuthenticatedUser> {
        self.state
            .user
            .as_ref()
            .ok_or_else(|| GatewayError::Internal("user not resolved".to_string()))
    }

    pub fn connection(&self) -> GatewayResult<&DbConnectionParams> {
        self.state
            .connection
            .as_ref()
            .ok_or_else(|| GatewayError::Internal("connection params not resolved".to_string()))
    }

    pub fn job_id(&self) -> GatewayResult<&str> {
        self.state
            .job_id
            .as_deref()
            .ok_or_else(|| GatewayError::InvalidRequest("job_id is required".to_string()))
    }

    /// Record a profiler step when a profiler is attached.
    pub fn checkpoint(&mut self, step: &str) {
        if let Some(profiler) = self.profiler.as_mut() {
            profiler.done(step);
        }
    }
}
