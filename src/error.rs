//! Failure taxonomy raised by pipeline stages and its HTTP rendering.
//!
//! Every stage surfaces failures by returning a [`GatewayError`]. The error
//! tail is the only place that turns one into a transport response, through
//! [`GatewayError::to_response`].

use std::time::Duration;

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::jobs::JobServiceError;

pub const HEADER_X_ERROR_CODE: &str = "X-Error-Code";

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    #[serde(rename = "type")]
    error_type: &'static str,
    code: &'a str,
    message: &'a str,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{message}")]
    PayloadTooLarge {
        actual: usize,
        max: u64,
        message: String,
    },

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    AuthenticationFailure(String),

    #[error("{0}")]
    AuthorizationFailure(String),

    #[error(
        "You are over platform's limits: too many requests. Please retry in {} seconds",
        retry_after.as_secs()
    )]
    RateLimited { retry_after: Duration },

    #[error("Job with id {0} not found")]
    JobNotFound(String),

    #[error(transparent)]
    JobService(JobServiceError),

    #[error("{0}")]
    UpstreamUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl From<JobServiceError> for GatewayError {
    fn from(err: JobServiceError) -> Self {
        match err {
            JobServiceError::NotFound(job_id) => GatewayError::JobNotFound(job_id),
            other => GatewayError::JobService(other),
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Reported as a client input error, not 413, so clients surface the message.
            GatewayError::PayloadTooLarge { .. } => StatusCode::BAD_REQUEST,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::AuthenticationFailure(_) => StatusCode::UNAUTHORIZED,
            GatewayError::AuthorizationFailure(_) => StatusCode::FORBIDDEN,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::JobNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::JobService(err) => match err {
                JobServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                JobServiceError::InvalidRequest(_)
                | JobServiceError::InvalidStatusTransition { .. } => StatusCode::BAD_REQUEST,
                JobServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                JobServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            GatewayError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::PayloadTooLarge { .. } => "payload_too_large",
            GatewayError::InvalidRequest(_) => "invalid_request",
            GatewayError::AuthenticationFailure(_) => "authentication_failed",
            GatewayError::AuthorizationFailure(_) => "permission_denied",
            GatewayError::RateLimited { .. } => "rate_limited",
            GatewayError::JobNotFound(_) => "job_not_found",
            GatewayError::JobService(err) => match err {
                JobServiceError::NotFound(_) => "job_not_found",
                JobServiceError::InvalidRequest(_)
                | JobServiceError::InvalidStatusTransition { .. } => "job_invalid",
                JobServiceError::Unavailable(_) => "job_service_unavailable",
                JobServiceError::Internal(_) => "job_service_error",
            },
            GatewayError::UpstreamUnavailable(_) => "upstream_unavailable",
            GatewayError::Internal(_) => "internal_error",
        }
    }

    /// Whether this failure is the caller's fault (4xx).
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    pub fn to_response(&self) -> Response {
        let mut response = create_error(self.status_code(), self.code(), self.to_string());
        if let GatewayError::RateLimited { retry_after } = self {
            let secs = retry_after.as_secs().max(1);
            if let Ok(val) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, val);
            }
        }
        response
    }
}

pub fn create_error(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
) -> Response {
    let code_str = code.into();
    let message_str = message.into();

    let mut headers = HeaderMap::with_capacity(1);
    if let Ok(val) = HeaderValue::from_str(&code_str) {
        headers.insert(HEADER_X_ERROR_CODE, val);
    }

    (
        status,
        headers,
        Json(ErrorResponse {
            error: ErrorDetail {
                error_type: status_code_to_str(status),
                code: &code_str,
                message: &message_str,
            },
        }),
    )
        .into_response()
}

pub fn internal_error(code: impl Into<String>, message: impl Into<String>) -> Response {
    create_error(StatusCode::INTERNAL_SERVER_ERROR, code, message)
}

fn status_code_to_str(status_code: StatusCode) -> &'static str {
    status_code
        .canonical_reason()
        .unwrap_or("Unknown Status Code")
}

pub fn extract_error_code_from_response<B>(response: &Response<B>) -> &str {
    response
        .headers()
        .get(HEADER_X_ERROR_CODE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_not_found_maps_to_404() {
        let err = GatewayError::from(JobServiceError::NotFound("abc".to_string()));
        assert!(matches!(err, GatewayError::JobNotFound(ref id) if id == "abc"));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "job_not_found");
        assert_eq!(err.to_string(), "Job with id abc not found");
    }

    #[test]
    fn test_job_service_errors_keep_their_kind() {
        let err = GatewayError::from(JobServiceError::Unavailable("queue down".to_string()));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), "job_service_unavailable");

        let err = GatewayError::from(JobServiceError::InvalidRequest("bad".to_string()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.is_client_error());
    }

    #[test]
    fn test_rate_limited_response_carries_retry_after() {
        let err = GatewayError::RateLimited {
            retry_after: Duration::from_secs(7),
        };
        let response = err.to_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            &HeaderValue::from_static("7")
        );
        assert_eq!(extract_error_code_from_response(&response), "rate_limited");
    }

    #[test]
    fn test_sub_second_retry_after_rounds_up_to_one() {
        let err = GatewayError::RateLimited {
            retry_after: Duration::from_millis(300),
        };
        let response = err.to_response();
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            &HeaderValue::from_static("1")
        );
    }

    #[test]
    fn test_create_error_sets_code_header() {
        let response = create_error(StatusCode::FORBIDDEN, "permission_denied", "nope");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            extract_error_code_from_response(&response),
            "permission_denied"
        );
    }
}
