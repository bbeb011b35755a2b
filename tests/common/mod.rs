#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::Value;
use sql_job_gateway::{
    app_context::{AppContext, AppContextBuilder},
    auth::AccessLevel,
    config::{Environment, GatewayConfig, GatewayConfigBuilder},
    jobs::InMemoryJobService,
    observability::metrics::MetricsSink,
    server::{build_app, AppState},
};
use tower::ServiceExt;

pub const MASTER_KEY: &str = "1234";
pub const REGULAR_KEY: &str = "regular";
pub const DB_HOST: &str = "db.internal";

/// Counts every increment by (metric, action).
#[derive(Default)]
pub struct RecordingSink {
    hits: Mutex<Vec<(&'static str, &'static str)>>,
}

impl RecordingSink {
    pub fn count(&self, name: &str, action: &str) -> usize {
        self.hits
            .lock()
            .iter()
            .filter(|(n, a)| *n == name && *a == action)
            .count()
    }
}

impl MetricsSink for RecordingSink {
    fn increment(&self, name: &'static str, action: &'static str) {
        self.hits.lock().push((name, action));
    }
}

pub fn test_config() -> GatewayConfigBuilder {
    GatewayConfig::builder()
        .environment(Environment::Test)
        .api_key(MASTER_KEY, "vizzuality", AccessLevel::Master)
        .api_key(REGULAR_KEY, "wadus", AccessLevel::Regular)
        .database_host(DB_HOST)
        .database_port(5432)
}

pub struct TestApp {
    pub router: Router,
    pub jobs: Arc<InMemoryJobService>,
    pub metrics: Arc<RecordingSink>,
}

impl TestApp {
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_context(config, |builder| builder)
    }

    pub fn with_context(
        config: GatewayConfig,
        customize: impl FnOnce(AppContextBuilder) -> AppContextBuilder,
    ) -> Self {
        let jobs = Arc::new(InMemoryJobService::new());
        let metrics = Arc::new(RecordingSink::default());
        let builder = AppContext::builder()
            .config(config)
            .job_service(jobs.clone())
            .metrics(Some(metrics.clone()));
        let context = customize(builder).build().expect("context");

        Self {
            router: build_app(Arc::new(AppState::new(context))),
            jobs,
            metrics,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub async fn json_body(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let value = serde_json::from_slice(&bytes).expect("json body");
    (status, value)
}
