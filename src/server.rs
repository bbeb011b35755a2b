use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Path, RawQuery, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::json;
use tokio::{net::TcpListener, signal};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
    app_context::AppContext,
    config::GatewayConfig,
    error::GatewayError,
    observability::{
        logging::{self, LoggingConfig},
        metrics::{self, PrometheusConfig},
    },
    pipeline::{JobPipelines, RequestInput},
    rate_limit::SlidingWindowRateLimiter,
};

pub struct AppState {
    pub context: Arc<AppContext>,
    pub pipelines: JobPipelines,
}

impl AppState {
    pub fn new(context: AppContext) -> Self {
        let pipelines = JobPipelines::new(&context);
        Self {
            context: Arc::new(context),
            pipelines,
        }
    }
}

fn parse_query(raw: Option<String>) -> HashMap<String, String> {
    raw.map(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .into_owned()
            .collect()
    })
    .unwrap_or_default()
}

async fn health() -> Response {
    (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
}

async fn list_work_in_progress(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let input = RequestInput::new(headers, parse_query(query), Bytes::new());
    state.pipelines.list.execute(input).await
}

/// Outcome of reading a body under the transport cap.
enum CappedBody {
    Complete(Bytes),
    /// Dropped; carries the declared length, or `cap + 1` when undeclared
    TooLarge(usize),
}

async fn read_capped_body(
    headers: &HeaderMap,
    body: Body,
    cap: usize,
) -> Result<CappedBody, GatewayError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<usize>().ok());
    let too_large = || CappedBody::TooLarge(declared.unwrap_or(0).max(cap.saturating_add(1)));

    if declared.is_some_and(|len| len > cap) {
        return Ok(too_large());
    }

    match Limited::new(body, cap).collect().await {
        Ok(collected) => Ok(CappedBody::Complete(collected.to_bytes())),
        Err(e) if e.is::<LengthLimitError>() => Ok(too_large()),
        Err(e) => Err(GatewayError::InvalidRequest(format!(
            "Failed to read request body: {e}"
        ))),
    }
}

/// Reads its own body so that oversized payloads still reach the size
/// guard and the error path instead of a bare transport 413.
async fn create_job(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let cap = state.context.config.max_request_body_bytes;
    let query = parse_query(query);

    let input = match read_capped_body(&parts.headers, body, cap).await {
        Ok(CappedBody::Complete(bytes)) => RequestInput::new(parts.headers, query, bytes),
        Ok(CappedBody::TooLarge(size)) => {
            warn!(size, cap, "Job payload exceeds transport cap");
            RequestInput::dropped_body(parts.headers, query, size)
        }
        Err(err) => return err.to_response(),
    };
    state.pipelines.create.execute(input).await
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let input = RequestInput::new(headers, parse_query(query), Bytes::new()).with_job_id(job_id);
    state.pipelines.retrieve.execute(input).await
}

async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let input = RequestInput::new(headers, parse_query(query), body).with_job_id(job_id);
    state.pipelines.cancel.execute(input).await
}

pub fn build_app(app_state: Arc<AppState>) -> Router {
    let config = &app_state.context.config;
    let max_body = config.max_request_body_bytes;

    // Create enforces the cap itself; see `create_job`.
    let job_routes = Router::new()
        .route("/jobs-wip", get(list_work_in_progress))
        .route("/sql/job/{job_id}", get(get_job).delete(cancel_job))
        .route_layer(RequestBodyLimitLayer::new(max_body))
        .route("/sql/job", post(create_job));

    let job_routes = match config.mount_path() {
        Some(base) => Router::new().nest(base, job_routes),
        None => job_routes,
    };

    Router::new()
        .route("/health", get(health))
        .merge(job_routes)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

pub async fn startup(config: GatewayConfig) -> anyhow::Result<()> {
    let _log_guard = logging::init_logging(&LoggingConfig::from_gateway(&config))?;

    if let Some(prometheus) = &config.prometheus {
        metrics::start_prometheus(PrometheusConfig {
            host: prometheus.host.clone(),
            port: prometheus.port,
            duration_buckets: None,
        })?;
        info!(host = %prometheus.host, port = prometheus.port, "Prometheus exporter started");
    }

    let mut builder = AppContext::builder().config(config.clone());
    if config.rate_limit.enabled {
        let limiter = Arc::new(SlidingWindowRateLimiter::from_config(&config.rate_limit));
        spawn_limiter_cleanup(limiter.clone(), Duration::from_secs(config.rate_limit.window_secs));
        builder = builder.rate_limiter(limiter);
    }
    let app_state = Arc::new(AppState::new(builder.build()?));

    let app = build_app(app_state);

    let bind_addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    info!(
        address = %bind_addr,
        base_path = %config.base_path,
        environment = %config.environment,
        "Starting SQL job gateway"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn spawn_limiter_cleanup(limiter: Arc<SlidingWindowRateLimiter>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every.max(Duration::from_secs(1)));
        loop {
            interval.tick().await;
            limiter.cleanup();
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        let parsed = parse_query(Some("api_key=1234&q=SELECT%201".to_string()));
        assert_eq!(parsed["api_key"], "1234");
        assert_eq!(parsed["q"], "SELECT 1");
        assert!(parse_query(None).is_empty());
    }
}
