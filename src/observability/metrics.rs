use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

pub const JOB_SUCCESS_COUNTER: &str = "sql_api_job_success_total";
pub const JOB_ERROR_COUNTER: &str = "sql_api_job_error_total";
pub const JOB_STEP_DURATION: &str = "sql_api_job_step_duration_seconds";

/// Destination for the per-request outcome counters.
///
/// The pipeline holds an `Option<Arc<dyn MetricsSink>>`; with no sink the
/// metric stages do nothing.
pub trait MetricsSink: Send + Sync {
    fn increment(&self, name: &'static str, action: &'static str);
}

/// Forwards to the global `metrics` recorder (Prometheus when installed).
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusMetricsSink;

impl MetricsSink for PrometheusMetricsSink {
    fn increment(&self, name: &'static str, action: &'static str) {
        counter!(name, "action" => action).increment(1);
    }
}

#[derive(Debug, Clone)]
pub struct PrometheusConfig {
    pub port: u16,
    pub host: String,
    pub duration_buckets: Option<Vec<f64>>,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            port: 29000,
            host: "0.0.0.0".to_string(),
            duration_buckets: None,
        }
    }
}

pub fn init_metrics() {
    describe_counter!(
        JOB_SUCCESS_COUNTER,
        "Total job requests that completed successfully, by action"
    );
    describe_counter!(
        JOB_ERROR_COUNTER,
        "Total job requests that ended in an error response, by action"
    );
    describe_histogram!(
        JOB_STEP_DURATION,
        "Time spent in each profiled step of a job request"
    );
}

pub fn start_prometheus(config: PrometheusConfig) -> Result<(), BuildError> {
    init_metrics();

    let duration_matcher = Matcher::Suffix(String::from("duration_seconds"));
    let duration_bucket: Vec<f64> = config.duration_buckets.unwrap_or_else(|| {
        vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]
    });

    let ip_addr: IpAddr = config
        .host
        .parse()
        .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
    let socket_addr = SocketAddr::new(ip_addr, config.port);

    PrometheusBuilder::new()
        .with_http_listener(socket_addr)
        .upkeep_timeout(Duration::from_secs(5 * 60))
        .set_buckets_for_metric(duration_matcher, &duration_bucket)?
        .install()
}

pub struct JobMetrics;

impl JobMetrics {
    pub fn record_step_duration(step: &str, duration: Duration) {
        histogram!(JOB_STEP_DURATION, "step" => step.to_string()).record(duration.as_secs_f64());
    }
}
