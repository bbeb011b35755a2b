use std::{sync::Arc, time::Duration};

use tracing::debug;

use crate::{
    auth::{AccessLevelAuthorizer, ApiKeyUserResolver, Authorizer, UserResolver},
    config::GatewayConfig,
    connection::{ConnectionParamsResolver, StaticConnectionParamsResolver},
    jobs::{InMemoryJobService, JobService},
    observability::metrics::{MetricsSink, PrometheusMetricsSink},
    pipeline::stages::{NoPayloadOverride, PayloadLimitResolver},
    rate_limit::{NoopRateLimiter, RateLimiter, SlidingWindowRateLimiter},
};

/// Error type for AppContext builder
#[derive(Debug)]
pub struct AppContextBuildError(&'static str);

impl std::fmt::Display for AppContextBuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Missing required field: {}", self.0)
    }
}

impl std::error::Error for AppContextBuildError {}

/// Collaborators shared by every pipeline.
#[derive(Clone)]
pub struct AppContext {
    pub config: GatewayConfig,
    pub job_service: Arc<dyn JobService>,
    pub user_resolver: Arc<dyn UserResolver>,
    pub authorizer: Arc<dyn Authorizer>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub connection_resolver: Arc<dyn ConnectionParamsResolver>,
    pub payload_limits: Arc<dyn PayloadLimitResolver>,
    pub metrics: Option<Arc<dyn MetricsSink>>,
}

impl AppContext {
    pub fn builder() -> AppContextBuilder {
        AppContextBuilder::new()
    }

    /// Context with the in-process reference collaborators for `config`.
    pub fn from_config(config: GatewayConfig) -> Self {
        AppContextBuilder::new().assemble(config)
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("config", &self.config)
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

/// Anything left unset falls back to the reference implementation derived
/// from the config.
pub struct AppContextBuilder {
    config: Option<GatewayConfig>,
    job_service: Option<Arc<dyn JobService>>,
    user_resolver: Option<Arc<dyn UserResolver>>,
    authorizer: Option<Arc<dyn Authorizer>>,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
    connection_resolver: Option<Arc<dyn ConnectionParamsResolver>>,
    payload_limits: Option<Arc<dyn PayloadLimitResolver>>,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl AppContextBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            job_service: None,
            user_resolver: None,
            authorizer: None,
            rate_limiter: None,
            connection_resolver: None,
            payload_limits: None,
            metrics: Some(Arc::new(PrometheusMetricsSink)),
        }
    }

    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn job_service(mut self, job_service: Arc<dyn JobService>) -> Self {
        self.job_service = Some(job_service);
        self
    }

    pub fn user_resolver(mut self, user_resolver: Arc<dyn UserResolver>) -> Self {
        self.user_resolver = Some(user_resolver);
        self
    }

    pub fn authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    pub fn rate_limiter(mut self, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    pub fn connection_resolver(
        mut self,
        connection_resolver: Arc<dyn ConnectionParamsResolver>,
    ) -> Self {
        self.connection_resolver = Some(connection_resolver);
        self
    }

    pub fn payload_limits(mut self, payload_limits: Arc<dyn PayloadLimitResolver>) -> Self {
        self.payload_limits = Some(payload_limits);
        self
    }

    /// `None` disables the outcome counters.
    pub fn metrics(mut self, metrics: Option<Arc<dyn MetricsSink>>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn build(mut self) -> Result<AppContext, AppContextBuildError> {
        let config = self
            .config
            .take()
            .ok_or(AppContextBuildError("config"))?;
        Ok(self.assemble(config))
    }

    fn assemble(self, config: GatewayConfig) -> AppContext {
        let rate_limiter = self.rate_limiter.unwrap_or_else(|| {
            if config.rate_limit.enabled {
                debug!(
                    requests = config.rate_limit.requests_per_window,
                    window = ?Duration::from_secs(config.rate_limit.window_secs),
                    "Using sliding window rate limiter"
                );
                Arc::new(SlidingWindowRateLimiter::from_config(&config.rate_limit))
            } else {
                Arc::new(NoopRateLimiter)
            }
        });

        AppContext {
            job_service: self
                .job_service
                .unwrap_or_else(|| Arc::new(InMemoryJobService::new())),
            user_resolver: self
                .user_resolver
                .unwrap_or_else(|| Arc::new(ApiKeyUserResolver::new(config.api_keys.clone()))),
            authorizer: self
                .authorizer
                .unwrap_or_else(|| Arc::new(AccessLevelAuthorizer)),
            rate_limiter,
            connection_resolver: self.connection_resolver.unwrap_or_else(|| {
                Arc::new(StaticConnectionParamsResolver::new(config.database.clone()))
            }),
            payload_limits: self
                .payload_limits
                .unwrap_or_else(|| Arc::new(NoPayloadOverride)),
            metrics: self.metrics,
            config,
        }
    }
}

impl Default for AppContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
