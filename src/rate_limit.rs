//! Rate-limit classification and limiter collaborators.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{config::RateLimitConfig, error::GatewayError};

/// Quota group a request is counted against. Fixed per endpoint.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RateLimitClass {
    /// Not rate limited
    None,
    Query,
    QueryFormat,
    JobCreate,
    JobGet,
    JobDelete,
    CopyFrom,
    CopyTo,
}

/// Limiter verdict for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the window frees a slot
    pub reset: Duration,
    pub retry_after: Duration,
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// `Ok(None)` means the limiter has no opinion and the request proceeds.
    async fn check(
        &self,
        user: &str,
        class: RateLimitClass,
    ) -> Result<Option<RateLimitDecision>, GatewayError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRateLimiter;

#[async_trait]
impl RateLimiter for NoopRateLimiter {
    async fn check(
        &self,
        _user: &str,
        _class: RateLimitClass,
    ) -> Result<Option<RateLimitDecision>, GatewayError> {
        Ok(None)
    }
}

/// In-process sliding window keyed by user and class.
pub struct SlidingWindowRateLimiter {
    max_requests: u32,
    window: Duration,
    requests: Mutex<HashMap<(String, RateLimitClass), Vec<Instant>>>,
}

impl SlidingWindowRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            requests: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.requests_per_window,
            Duration::from_secs(config.window_secs),
        )
    }

    fn decide(&self, user: &str, class: RateLimitClass, now: Instant) -> RateLimitDecision {
        let mut requests = self.requests.lock();
        let timestamps = requests.entry((user.to_string(), class)).or_default();

        timestamps.retain(|t| now.duration_since(*t) < self.window);

        let reset = timestamps
            .first()
            .map(|t| self.window.saturating_sub(now.duration_since(*t)))
            .unwrap_or(self.window);

        if timestamps.len() >= self.max_requests as usize {
            return RateLimitDecision {
                allowed: false,
                limit: self.max_requests,
                remaining: 0,
                reset,
                retry_after: reset,
            };
        }

        timestamps.push(now);
        let used = timestamps.len() as u32;
        RateLimitDecision {
            allowed: true,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(used),
            reset,
            retry_after: Duration::ZERO,
        }
    }

    /// Drop expired entries; call periodically from a background task.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let mut requests = self.requests.lock();
        requests.retain(|_, timestamps| {
            timestamps.retain(|t| now.duration_since(*t) < self.window);
            !timestamps.is_empty()
        });
    }

    pub fn tracked_keys(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowRateLimiter {
    async fn check(
        &self,
        user: &str,
        class: RateLimitClass,
    ) -> Result<Option<RateLimitDecision>, GatewayError> {
        Ok(Some(self.decide(user, class, Instant::now())))
    }
}
