use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{config::ApiKeyEntry, error::GatewayError};

pub const API_KEY_PARAM: &str = "api_key";
pub const API_KEY_HEADER: &str = "x-api-key";

/// Privilege attached to a resolved credential. Ordered from least to most.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    Public,
    Regular,
    Master,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub username: String,
    pub access: AccessLevel,
}

impl AuthenticatedUser {
    pub fn new(username: impl Into<String>, access: AccessLevel) -> Self {
        Self {
            username: username.into(),
            access,
        }
    }
}

/// Raw credentials presented by a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: Option<String>,
}

impl Credentials {
    /// Lookup order: `api_key` query parameter, `X-Api-Key`, then `Authorization: Bearer`.
    pub fn from_parts(headers: &HeaderMap, query: &HashMap<String, String>) -> Self {
        let from_query = query
            .get(API_KEY_PARAM)
            .filter(|k| !k.is_empty())
            .cloned();

        let from_header = || {
            headers
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .filter(|k| !k.is_empty())
                .map(str::to_string)
        };

        let from_bearer = || {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| {
                    v.strip_prefix("Bearer ")
                        .or_else(|| v.strip_prefix("bearer "))
                })
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
        };

        Self {
            api_key: from_query.or_else(from_header).or_else(from_bearer),
        }
    }
}

#[async_trait]
pub trait UserResolver: Send + Sync {
    async fn resolve(&self, credentials: &Credentials) -> Result<AuthenticatedUser, GatewayError>;
}

/// Resolves users from a static table of API keys.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyUserResolver {
    keys: HashMap<String, ApiKeyEntry>,
}

impl ApiKeyUserResolver {
    pub fn new(keys: HashMap<String, ApiKeyEntry>) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl UserResolver for ApiKeyUserResolver {
    async fn resolve(&self, credentials: &Credentials) -> Result<AuthenticatedUser, GatewayError> {
        let api_key = credentials.api_key.as_deref().ok_or_else(|| {
            GatewayError::AuthenticationFailure("No api key provided".to_string())
        })?;

        let entry = self.keys.get(api_key).ok_or_else(|| {
            debug!("Rejected unknown api key");
            GatewayError::AuthenticationFailure("Unauthorized".to_string())
        })?;

        Ok(AuthenticatedUser::new(entry.username.clone(), entry.access))
    }
}
