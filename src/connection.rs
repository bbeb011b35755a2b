//! Database connection-parameter resolution.

use async_trait::async_trait;

use crate::{
    auth::{AccessLevel, AuthenticatedUser},
    config::DatabaseConfig,
    error::GatewayError,
    jobs::DbConnectionParams,
};

#[async_trait]
pub trait ConnectionParamsResolver: Send + Sync {
    async fn resolve(&self, user: &AuthenticatedUser) -> Result<DbConnectionParams, GatewayError>;
}

/// Derives connection parameters from configured templates.
#[derive(Debug, Clone)]
pub struct StaticConnectionParamsResolver {
    database: DatabaseConfig,
}

impl StaticConnectionParamsResolver {
    pub fn new(database: DatabaseConfig) -> Self {
        Self { database }
    }
}

fn render(template: &str, username: &str) -> String {
    template.replace("{user}", username)
}

#[async_trait]
impl ConnectionParamsResolver for StaticConnectionParamsResolver {
    async fn resolve(&self, user: &AuthenticatedUser) -> Result<DbConnectionParams, GatewayError> {
        if self.database.host.is_empty() {
            return Err(GatewayError::UpstreamUnavailable(format!(
                "No database host known for user {}",
                user.username
            )));
        }

        let (db_user, password) = if user.access == AccessLevel::Master {
            (
                render(&self.database.master_user_template, &user.username),
                self.database.password.clone(),
            )
        } else {
            (self.database.public_user.clone(), None)
        };

        Ok(DbConnectionParams {
            host: self.database.host.clone(),
            port: self.database.port,
            dbname: render(&self.database.dbname_template, &user.username),
            user: db_user,
            password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_master_gets_owner_role() {
        let resolver = StaticConnectionParamsResolver::new(DatabaseConfig {
            host: "pg.internal".to_string(),
            password: Some("s3cret".to_string()),
            ..Default::default()
        });
        let params = resolver
            .resolve(&AuthenticatedUser::new("vizzuality", AccessLevel::Master))
            .await
            .unwrap();

        assert_eq!(params.host, "pg.internal");
        assert_eq!(params.port, 5432);
        assert_eq!(params.dbname, "cartodb_user_vizzuality_db");
        assert_eq!(params.user, "cartodb_user_vizzuality");
        assert_eq!(params.password.as_deref(), Some("s3cret"));
    }

    #[tokio::test]
    async fn test_non_master_gets_public_role() {
        let resolver = StaticConnectionParamsResolver::new(DatabaseConfig::default());
        let params = resolver
            .resolve(&AuthenticatedUser::new("vizzuality", AccessLevel::Regular))
            .await
            .unwrap();
        assert_eq!(params.user, "publicuser");
        assert_eq!(params.password, None);
    }

    #[tokio::test]
    async fn test_missing_host_is_upstream_failure() {
        let resolver = StaticConnectionParamsResolver::new(DatabaseConfig {
            host: String::new(),
            ..Default::default()
        });
        let err = resolver
            .resolve(&AuthenticatedUser::new("vizzuality", AccessLevel::Master))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamUnavailable(_)));
    }
}
