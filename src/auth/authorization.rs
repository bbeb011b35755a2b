use async_trait::async_trait;

use super::{AccessLevel, AuthenticatedUser};
use crate::error::GatewayError;

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(
        &self,
        user: &AuthenticatedUser,
        required: AccessLevel,
    ) -> Result<(), GatewayError>;
}

/// Grants access when the user's level is at least the required one.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLevelAuthorizer;

#[async_trait]
impl Authorizer for AccessLevelAuthorizer {
    async fn authorize(
        &self,
        user: &AuthenticatedUser,
        required: AccessLevel,
    ) -> Result<(), GatewayError> {
        if user.access >= required {
            Ok(())
        } else {
            Err(GatewayError::AuthorizationFailure(
                "permission denied".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_master_required() {
        let authorizer = AccessLevelAuthorizer;
        let master = AuthenticatedUser::new("vizzuality", AccessLevel::Master);
        let regular = AuthenticatedUser::new("vizzuality", AccessLevel::Regular);

        assert!(authorizer
            .authorize(&master, AccessLevel::Master)
            .await
            .is_ok());
        let err = authorizer
            .authorize(&regular, AccessLevel::Master)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::AuthorizationFailure(_)));
    }
}
