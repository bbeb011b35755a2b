//! Authentication and authorization collaborators.
//!
//! This module provides:
//! - Credential extraction from query string and headers
//! - User resolution behind the [`UserResolver`] trait
//! - Access checks behind the [`Authorizer`] trait

mod authorization;
mod user;

pub use authorization::{AccessLevelAuthorizer, Authorizer};
pub use user::{
    AccessLevel, ApiKeyUserResolver, AuthenticatedUser, Credentials, UserResolver,
    API_KEY_HEADER, API_KEY_PARAM,
};
