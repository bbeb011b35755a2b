pub mod actions;
pub mod app_context;
pub mod auth;
pub mod config;
pub mod connection;
pub mod error;
pub mod jobs;
pub mod observability;
pub mod pipeline;
pub mod rate_limit;
pub mod server;
