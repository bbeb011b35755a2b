//! Stages shared by every job pipeline
//!
//! Each stage is a small struct holding the collaborators it needs and
//! implementing [`PipelineStage`](super::PipelineStage) or
//! [`ErrorStage`](super::ErrorStage). The composer wires them together.

mod authorization;
mod connection_params;
mod error_tail;
mod metrics;
mod payload_guard;
mod profiling;
mod rate_limit;
mod response;
mod response_header;
mod result_log;
mod user;

pub use authorization::AuthorizationStage;
pub use connection_params::ConnectionParamsStage;
pub use error_tail::ErrorTailStage;
pub use metrics::{ErrorMetricStage, SuccessMetricStage};
pub use payload_guard::{
    max_payload_bytes, payload_too_large_message, NoPayloadOverride, PayloadLimitResolver,
    PayloadSizeGuardStage,
};
pub use profiling::{ProfilerFinishStage, ProfilerStartStage, PROFILER_HEADER, PROFILER_LABEL};
pub use rate_limit::{
    RateLimitStage, RATE_LIMIT_LIMIT_HEADER, RATE_LIMIT_REMAINING_HEADER, RATE_LIMIT_RESET_HEADER,
};
pub use response::SendResponseStage;
pub use response_header::{DbHostHeaderStage, SERVED_BY_DB_HOST_HEADER};
pub use result_log::{ResultLogStage, RESULT_LOG_EVENT};
pub use user::UserResolutionStage;
