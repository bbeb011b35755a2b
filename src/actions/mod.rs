//! Action adapters
//!
//! Each adapter is the one stage in a pipeline that talks to the job service.
//! It reads the resolved context, makes a single call, stages the result and
//! records a profiler checkpoint named after its action. Job service failures
//! are raised as they come; adapters never retry.

mod cancel;
mod create;
mod list;
mod retrieve;

pub use cancel::CancelJobStage;
pub use create::{merge_params, CreateJobStage};
pub use list::ListWorkInProgressStage;
pub use retrieve::RetrieveJobStage;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

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
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobAction {
    Create,
    Retrieve,
    Cancel,
    List,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names_agree() {
        for action in [
            JobAction::Create,
            JobAction::Retrieve,
            JobAction::Cancel,
            JobAction::List,
        ] {
            let name: &'static str = action.into();
            assert_eq!(name, action.to_string());
            assert_eq!(name, action.as_ref());
            assert_eq!(name.parse::<JobAction>().unwrap(), action);
        }
    }
}
