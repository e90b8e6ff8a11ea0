//! typed cloudformation resources used by the static site stack.

use serde::Serialize;
use serde_json::Value;

pub mod amplify;
pub mod codecommit;
pub mod custom;
pub mod iam;
pub mod lambda;

pub use amplify::{App, Branch, EnvironmentVariable};
pub use codecommit::{Repository, RepositoryCode, S3Location};
pub use custom::BuildTrigger;
pub use iam::{Policy, Role};
pub use lambda::Function;

/// renders a serde struct as a cloudformation `Properties` object.
pub(crate) fn to_properties<T: Serialize>(props: &T) -> serde_json::Result<Value> {
    serde_json::to_value(props)
}
