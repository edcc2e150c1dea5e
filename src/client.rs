//! Validating, retrying request executor.
//!
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod core;
mod execution;
mod policy;
pub mod types;
mod validation;

pub use builder::ChatClientBuilder;
pub use core::{ChatClient, AUDIT_DETAIL_TIER};
pub use policy::RetryPolicy;
pub use types::SendStats;
