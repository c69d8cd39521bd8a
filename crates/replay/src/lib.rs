//! Record/Replay Store (C7): persists successful task runs keyed by task
//! hash, parameterizes them for reuse across differing concrete values,
//! dispatches recorded turns back during replay, and accounts token cost
//! per run (spec.md §4.7, §6).

pub mod dispatch;
pub mod parameterize;
pub mod stats;
pub mod store;
pub mod substitution;

pub use dispatch::{ReplayCursor, LOCATOR_RETRY_ATTEMPTS, LOCATOR_RETRY_SLEEP};
pub use parameterize::{parameterize, ParameterizedTask};
pub use stats::StatsStore;
pub use store::ReplayStore;
pub use substitution::substitute_variables;
