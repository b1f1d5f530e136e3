//! Crash trigger evaluation, tranche state, persistence, and the tranche plan.

pub mod evaluator;
pub mod plan;
pub mod state;
pub mod store;

pub use evaluator::evaluate;
pub use plan::{Allocation, TranchePlan};
pub use state::{apply, CrashState, SCHEMA_VERSION};
pub use store::{PersistenceError, StateStore};
