//! Shared types and arithmetic for the chain operations backplane: the
//! datastore's domain model, the execution-error taxonomy, and the exact
//! decimal helpers every worker uses instead of floating point.

pub mod decimal;
pub mod error;
pub mod model;
pub mod time;

pub use error::ExecutionErrorKind;
