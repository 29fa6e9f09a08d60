//! Match orchestration: state machine, border, rollback and the clock that drives them

pub mod border;
pub mod error;
pub mod r#match;
pub mod registry;
pub mod rollback;
pub mod runtime;
pub mod scheduler;
pub mod spectator;

pub use error::MatchError;
pub use registry::MatchRegistry;
pub use runtime::{ArenaRuntime, RuntimeHandle, RuntimeStatus};
