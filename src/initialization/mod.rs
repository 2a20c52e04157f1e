//! Process initialization.
//!
//! Logger set-up and the shared data-access context built from `Config`.

mod context;
mod logger;

// Re-export public API
pub use context::{init_context, AppContext};
pub use logger::init_logger_with;
