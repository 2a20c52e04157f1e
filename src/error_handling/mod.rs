//! Error handling.
//!
//! This module provides:
//! - Error type definitions (initialization, database, import, per-row rejections)
//! - Transient connection error classification
//! - Retry strategy configuration

mod categorization;
mod types;

// Re-export public API
pub use categorization::{
    get_retry_strategy, is_connection_lost, is_session_refused, is_transient_error,
    is_unique_violation_on,
};
pub use types::{DatabaseError, ImportError, InitializationError, RowRejection};
