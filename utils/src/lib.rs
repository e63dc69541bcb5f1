//! Shared utilities for the attestation indexer.

pub mod error_kind;
pub mod logging;
pub mod time;

pub use error_kind::ErrorKind;
pub use logging::{init_logging, LogFormat};
pub use time::{format_duration, Clock, SystemClock};
