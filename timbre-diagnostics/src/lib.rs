//! # Timbre Diagnostics
//!
//! Debugging and diagnostic tools for Timbre.
//! Provides structured logging setup and periodic render health reporting.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod debug_logger;
pub mod error;
pub mod render_monitor;

// Re-export main types
pub use debug_logger::DebugLogger;
pub use error::DiagnosticsError;
pub use render_monitor::{RenderHealth, RenderMonitor};
