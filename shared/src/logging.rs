//! Shared logging utilities for consistent tracing across all processes

use crate::types::ProcessId;
use chrono::{DateTime, Utc};

/// Where a process writes its formatted log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    /// Workers keep stdout free for report lines
    Stderr,
}

/// Build the filter directive for the current process
pub fn filter_directive(process_id: &ProcessId, log_level: Option<&str>) -> String {
    let base_level = log_level.unwrap_or("info");
    format!("{}={base_level},shared={base_level}", process_id.log_target())
}

/// Initialize tracing with an explicit level and output stream
///
/// `RUST_LOG` takes precedence over the computed directive when set.
pub fn init_tracing_with_level(log_level: Option<&str>, output: LogOutput) {
    use tracing_subscriber::{fmt, EnvFilter};

    let directive = filter_directive(ProcessId::current(), log_level);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    let builder = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    // A second init (tests, embedded use) keeps the first subscriber
    let _ = match output {
        LogOutput::Stdout => builder.try_init(),
        LogOutput::Stderr => builder.with_writer(std::io::stderr).try_init(),
    };
}

/// Wall-clock timestamp stamped on every process event
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Emit a tracing event at `$level` tagged with the process and a timestamp
#[doc(hidden)]
#[macro_export]
macro_rules! process_event {
    ($level:ident, $process_id:expr, $($arg:tt)*) => {
        tracing::$level!(
            process = %$process_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        )
    };
}

#[macro_export]
macro_rules! process_info {
    ($process_id:expr, $($arg:tt)*) => {
        $crate::process_event!(info, $process_id, $($arg)*)
    };
}

#[macro_export]
macro_rules! process_warn {
    ($process_id:expr, $($arg:tt)*) => {
        $crate::process_event!(warn, $process_id, $($arg)*)
    };
}

#[macro_export]
macro_rules! process_error {
    ($process_id:expr, $($arg:tt)*) => {
        $crate::process_event!(error, $process_id, $($arg)*)
    };
}

#[macro_export]
macro_rules! process_debug {
    ($process_id:expr, $($arg:tt)*) => {
        $crate::process_event!(debug, $process_id, $($arg)*)
    };
}

pub fn log_startup(process_id: &ProcessId, details: &str) {
    crate::process_info!(process_id, "🚀 Starting {}", details);
}

pub fn log_shutdown(process_id: &ProcessId, reason: &str) {
    crate::process_info!(process_id, "🛑 Shutting down: {}", reason);
}

/// Error event with the error also recorded as a structured field
pub fn log_error(process_id: &ProcessId, context: &str, error: &dyn std::fmt::Display) {
    crate::process_error!(process_id, error = %error, "❌ {} failed: {}", context, error);
}

pub fn log_success(process_id: &ProcessId, message: &str) {
    crate::process_info!(process_id, "✅ {}", message);
}

pub fn log_progress(process_id: &ProcessId, action: &str, details: &str) {
    crate::process_info!(process_id, "📋 {}: {}", action, details);
}
