//! The service's logging capability.
//!
//! Most of the crate logs through `tracing` directly. [`AuthService`]
//! additionally takes an [`EventLog`] for the failures an operator has
//! to act on (a rolled-back account deletion, a store that stopped
//! answering). Injecting it lets tests assert those reports happened.
//!
//! [`AuthService`]: crate::AuthService

use std::sync::Arc;

/// Severity of an [`EventLog`] entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Narrow logging sink: a level, a message, and key/value context.
pub trait EventLog: Send + Sync + 'static {
    fn log(&self, level: LogLevel, message: &str, context: &[(&'static str, String)]);
}

/// Forwards entries to `tracing`, rendering the context as one field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl EventLog for TracingLog {
    fn log(&self, level: LogLevel, message: &str, context: &[(&'static str, String)]) {
        let context = render(context);
        match level {
            LogLevel::Debug => tracing::debug!(%context, "{message}"),
            LogLevel::Info => tracing::info!(%context, "{message}"),
            LogLevel::Warn => tracing::warn!(%context, "{message}"),
            LogLevel::Error => tracing::error!(%context, "{message}"),
        }
    }
}

impl<L: EventLog> EventLog for Arc<L> {
    fn log(&self, level: LogLevel, message: &str, context: &[(&'static str, String)]) {
        (**self).log(level, message, context);
    }
}

fn render(context: &[(&'static str, String)]) -> String {
    context
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}
