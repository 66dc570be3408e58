//! Signal handlers.
//!
//! # Responsibilities
//! - Define the handler contract invoked by the router
//! - Provide a closure adapter for ad hoc handlers
//!
//! # Design Decisions
//! - Handlers are synchronous and expected to finish quickly
//! - A handler reports failure through `HandlerError`; the router logs it and
//!   moves on to the next handler in the chain

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::feed::{SignalNotification, ValueMismatch};
use crate::sink::SinkError;

/// Failure of a single handler invocation.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The notification carried a variant this handler does not accept.
    #[error(transparent)]
    Value(#[from] ValueMismatch),

    /// The value has the right type but cannot be interpreted.
    #[error("value out of range: {0}")]
    OutOfRange(String),

    /// Forwarding to the metric sink failed.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Receives routed notifications for one or more signals.
pub trait SignalHandler: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &str;

    /// Process one notification.
    fn handle(&self, notification: &SignalNotification) -> Result<(), HandlerError>;
}

/// Ordered handlers of one signal.
pub type HandlerChain = Vec<Arc<dyn SignalHandler>>;

/// Handler backed by a closure.
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&SignalNotification) -> Result<(), HandlerError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> SignalHandler for FnHandler<F>
where
    F: Fn(&SignalNotification) -> Result<(), HandlerError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, notification: &SignalNotification) -> Result<(), HandlerError> {
        (self.f)(notification)
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}

/// Wrap a closure as a shareable handler.
pub fn handler_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn SignalHandler>
where
    F: Fn(&SignalNotification) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(FnHandler::new(name, f))
}
