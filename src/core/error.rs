//! Error types for the staged pipeline engine.
//!
//! Two kinds of failure exist. [`Error`] is an engine-level condition
//! (a submit into a closed stage, cancellation, bad configuration) and is
//! returned to whoever made the call. [`Fault`] is an item-level failure:
//! it is produced where a stage function failed and then rides through the
//! rest of the pipeline inside an [`Outcome`](crate::core::Outcome).

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Boxed error accepted from stage functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for the pipeline engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The stage has begun draining and no longer accepts input
    #[error("stage '{stage}' is closed to new input")]
    Closed { stage: String },

    /// Cancellation was requested on the shared token
    #[error("pipeline was cancelled")]
    Cancelled,

    /// A stage was configured with values it cannot run with
    #[error("invalid stage configuration: {0}")]
    InvalidConfig(String),

    /// A custom error with a message
    #[error("{0}")]
    Custom(String),
}

// Convenience constructors
impl Error {
    /// Create a closed error for the named stage
    pub fn closed<S: Into<String>>(stage: S) -> Self {
        Error::Closed {
            stage: stage.into(),
        }
    }

    /// Create a custom error with a message
    pub fn custom<S: Into<String>>(message: S) -> Self {
        Error::Custom(message.into())
    }

    /// Whether this error is the result of cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

/// An item-level failure: where it happened and what caused it.
///
/// A fault is attached once, at the stage whose function failed, and is
/// never rewritten by the stages after it.
#[derive(Clone)]
pub struct Fault {
    context: String,
    cause: Arc<dyn std::error::Error + Send + Sync + 'static>,
}

impl Fault {
    /// Create a fault from a context description and any error
    pub fn new<C, E>(context: C, cause: E) -> Self
    where
        C: Into<String>,
        E: Into<BoxError>,
    {
        Self {
            context: context.into(),
            cause: Arc::from(cause.into()),
        }
    }

    /// Create a fault from a caught panic payload
    pub(crate) fn panicked<C: Into<String>>(context: C, payload: &(dyn Any + Send)) -> Self {
        let message = panic_message(payload);
        Self::new(
            context,
            Error::custom(format!("stage function panicked: {}", message)),
        )
    }

    /// What was being done when the failure happened
    pub fn context(&self) -> &str {
        &self.context
    }

    /// The underlying error
    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.cause.as_ref()
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault")
            .field("context", &self.context)
            .field("cause", &self.cause.to_string())
            .finish()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.cause)
    }
}

impl std::error::Error for Fault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
