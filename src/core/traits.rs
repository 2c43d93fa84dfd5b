//! Stage function traits.
//!
//! A pipeline is a chain of transform stages, each running a [`Processor`],
//! ending in a terminal stage that hands every [`Outcome`] to a [`Sink`].
//! One instance of each is shared by all of a stage's workers, so both
//! traits take `&self`.

use async_trait::async_trait;

use crate::core::error::BoxError;
use crate::core::outcome::Outcome;

/// A processor transforms one item into one output item.
///
/// Errors and panics raised by `process` are captured by the stage and
/// turned into an [`Outcome::Err`]; they never escape a worker.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use powerflow::core::{BoxError, Processor};
///
/// struct DoubleProcessor;
///
/// #[async_trait]
/// impl Processor for DoubleProcessor {
///     type Input = i64;
///     type Output = i64;
///
///     async fn process(&self, item: i64) -> Result<i64, BoxError> {
///         Ok(item * 2)
///     }
/// }
/// ```
#[async_trait]
pub trait Processor: Send + Sync {
    /// The type of items this processor accepts
    type Input: Send + 'static;
    /// The type of items this processor produces
    type Output: Send + 'static;

    /// Transform a single item.
    async fn process(&self, item: Self::Input) -> Result<Self::Output, BoxError>;

    /// Describe the work about to be done on `item`.
    ///
    /// The description is logged and becomes the context of any fault
    /// raised while processing. `None` falls back to the stage name.
    fn describe(&self, _item: &Self::Input) -> Option<String> {
        None
    }
}

/// A sink is the terminal handler of a pipeline.
///
/// It observes every outcome, successful or not, and decides what to do
/// with faults (typically log and drop them).
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use powerflow::core::{BoxError, Outcome, Sink};
///
/// struct LogLineSink;
///
/// #[async_trait]
/// impl Sink for LogLineSink {
///     type Item = String;
///
///     async fn write(&self, outcome: Outcome<String>) -> Result<(), BoxError> {
///         match outcome {
///             Outcome::Ok(line) => println!("{}", line),
///             Outcome::Err(fault) => eprintln!("dropped: {}", fault),
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Sink: Send + Sync {
    /// The type of items this sink accepts
    type Item: Send + 'static;

    /// Handle one outcome.
    async fn write(&self, outcome: Outcome<Self::Item>) -> Result<(), BoxError>;

    /// Called once after the last outcome when the pipeline completes
    /// normally. Not called on cancellation.
    async fn finish(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Describe the work about to be done on a successful `item`.
    fn describe(&self, _item: &Self::Item) -> Option<String> {
        None
    }
}
