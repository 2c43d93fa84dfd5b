//! # Staged pipeline execution engine
//!
//! This crate chains bounded, concurrently-running stages into a single
//! pipeline, and uses it to compute a periodic day-ahead power position
//! report.
//!
//! ## Core Concepts
//!
//! - **Outcome**: the result carrier flowing between stages; a fault at one
//!   stage short-circuits every later stage function for that item
//! - **Stage**: a bounded queue worked by one or more workers
//! - **Backpressure**: a full stage suspends whoever submits into it
//! - **Pipeline**: a single chain of stages with one entry and one completion
//! - **Cancellation**: a shared token every stage observes between items
//!
//! ## Example
//!
//! ```rust
//! use powerflow::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let collector = CollectSink::new();
//!     let pipeline = Pipeline::builder(CancellationToken::new())
//!         .stage(StageConfig::new("double").bounded(2), MapProcessor::new(|x: i64| x * 2))
//!         .stage(StageConfig::new("add-one").bounded(2), MapProcessor::new(|y: i64| y + 1))
//!         .sink(StageConfig::new("collect").bounded(2), collector.clone())?;
//!
//!     for x in 1..=5 {
//!         pipeline.submit(x).await?;
//!     }
//!     pipeline.shutdown().await;
//!     assert_eq!(collector.values().await, vec![3, 5, 7, 9, 11]);
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod pipeline;
pub mod position;
pub mod processors;
pub mod sinks;
pub mod sources;
pub mod util;

// Re-export commonly used items
pub mod prelude {
    pub use crate::core::{BoxError, Error, Fault, Outcome, Processor, Result, Sink};
    pub use crate::pipeline::{
        Capacity, Completion, Entry, Pipeline, PipelineBuilder, Stage, StageConfig, StageHandle,
        StageState,
    };
    pub use crate::processors::{
        BlockingProcessor, MapProcessor, NoOpProcessor, ProcessorExt, TryMapProcessor,
    };
    pub use crate::sinks::{CollectSink, CountSink, LogSink};
    pub use crate::sources::{IntervalSource, IterSource};
    pub use crate::util::{cancel_after, processor_from_fn, sink_from_fn, CancellableExt};
    pub use tokio_util::sync::CancellationToken;
}

// Re-export main error type
pub use crate::core::{Error, Result};

// Feature flags for optional dependencies
#[cfg(feature = "metrics")]
pub mod metrics;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
