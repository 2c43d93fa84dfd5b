//! Pipeline orchestration and execution.
//!
//! A [`Pipeline`] is a single chain of stages: zero or more transform
//! stages followed by one terminal sink stage. It exposes one entry point
//! ([`Entry::submit`]) and one completion future ([`Pipeline::completion`]).
//! New items may be submitted at any time while earlier ones are still in
//! flight.

mod queue;
mod stage;

pub use queue::Capacity;
pub use stage::{Stage, StageConfig, StageHandle, StageState};

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::core::{Error, Outcome, Processor, Result, Sink};
use stage::StageMonitor;

/// How a pipeline finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Completion {
    /// Every stage drained and completed
    Completed,
    /// Cancellation was requested before the pipeline drained
    Cancelled,
}

impl Completion {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Completion::Cancelled)
    }
}

/// The single injection point of a pipeline.
pub struct Entry<T> {
    stage: StageHandle<T>,
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            stage: self.stage.clone(),
        }
    }
}

impl<T: Send + 'static> Entry<T> {
    /// Submit a new item, suspending while the first stage is at capacity.
    pub async fn submit(&self, item: T) -> Result<()> {
        self.stage.submit(Outcome::Ok(item)).await
    }

    /// Tell the first stage no more input is coming.
    pub fn signal_no_more_input(&self) {
        self.stage.signal_no_more_input();
    }

    /// Name of the first stage
    pub fn name(&self) -> &str {
        self.stage.name()
    }
}

type Link<T, U> =
    Box<dyn FnOnce(StageHandle<U>, &mut Vec<StageMonitor>) -> Result<StageHandle<T>> + Send>;

/// Builds a [`Pipeline`] stage by stage, left to right.
///
/// `T` is the type submitted at the entry and `U` the output type of the
/// last stage added so far. Stages are started when [`PipelineBuilder::sink`]
/// closes the chain.
pub struct PipelineBuilder<T, U> {
    token: CancellationToken,
    link: Link<T, U>,
    invalid: Option<Error>,
}

impl<T: Send + 'static> PipelineBuilder<T, T> {
    /// Start a pipeline whose stages all observe `token`.
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            link: Box::new(|first, _| Ok(first)),
            invalid: None,
        }
    }
}

impl<T: Send + 'static, U: Send + 'static> PipelineBuilder<T, U> {
    /// Append a transform stage.
    pub fn stage<P>(self, config: StageConfig, processor: P) -> PipelineBuilder<T, P::Output>
    where
        P: Processor<Input = U> + 'static,
    {
        let invalid = self.invalid.or_else(|| config.validate().err());
        let token = self.token.clone();
        let previous = self.link;

        PipelineBuilder {
            token: self.token,
            link: Box::new(move |downstream, monitors| {
                let handle = Stage::transform(config, token, processor, downstream)?;
                monitors.push(handle.monitor());
                previous(handle, monitors)
            }),
            invalid,
        }
    }

    /// Close the chain with a terminal sink stage and start every stage.
    pub fn sink<S>(self, config: StageConfig, sink: S) -> Result<Pipeline<T>>
    where
        S: Sink<Item = U> + 'static,
    {
        if let Some(e) = self.invalid {
            return Err(e);
        }
        config.validate()?;

        let mut stages = Vec::new();
        let last = Stage::sink(config, self.token.clone(), sink)?;
        stages.push(last.monitor());
        let first = (self.link)(last, &mut stages)?;
        stages.reverse();

        info!(
            stages = stages.len(),
            entry = %first.name(),
            "pipeline assembled"
        );
        Ok(Pipeline {
            entry: Entry { stage: first },
            stages,
            token: self.token,
        })
    }
}

/// A running chain of stages.
///
/// # Examples
///
/// ```rust
/// use powerflow::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let collector = CollectSink::new();
///     let pipeline = Pipeline::builder(CancellationToken::new())
///         .stage(StageConfig::new("double").bounded(2), MapProcessor::new(|x: i64| x * 2))
///         .sink(StageConfig::new("collect").bounded(2), collector.clone())?;
///
///     for x in 1..=3 {
///         pipeline.submit(x).await?;
///     }
///     assert_eq!(pipeline.shutdown().await, Completion::Completed);
///     assert_eq!(collector.values().await, vec![2, 4, 6]);
///     Ok(())
/// }
/// ```
pub struct Pipeline<T> {
    entry: Entry<T>,
    stages: Vec<StageMonitor>,
    token: CancellationToken,
}

impl<T: Send + 'static> Pipeline<T> {
    /// Start building a pipeline whose stages all observe `token`
    pub fn builder(token: CancellationToken) -> PipelineBuilder<T, T> {
        PipelineBuilder::new(token)
    }

    /// The entry point, cloneable for use by trigger tasks
    pub fn entry(&self) -> &Entry<T> {
        &self.entry
    }

    /// Submit an item at the entry
    pub async fn submit(&self, item: T) -> Result<()> {
        self.entry.submit(item).await
    }

    /// Tell the first stage no more input is coming
    pub fn signal_no_more_input(&self) {
        self.entry.signal_no_more_input();
    }

    /// Request cancellation without waiting for workers to stop
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Name and state of every stage, in chain order
    pub fn stage_states(&self) -> Vec<(String, StageState)> {
        self.stages
            .iter()
            .map(|stage| (stage.name.clone(), stage.state()))
            .collect()
    }

    /// Wait until every stage has stopped.
    ///
    /// Resolves once the sink stage and all stages before it have reached
    /// `Completed` or `Cancelled`.
    pub async fn completion(&self) -> Completion {
        let states = join_all(self.stages.iter().map(StageMonitor::completion)).await;
        let completion = if states.iter().any(|s| *s == StageState::Cancelled) {
            Completion::Cancelled
        } else {
            Completion::Completed
        };
        info!(?completion, "pipeline finished");
        completion
    }

    /// Stop accepting input, drain every stage and wait for completion
    pub async fn shutdown(&self) -> Completion {
        self.signal_no_more_input();
        self.completion().await
    }
}
