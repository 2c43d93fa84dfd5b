//! Trigger sources that feed a pipeline's entry point.
//!
//! Sources own no pipeline state. They only call [`Entry::submit`] and stop
//! at the first submission the pipeline refuses.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::{Error, Result};
use crate::pipeline::Entry;

/// Submits the current time immediately and then once per interval until
/// cancelled.
///
/// Each submission waits for the pipeline to accept it, so a backed-up
/// pipeline delays the following ticks rather than bursting them.
pub struct IntervalSource {
    interval: Duration,
}

impl IntervalSource {
    /// Create a new interval source. The interval must be non-zero.
    pub fn new(interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::InvalidConfig(
                "trigger interval must be greater than zero".to_string(),
            ));
        }
        Ok(Self { interval })
    }

    /// Feed `entry` until `token` is cancelled or a submission is refused.
    /// Returns how many submissions were accepted.
    pub async fn run(self, entry: Entry<DateTime<Utc>>, token: CancellationToken) -> usize {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(ticker);
        let mut accepted = 0;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                tick = ticks.next() => if tick.is_none() { break },
            }

            let now = Utc::now();
            match entry.submit(now).await {
                Ok(()) => {
                    accepted += 1;
                    debug!(%now, accepted, "submitted computation");
                }
                Err(Error::Cancelled) => break,
                Err(e) => {
                    warn!(error = %e, "pipeline refused submission, stopping trigger");
                    break;
                }
            }
        }
        accepted
    }
}

/// Submits a fixed sequence of items, one after another.
pub struct IterSource<I> {
    items: I,
}

impl<I> IterSource<I>
where
    I: IntoIterator,
    I::Item: Send + 'static,
{
    /// Create a new iterator source
    pub fn new(items: I) -> Self {
        Self { items }
    }

    /// Submit every item, stopping at the first refusal. Returns how many
    /// submissions were accepted.
    pub async fn run(self, entry: &Entry<I::Item>) -> usize {
        let mut accepted = 0;
        for item in self.items {
            match entry.submit(item).await {
                Ok(()) => accepted += 1,
                Err(e) => {
                    debug!(error = %e, accepted, "source stopped");
                    break;
                }
            }
        }
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Completion, Pipeline, StageConfig};
    use crate::sinks::CollectSink;

    #[tokio::test]
    async fn iter_source_submits_in_order() {
        let collector = CollectSink::new();
        let pipeline = Pipeline::builder(CancellationToken::new())
            .sink(StageConfig::new("collect").bounded(1), collector.clone())
            .expect("valid pipeline");

        let accepted = IterSource::new(vec![3, 1, 2]).run(pipeline.entry()).await;
        assert_eq!(accepted, 3);
        assert_eq!(pipeline.shutdown().await, Completion::Completed);
        assert_eq!(collector.values().await, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn iter_source_stops_when_closed() {
        let pipeline = Pipeline::builder(CancellationToken::new())
            .sink(StageConfig::new("collect"), CollectSink::new())
            .expect("valid pipeline");
        pipeline.signal_no_more_input();

        let accepted = IterSource::new(0..10).run(pipeline.entry()).await;
        assert_eq!(accepted, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_source_ticks_immediately_then_periodically() {
        let token = CancellationToken::new();
        let collector = CollectSink::new();
        let pipeline = Pipeline::builder(token.clone())
            .sink(StageConfig::new("collect"), collector.clone())
            .expect("valid pipeline");

        let trigger = tokio::spawn(
            IntervalSource::new(Duration::from_secs(60))
                .expect("non-zero interval")
                .run(pipeline.entry().clone(), token.clone()),
        );

        // First tick is immediate, then at 60s and 120s.
        tokio::time::sleep(Duration::from_secs(150)).await;
        token.cancel();

        let accepted = trigger.await.expect("trigger task");
        assert_eq!(accepted, 3);
        assert_eq!(pipeline.completion().await, Completion::Cancelled);
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(matches!(
            IntervalSource::new(Duration::ZERO),
            Err(Error::InvalidConfig(_))
        ));
        assert!(IntervalSource::new(Duration::from_millis(1)).is_ok());
    }
}
