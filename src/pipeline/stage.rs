//! A single bounded, concurrently-worked processing step.
//!
//! Each stage owns an input queue, `concurrency` worker tasks and a
//! supervisor task. Workers pull items, run the stage function and forward
//! the outcome downstream. The supervisor waits for every worker to exit,
//! publishes the final [`StageState`] and then tells the next stage that no
//! more input is coming. Completion therefore flows strictly downstream.

use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::error::panic_message;
use crate::core::{Error, Fault, Outcome, Processor, Result, Sink};
use crate::pipeline::queue::{BoundedQueue, Capacity};

/// Lifecycle of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StageState {
    /// Accepting and processing items
    Running,
    /// No more input will be accepted; queued items are being processed
    Draining,
    /// Every item was processed and all workers have exited
    Completed,
    /// Cancellation was observed; remaining items were discarded
    Cancelled,
}

impl StageState {
    /// Whether the stage has finished for good
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageState::Completed | StageState::Cancelled)
    }
}

/// Configuration for a single stage.
#[derive(Debug, Clone)]
pub struct StageConfig {
    /// Name used in logs, errors and fault contexts
    pub name: String,
    /// Maximum number of items queued or in flight
    pub capacity: Capacity,
    /// Number of parallel workers
    pub concurrency: usize,
}

impl StageConfig {
    /// Create a config with a single worker and an unbounded queue
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            capacity: Capacity::Unbounded,
            concurrency: 1,
        }
    }

    /// Bound the queue to `capacity` items
    pub fn bounded(mut self, capacity: usize) -> Self {
        self.capacity = Capacity::Bounded(capacity);
        self
    }

    /// Remove the bound on the queue
    pub fn unbounded(mut self) -> Self {
        self.capacity = Capacity::Unbounded;
        self
    }

    /// Set the number of workers
    pub fn concurrency(mut self, workers: usize) -> Self {
        self.concurrency = workers;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == Capacity::Bounded(0) {
            return Err(Error::InvalidConfig(format!(
                "stage '{}' needs a capacity of at least 1",
                self.name
            )));
        }
        if let Capacity::Bounded(n) = self.capacity {
            if n > Semaphore::MAX_PERMITS {
                return Err(Error::InvalidConfig(format!(
                    "stage '{}' capacity {} exceeds the maximum of {}",
                    self.name,
                    n,
                    Semaphore::MAX_PERMITS
                )));
            }
        }
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig(format!(
                "stage '{}' needs at least one worker",
                self.name
            )));
        }
        Ok(())
    }
}

/// The work a stage performs on each dequeued outcome.
#[async_trait]
pub(crate) trait StageWork: Send + Sync + 'static {
    type Input: Send + 'static;

    /// Handle one outcome. An error means the result could not be forwarded.
    async fn handle(&self, stage: &str, outcome: Outcome<Self::Input>) -> Result<()>;

    /// Called once after all workers exited without cancellation.
    async fn finish(&self, _stage: &str) {}

    /// Tell whatever sits downstream that no more input is coming.
    fn signal_downstream(&self) {}
}

struct Shared<T> {
    name: String,
    queue: BoundedQueue<Outcome<T>>,
    state: watch::Sender<StageState>,
    token: CancellationToken,
}

/// Handle to a running stage's input side.
///
/// Cloning the handle is cheap; every clone refers to the same stage.
pub struct StageHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for StageHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Send + 'static> StageHandle<T> {
    /// Enqueue an outcome, suspending while the stage is at capacity.
    ///
    /// Fails with [`Error::Cancelled`] once cancellation is requested and with
    /// [`Error::Closed`] once the stage has started draining.
    pub async fn submit(&self, outcome: Outcome<T>) -> Result<()> {
        let shared = &self.shared;
        if shared.token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if shared.queue.is_closed() {
            warn!(stage = %shared.name, "submit rejected: stage is closed");
            return Err(Error::closed(&shared.name));
        }

        tokio::select! {
            biased;
            _ = shared.token.cancelled() => Err(Error::Cancelled),
            pushed = shared.queue.push(outcome) => match pushed {
                Ok(()) => Ok(()),
                Err(_) if shared.token.is_cancelled() => Err(Error::Cancelled),
                Err(_) => {
                    warn!(stage = %shared.name, "submit rejected: stage is closed");
                    Err(Error::closed(&shared.name))
                }
            },
        }
    }

    /// Mark the input closed. Queued items are still processed; once they
    /// are, the stage completes and signals the next one.
    pub fn signal_no_more_input(&self) {
        let shared = &self.shared;
        let draining = shared.state.send_if_modified(|state| {
            if *state == StageState::Running {
                *state = StageState::Draining;
                true
            } else {
                false
            }
        });
        if draining {
            debug!(stage = %shared.name, queued = shared.queue.len(), "stage draining");
        }
        shared.queue.close();
    }
}

impl<T> StageHandle<T> {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Current lifecycle state
    pub fn state(&self) -> StageState {
        *self.shared.state.borrow()
    }

    /// Number of items waiting in the queue (not counting in-flight items)
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    /// Wait until the stage reaches `Completed` or `Cancelled`.
    pub async fn completion(&self) -> StageState {
        self.monitor().completion().await
    }

    pub(crate) fn monitor(&self) -> StageMonitor {
        StageMonitor {
            name: self.shared.name.clone(),
            state: self.shared.state.subscribe(),
        }
    }
}

/// Type-erased view of a stage's state, used by the pipeline.
#[derive(Clone)]
pub(crate) struct StageMonitor {
    pub(crate) name: String,
    state: watch::Receiver<StageState>,
}

impl StageMonitor {
    pub(crate) fn state(&self) -> StageState {
        *self.state.borrow()
    }

    pub(crate) async fn completion(&self) -> StageState {
        let mut state = self.state.clone();
        let reached = state.wait_for(StageState::is_terminal).await.map(|s| *s);
        match reached {
            Ok(terminal) => terminal,
            Err(_) => {
                let last = *state.borrow();
                last
            }
        }
    }
}

/// Constructors for the two kinds of stage.
///
/// Both spawn tasks and must be called from within a Tokio runtime.
pub struct Stage;

impl Stage {
    /// Start a transform stage running `processor` and forwarding every
    /// outcome to `downstream`.
    pub fn transform<P>(
        config: StageConfig,
        token: CancellationToken,
        processor: P,
        downstream: StageHandle<P::Output>,
    ) -> Result<StageHandle<P::Input>>
    where
        P: Processor + 'static,
    {
        spawn(
            config,
            token,
            Transform {
                processor,
                downstream,
            },
        )
    }

    /// Start a terminal stage handing every outcome to `sink`.
    pub fn sink<S>(
        config: StageConfig,
        token: CancellationToken,
        sink: S,
    ) -> Result<StageHandle<S::Item>>
    where
        S: Sink + 'static,
    {
        spawn(config, token, Terminal { sink })
    }
}

fn spawn<W: StageWork>(
    config: StageConfig,
    token: CancellationToken,
    work: W,
) -> Result<StageHandle<W::Input>> {
    config.validate()?;

    let (state, _) = watch::channel(StageState::Running);
    let shared = Arc::new(Shared {
        name: config.name.clone(),
        queue: BoundedQueue::new(config.capacity),
        state,
        token,
    });
    let work = Arc::new(work);

    let workers: Vec<JoinHandle<()>> = (0..config.concurrency)
        .map(|worker| tokio::spawn(run_worker(shared.clone(), work.clone(), worker)))
        .collect();
    tokio::spawn(supervise(shared.clone(), work, workers));

    info!(
        stage = %config.name,
        capacity = %config.capacity,
        concurrency = config.concurrency,
        "stage started"
    );
    Ok(StageHandle { shared })
}

async fn run_worker<W: StageWork>(shared: Arc<Shared<W::Input>>, work: Arc<W>, worker: usize) {
    loop {
        let slot = tokio::select! {
            biased;
            _ = shared.token.cancelled() => break,
            slot = shared.queue.pop() => match slot {
                Some(slot) => slot,
                None => break,
            },
        };

        let (outcome, permit) = slot.into_parts();
        if shared.token.is_cancelled() {
            drop(outcome);
            #[cfg(feature = "metrics")]
            crate::metrics::record_discarded(&shared.name, 1);
            break;
        }

        #[cfg(feature = "metrics")]
        crate::metrics::record_item(&shared.name);

        match work.handle(&shared.name, outcome).await {
            Ok(()) => {}
            Err(Error::Cancelled) => {
                debug!(stage = %shared.name, worker, "result dropped: pipeline cancelled");
            }
            Err(e) => {
                warn!(stage = %shared.name, worker, error = %e, "result dropped: downstream refused it");
            }
        }
        // The slot stays occupied until the result has been handed on.
        drop(permit);
    }

    if shared.token.is_cancelled() {
        let discarded = shared.queue.discard();
        if discarded > 0 {
            debug!(stage = %shared.name, worker, discarded, "discarded queued items on cancellation");
            #[cfg(feature = "metrics")]
            crate::metrics::record_discarded(&shared.name, discarded);
        }
    }
    debug!(stage = %shared.name, worker, "worker exited");
}

async fn supervise<W: StageWork>(
    shared: Arc<Shared<W::Input>>,
    work: Arc<W>,
    workers: Vec<JoinHandle<()>>,
) {
    let mut aborted = 0;
    for joined in join_all(workers).await {
        if let Err(e) = joined {
            error!(stage = %shared.name, error = %e, "stage worker aborted");
            aborted += 1;
        }
    }

    let finished = if shared.token.is_cancelled() {
        shared.queue.discard();
        StageState::Cancelled
    } else if aborted > 0 {
        // Nobody is left to work the queue, so it cannot drain.
        shared.queue.close();
        let discarded = shared.queue.discard();
        error!(stage = %shared.name, aborted, discarded, "stage lost its workers");
        #[cfg(feature = "metrics")]
        crate::metrics::record_discarded(&shared.name, discarded);
        StageState::Cancelled
    } else {
        if let Err(payload) = AssertUnwindSafe(work.finish(&shared.name))
            .catch_unwind()
            .await
        {
            error!(stage = %shared.name, panic = %panic_message(payload.as_ref()), "stage finish panicked");
        }
        StageState::Completed
    };
    shared.state.send_replace(finished);
    info!(stage = %shared.name, state = ?finished, "stage finished");

    work.signal_downstream();
}

/// Describe an item for logs and fault contexts. A panicking description
/// turns the item into a fault with the stage's default context.
fn describe_item<F>(fallback: String, describe: F) -> std::result::Result<String, Fault>
where
    F: FnOnce() -> Option<String>,
{
    match std::panic::catch_unwind(AssertUnwindSafe(describe)) {
        Ok(context) => Ok(context.unwrap_or(fallback)),
        Err(payload) => Err(Fault::panicked(fallback, payload.as_ref())),
    }
}

struct Transform<P: Processor> {
    processor: P,
    downstream: StageHandle<P::Output>,
}

#[async_trait]
impl<P> StageWork for Transform<P>
where
    P: Processor + 'static,
{
    type Input = P::Input;

    async fn handle(&self, stage: &str, outcome: Outcome<P::Input>) -> Result<()> {
        let originated_ok = outcome.is_ok();
        let (context, outcome) = match outcome {
            Outcome::Ok(item) => {
                let fallback = format!("processing item in stage '{}'", stage);
                match describe_item(fallback, || self.processor.describe(&item)) {
                    Ok(context) => (context, Outcome::Ok(item)),
                    Err(fault) => (fault.context().to_string(), Outcome::Err(fault)),
                }
            }
            Outcome::Err(fault) => (
                format!("skip {} due to error '{}'", stage, fault.context()),
                Outcome::Err(fault),
            ),
        };
        debug!(stage, "{}", context);

        let next = outcome
            .map_async(&context, |item| self.processor.process(item))
            .await;

        if originated_ok {
            if let Some(fault) = next.fault() {
                error!(stage, context = %fault.context(), cause = %fault.cause(), "stage function failed");
                #[cfg(feature = "metrics")]
                crate::metrics::record_fault(stage);
            }
        }

        self.downstream.submit(next).await
    }

    fn signal_downstream(&self) {
        self.downstream.signal_no_more_input();
    }
}

struct Terminal<S> {
    sink: S,
}

#[async_trait]
impl<S> StageWork for Terminal<S>
where
    S: Sink + 'static,
{
    type Input = S::Item;

    async fn handle(&self, stage: &str, outcome: Outcome<S::Item>) -> Result<()> {
        let (context, outcome) = match outcome {
            Outcome::Ok(item) => {
                let fallback = format!("handling item in stage '{}'", stage);
                match describe_item(fallback, || self.sink.describe(&item)) {
                    Ok(context) => (context, Outcome::Ok(item)),
                    Err(fault) => {
                        error!(stage, context = %fault.context(), cause = %fault.cause(), "describing item failed");
                        (fault.context().to_string(), Outcome::Err(fault))
                    }
                }
            }
            Outcome::Err(fault) => (
                format!("skip {} due to error '{}'", stage, fault.context()),
                Outcome::Err(fault),
            ),
        };
        debug!(stage, "{}", context);

        match AssertUnwindSafe(self.sink.write(outcome)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(stage, context = %context, error = %e, "sink failed to handle item");
                #[cfg(feature = "metrics")]
                crate::metrics::record_fault(stage);
            }
            Err(payload) => {
                error!(stage, context = %context, panic = %panic_message(payload.as_ref()), "sink panicked");
                #[cfg(feature = "metrics")]
                crate::metrics::record_fault(stage);
            }
        }
        Ok(())
    }

    async fn finish(&self, stage: &str) {
        if let Err(e) = self.sink.finish().await {
            error!(stage, error = %e, "sink failed to finish");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BoxError;
    use crate::sinks::CollectSink;
    use crate::util::processor_from_fn;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn rejects_zero_capacity_and_workers() {
        assert!(matches!(
            StageConfig::new("a").bounded(0).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            StageConfig::new("a").concurrency(0).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(StageConfig::new("a").bounded(1).concurrency(3).validate().is_ok());
    }

    #[tokio::test]
    async fn sink_stage_completes_after_drain() {
        let token = CancellationToken::new();
        let collector = CollectSink::new();
        let stage = Stage::sink(StageConfig::new("collect").bounded(2), token, collector.clone())
            .expect("valid config");

        for i in 0..5 {
            stage.submit(Outcome::ok(i)).await.expect("accepted");
        }
        stage.signal_no_more_input();
        assert!(matches!(
            stage.submit(Outcome::ok(99)).await,
            Err(Error::Closed { .. })
        ));

        assert_eq!(stage.completion().await, StageState::Completed);
        assert_eq!(collector.values().await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn transform_stage_forwards_and_signals_downstream() {
        let token = CancellationToken::new();
        let collector = CollectSink::new();
        let sink = Stage::sink(StageConfig::new("collect"), token.clone(), collector.clone())
            .expect("valid config");
        let double = Stage::transform(
            StageConfig::new("double").bounded(1),
            token,
            processor_from_fn(|x: u32| async move { Ok::<_, BoxError>(x * 2) }),
            sink.clone(),
        )
        .expect("valid config");

        for i in 1..=3 {
            double.submit(Outcome::ok(i)).await.expect("accepted");
        }
        double.signal_no_more_input();

        assert_eq!(double.completion().await, StageState::Completed);
        assert_eq!(sink.completion().await, StageState::Completed);
        assert_eq!(collector.values().await, vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn forwarded_fault_skips_processor() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let collector = CollectSink::new();
        let sink = Stage::sink(StageConfig::new("collect"), token.clone(), collector.clone())
            .expect("valid config");
        let counted = {
            let calls = calls.clone();
            processor_from_fn(move |x: u32| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, BoxError>(x) }
            })
        };
        let stage = Stage::transform(StageConfig::new("count"), token, counted, sink.clone())
            .expect("valid config");

        stage
            .submit(Outcome::err(Fault::new("fetch", "offline")))
            .await
            .expect("accepted");
        stage.signal_no_more_input();
        assert_eq!(sink.completion().await, StageState::Completed);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let outcomes = collector.outcomes().await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].fault().map(Fault::context), Some("fetch"));
    }

    #[tokio::test]
    async fn cancellation_rejects_submits_and_cancels_stage() {
        let token = CancellationToken::new();
        let stage = Stage::sink(
            StageConfig::new("collect").bounded(1),
            token.clone(),
            CollectSink::<u8>::new(),
        )
        .expect("valid config");

        token.cancel();
        assert!(matches!(
            stage.submit(Outcome::ok(1)).await,
            Err(Error::Cancelled)
        ));
        assert_eq!(stage.completion().await, StageState::Cancelled);
    }

    struct PanickyDescribe;

    #[async_trait]
    impl Processor for PanickyDescribe {
        type Input = u32;
        type Output = u32;

        async fn process(&self, item: u32) -> std::result::Result<u32, BoxError> {
            Ok(item)
        }

        fn describe(&self, item: &u32) -> Option<String> {
            if *item == 2 {
                panic!("cannot describe two");
            }
            Some(format!("passing {}", item))
        }
    }

    #[tokio::test]
    async fn panicking_describe_faults_only_that_item() {
        let token = CancellationToken::new();
        let collector = CollectSink::new();
        let sink = Stage::sink(StageConfig::new("collect"), token.clone(), collector.clone())
            .expect("valid config");
        let stage = Stage::transform(
            StageConfig::new("picky").bounded(4),
            token,
            PanickyDescribe,
            sink.clone(),
        )
        .expect("valid config");

        for i in 1..=3 {
            stage.submit(Outcome::ok(i)).await.expect("accepted");
        }
        stage.signal_no_more_input();

        assert_eq!(stage.completion().await, StageState::Completed);
        assert_eq!(sink.completion().await, StageState::Completed);
        let outcomes = collector.outcomes().await;
        assert_eq!(outcomes.len(), 3);
        assert_eq!(collector.values().await, vec![1, 3]);
        let fault = outcomes[1].fault().expect("second item faulted");
        assert!(fault.context().contains("picky"));
        assert!(fault.cause().to_string().contains("cannot describe two"));
    }

    struct FragileSink {
        seen: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Sink for FragileSink {
        type Item = u32;

        async fn write(&self, _outcome: Outcome<u32>) -> std::result::Result<(), BoxError> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn finish(&self) -> std::result::Result<(), BoxError> {
            if self.seen.load(Ordering::SeqCst) > 0 {
                panic!("finish blew up");
            }
            Ok(())
        }

        fn describe(&self, item: &u32) -> Option<String> {
            if *item == 1 {
                panic!("cannot describe one");
            }
            None
        }
    }

    #[tokio::test]
    async fn sink_panics_outside_write_still_complete() {
        let seen = Arc::new(AtomicUsize::new(0));
        let stage = Stage::sink(
            StageConfig::new("fragile").bounded(2),
            CancellationToken::new(),
            FragileSink { seen: seen.clone() },
        )
        .expect("valid config");

        for i in 0..3 {
            stage.submit(Outcome::ok(i)).await.expect("accepted");
        }
        stage.signal_no_more_input();

        let state = tokio::time::timeout(std::time::Duration::from_secs(5), stage.completion())
            .await
            .expect("completion resolves");
        assert_eq!(state, StageState::Completed);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn rejects_capacity_beyond_the_semaphore_limit() {
        let config = StageConfig::new("huge").bounded(usize::MAX);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        assert!(StageConfig::new("big")
            .bounded(Semaphore::MAX_PERMITS)
            .validate()
            .is_ok());
    }
}
