//! Sink implementations for the powerflow library.
//!
//! A sink is the terminal handler of a pipeline: it sees every outcome and
//! decides what to do with faults.

use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use tracing::error;

use crate::core::{BoxError, Outcome, Sink};

/// A sink that collects every outcome into a vector.
///
/// Clones share the same storage, so keep a clone to inspect what the
/// pipeline produced.
pub struct CollectSink<T> {
    outcomes: Arc<TokioMutex<Vec<Outcome<T>>>>,
}

impl<T> CollectSink<T> {
    /// Create a new collect sink
    pub fn new() -> Self {
        Self {
            outcomes: Arc::new(TokioMutex::new(Vec::new())),
        }
    }

    /// Number of outcomes collected so far
    pub async fn len(&self) -> usize {
        self.outcomes.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.outcomes.lock().await.is_empty()
    }
}

impl<T: Clone> CollectSink<T> {
    /// Every outcome, in the order the sink received them
    pub async fn outcomes(&self) -> Vec<Outcome<T>> {
        self.outcomes.lock().await.clone()
    }

    /// Only the successful values, in order
    pub async fn values(&self) -> Vec<T> {
        self.outcomes
            .lock()
            .await
            .iter()
            .filter_map(|outcome| outcome.value().cloned())
            .collect()
    }
}

#[async_trait]
impl<T: Send + 'static> Sink for CollectSink<T> {
    type Item = T;

    async fn write(&self, outcome: Outcome<Self::Item>) -> Result<(), BoxError> {
        self.outcomes.lock().await.push(outcome);
        Ok(())
    }
}

impl<T> Default for CollectSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CollectSink<T> {
    fn clone(&self) -> Self {
        Self {
            outcomes: self.outcomes.clone(),
        }
    }
}

/// A sink that counts successful and failed outcomes
pub struct CountSink<T> {
    ok: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    _phantom: PhantomData<fn(T)>,
}

impl<T> CountSink<T> {
    /// Create a new count sink
    pub fn new() -> Self {
        Self {
            ok: Arc::new(AtomicUsize::new(0)),
            failed: Arc::new(AtomicUsize::new(0)),
            _phantom: PhantomData,
        }
    }

    /// Number of successful outcomes seen
    pub fn ok_count(&self) -> usize {
        self.ok.load(Ordering::SeqCst)
    }

    /// Number of faulted outcomes seen
    pub fn failed_count(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Send + 'static> Sink for CountSink<T> {
    type Item = T;

    async fn write(&self, outcome: Outcome<Self::Item>) -> Result<(), BoxError> {
        match outcome {
            Outcome::Ok(_) => self.ok.fetch_add(1, Ordering::SeqCst),
            Outcome::Err(_) => self.failed.fetch_add(1, Ordering::SeqCst),
        };
        Ok(())
    }
}

impl<T> Default for CountSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CountSink<T> {
    fn clone(&self) -> Self {
        Self {
            ok: self.ok.clone(),
            failed: self.failed.clone(),
            _phantom: PhantomData,
        }
    }
}

/// A sink that hands successful values to a function and logs and drops
/// faults.
pub struct LogSink<F, T> {
    f: F,
    _phantom: PhantomData<fn(T)>,
}

impl<F, T> LogSink<F, T> {
    /// Create a new log-and-drop sink
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, T, E> Sink for LogSink<F, T>
where
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<BoxError> + 'static,
    T: Send + 'static,
{
    type Item = T;

    async fn write(&self, outcome: Outcome<Self::Item>) -> Result<(), BoxError> {
        match outcome {
            Outcome::Ok(value) => (self.f)(value).await.map_err(Into::into),
            Outcome::Err(fault) => {
                error!(context = %fault.context(), cause = %fault.cause(), "dropping failed item");
                Ok(())
            }
        }
    }
}
