//! Utility functions and helper types.

use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::warn;

use crate::core::{BoxError, Error, Outcome, Processor, Result, Sink};

/// Helper function to create a processor from an async function
pub fn processor_from_fn<F, Fut, T, U, E>(f: F) -> FnProcessor<F, T>
where
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<U, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
    T: Send + 'static,
    U: Send + 'static,
{
    FnProcessor {
        f,
        _phantom: PhantomData,
    }
}

/// A processor created from a function
pub struct FnProcessor<F, T> {
    f: F,
    _phantom: PhantomData<fn(T)>,
}

#[async_trait]
impl<F, Fut, T, U, E> Processor for FnProcessor<F, T>
where
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<U, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
    T: Send + 'static,
    U: Send + 'static,
{
    type Input = T;
    type Output = U;

    async fn process(&self, item: Self::Input) -> std::result::Result<Self::Output, BoxError> {
        (self.f)(item).await.map_err(Into::into)
    }
}

/// Helper function to create a sink from an async function.
///
/// The function receives every outcome, faults included.
pub fn sink_from_fn<F, Fut, T, E>(f: F) -> FnSink<F, T>
where
    F: Fn(Outcome<T>) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
    E: Into<BoxError> + 'static,
    T: Send + 'static,
{
    FnSink {
        f,
        _phantom: PhantomData,
    }
}

/// A sink created from a function
pub struct FnSink<F, T> {
    f: F,
    _phantom: PhantomData<fn(T)>,
}

#[async_trait]
impl<F, Fut, T, E> Sink for FnSink<F, T>
where
    F: Fn(Outcome<T>) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
    E: Into<BoxError> + 'static,
    T: Send + 'static,
{
    type Item = T;

    async fn write(&self, outcome: Outcome<Self::Item>) -> std::result::Result<(), BoxError> {
        (self.f)(outcome).await.map_err(Into::into)
    }
}

/// A future that gives up as soon as a cancellation token fires.
///
/// Long-running stage functions wrap their slow calls in this so a
/// cancelled pipeline does not wait for them.
pub struct Cancellable<F> {
    future: Pin<Box<F>>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl<F> Cancellable<F> {
    /// Create a new cancellable future
    pub fn new(future: F, token: CancellationToken) -> Self {
        Self {
            future: Box::pin(future),
            cancelled: Box::pin(token.cancelled_owned()),
        }
    }
}

impl<F: Future> Future for Cancellable<F> {
    type Output = Result<F::Output>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.cancelled.as_mut().poll(cx).is_ready() {
            return Poll::Ready(Err(Error::Cancelled));
        }
        self.future.as_mut().poll(cx).map(Ok)
    }
}

/// Extension trait for making futures cancellable
pub trait CancellableExt: Future + Sized {
    /// Make this future cancellable
    fn cancellable(self, token: CancellationToken) -> Cancellable<Self> {
        Cancellable::new(self, token)
    }
}

impl<F: Future> CancellableExt for F {}

/// Cancel `token` once `after` has elapsed, unless it is cancelled first.
///
/// The engine has no timeouts of its own; this is how a caller bounds a
/// run.
pub fn cancel_after(token: CancellationToken, after: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(after) => {
                warn!(?after, "deadline reached, cancelling pipeline");
                token.cancel();
            }
        }
    })
}
