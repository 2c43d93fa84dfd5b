//! Processor implementations for the powerflow library.
//!
//! This module provides concrete processors built from plain functions,
//! for the common case where a stage function needs no state of its own.

pub mod combinators;

use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::core::{BoxError, Error, Processor};

pub use combinators::{ProcessorExt, WithContext};

/// A processor that maps items using an infallible function.
pub struct MapProcessor<F, T, U> {
    f: F,
    _phantom: PhantomData<fn(T) -> U>,
}

impl<F, T, U> MapProcessor<F, T, U> {
    /// Create a new map processor
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, T, U> Processor for MapProcessor<F, T, U>
where
    F: Fn(T) -> U + Send + Sync + 'static,
    T: Send + 'static,
    U: Send + 'static,
{
    type Input = T;
    type Output = U;

    async fn process(&self, item: Self::Input) -> Result<Self::Output, BoxError> {
        Ok((self.f)(item))
    }
}

/// A processor that maps items using a fallible function.
///
/// An `Err` returned by the function becomes a fault on that item only.
pub struct TryMapProcessor<F, T, U, E> {
    f: F,
    _phantom: PhantomData<fn(T) -> Result<U, E>>,
}

impl<F, T, U, E> TryMapProcessor<F, T, U, E> {
    /// Create a new try-map processor
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, T, U, E> Processor for TryMapProcessor<F, T, U, E>
where
    F: Fn(T) -> Result<U, E> + Send + Sync + 'static,
    T: Send + 'static,
    U: Send + 'static,
    E: Into<BoxError> + 'static,
{
    type Input = T;
    type Output = U;

    async fn process(&self, item: Self::Input) -> Result<Self::Output, BoxError> {
        (self.f)(item).map_err(Into::into)
    }
}

/// A processor that runs a blocking function on Tokio's blocking pool.
///
/// Use this for stage functions doing synchronous I/O so they do not stall
/// the workers of other stages.
pub struct BlockingProcessor<F, T, U, E> {
    f: Arc<F>,
    _phantom: PhantomData<fn(T) -> Result<U, E>>,
}

impl<F, T, U, E> BlockingProcessor<F, T, U, E> {
    /// Create a new blocking processor
    pub fn new(f: F) -> Self {
        Self {
            f: Arc::new(f),
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, T, U, E> Processor for BlockingProcessor<F, T, U, E>
where
    F: Fn(T) -> Result<U, E> + Send + Sync + 'static,
    T: Send + 'static,
    U: Send + 'static,
    E: Into<BoxError> + 'static,
{
    type Input = T;
    type Output = U;

    async fn process(&self, item: Self::Input) -> Result<Self::Output, BoxError> {
        let f = self.f.clone();
        match tokio::task::spawn_blocking(move || f(item).map_err(Into::into)).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(Box::new(Error::custom(format!(
                "blocking stage function panicked: {}",
                crate::core::error::panic_message(e.into_panic().as_ref())
            )))),
            Err(e) => Err(Box::new(e)),
        }
    }
}

/// A processor that passes items through unchanged
pub struct NoOpProcessor<T> {
    _phantom: PhantomData<fn(T) -> T>,
}

impl<T> NoOpProcessor<T> {
    /// Create a new no-op processor
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Processor for NoOpProcessor<T> {
    type Input = T;
    type Output = T;

    async fn process(&self, item: Self::Input) -> Result<Self::Output, BoxError> {
        Ok(item)
    }
}

impl<T> Default for NoOpProcessor<T> {
    fn default() -> Self {
        Self::new()
    }
}
