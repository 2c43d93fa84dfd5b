//! The result carrier threaded through every stage after the first.

use futures::FutureExt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use crate::core::error::{BoxError, Fault};

/// Either a successful payload or the fault that stopped it.
///
/// Once an item becomes [`Outcome::Err`], [`Outcome::map`] and
/// [`Outcome::map_async`] forward it untouched without calling the
/// supplied function, so later stages only ever pass it along.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// The item was computed successfully
    Ok(T),
    /// The item failed at some earlier stage
    Err(Fault),
}

impl<T> Outcome<T> {
    /// Wrap a successful value
    pub fn ok(value: T) -> Self {
        Outcome::Ok(value)
    }

    /// Wrap a fault
    pub fn err(fault: Fault) -> Self {
        Outcome::Err(fault)
    }

    /// Convert a `Result`, tagging any error with `context`
    pub fn from_result<E: Into<BoxError>>(
        context: &str,
        result: std::result::Result<T, E>,
    ) -> Self {
        match result {
            Ok(value) => Outcome::Ok(value),
            Err(e) => Outcome::Err(Fault::new(context, e)),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn is_err(&self) -> bool {
        matches!(self, Outcome::Err(_))
    }

    /// The successful value, if any
    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Ok(value) => Some(value),
            Outcome::Err(_) => None,
        }
    }

    /// The fault, if any
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Outcome::Ok(_) => None,
            Outcome::Err(fault) => Some(fault),
        }
    }

    pub fn as_ref(&self) -> Outcome<&T> {
        match self {
            Outcome::Ok(value) => Outcome::Ok(value),
            Outcome::Err(fault) => Outcome::Err(fault.clone()),
        }
    }

    pub fn into_result(self) -> std::result::Result<T, Fault> {
        match self {
            Outcome::Ok(value) => Ok(value),
            Outcome::Err(fault) => Err(fault),
        }
    }

    /// Apply a fallible function to a successful value.
    ///
    /// An error returned by `f`, or a panic inside it, becomes a fault tagged
    /// with `context`. An existing fault is returned as is and `f` is not called.
    pub fn map<U, E, F>(self, context: &str, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> std::result::Result<U, E>,
        E: Into<BoxError>,
    {
        match self {
            Outcome::Ok(value) => match panic::catch_unwind(AssertUnwindSafe(|| f(value))) {
                Ok(result) => Outcome::from_result(context, result),
                Err(payload) => Outcome::Err(Fault::panicked(context, payload.as_ref())),
            },
            Outcome::Err(fault) => Outcome::Err(fault),
        }
    }

    /// Async counterpart of [`Outcome::map`].
    pub async fn map_async<U, E, F, Fut>(self, context: &str, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = std::result::Result<U, E>>,
        E: Into<BoxError>,
    {
        match self {
            Outcome::Ok(value) => {
                match AssertUnwindSafe(async move { f(value).await })
                    .catch_unwind()
                    .await
                {
                    Ok(result) => Outcome::from_result(context, result),
                    Err(payload) => Outcome::Err(Fault::panicked(context, payload.as_ref())),
                }
            }
            Outcome::Err(fault) => Outcome::Err(fault),
        }
    }
}

impl<T> From<Fault> for Outcome<T> {
    fn from(fault: Fault) -> Self {
        Outcome::Err(fault)
    }
}
