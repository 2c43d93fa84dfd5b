//! Combinators for processors.

use async_trait::async_trait;

use crate::core::{BoxError, Processor};

/// Extension trait for processors that provides combinator methods
pub trait ProcessorExt: Processor {
    /// Describe each item with `describe`, overriding the processor's own
    /// description. The description becomes the context of any fault.
    fn with_context<D>(self, describe: D) -> WithContext<Self, D>
    where
        Self: Sized,
        D: Fn(&Self::Input) -> String + Send + Sync,
    {
        WithContext {
            inner: self,
            describe,
        }
    }
}

impl<P: Processor> ProcessorExt for P {}

/// A processor with a custom item description
pub struct WithContext<P, D> {
    inner: P,
    describe: D,
}

#[async_trait]
impl<P, D> Processor for WithContext<P, D>
where
    P: Processor,
    D: Fn(&P::Input) -> String + Send + Sync,
{
    type Input = P::Input;
    type Output = P::Output;

    async fn process(&self, item: Self::Input) -> Result<Self::Output, BoxError> {
        self.inner.process(item).await
    }

    fn describe(&self, item: &Self::Input) -> Option<String> {
        Some((self.describe)(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::MapProcessor;

    #[tokio::test]
    async fn with_context_overrides_description() {
        let p = MapProcessor::new(|x: u32| x + 1).with_context(|x| format!("adding one to {}", x));
        assert_eq!(p.describe(&6).as_deref(), Some("adding one to 6"));
        assert_eq!(p.process(6).await.expect("mapped"), 7);
    }
}
