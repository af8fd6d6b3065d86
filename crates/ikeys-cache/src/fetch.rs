//! The fetch operation a cache memoizes.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

/// A keyed fetch bound to a cache at construction time.
///
/// `Args` carries whatever the fetch needs beyond the cache key; the cache
/// passes it through untouched on a miss.
#[async_trait]
pub trait Fetch: Send + Sync {
    type Args: Send + 'static;
    type Value: Clone + Send + Sync + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    async fn fetch(&self, args: Self::Args) -> Result<Self::Value, Self::Error>;
}

/// Adapter turning an async closure into a [`Fetch`].
pub struct FnFetch<F, A> {
    f: F,
    _args: PhantomData<fn(A)>,
}

/// Wrap `f` as a [`Fetch`].
pub fn fetch_fn<F, A>(f: F) -> FnFetch<F, A> {
    FnFetch {
        f,
        _args: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, A, V, E> Fetch for FnFetch<F, A>
where
    F: Fn(A) -> Fut + Send + Sync,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
    A: Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    type Args = A;
    type Value = V;
    type Error = E;

    async fn fetch(&self, args: A) -> Result<V, E> {
        (self.f)(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[tokio::test]
    async fn test_fn_fetch_calls_closure() {
        let doubler = fetch_fn(|n: u32| async move { Ok::<_, Infallible>(n * 2) });
        assert_eq!(doubler.fetch(21).await.unwrap(), 42);
    }
}
