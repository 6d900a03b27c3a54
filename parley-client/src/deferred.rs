//! Deferred results returned by client commands

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{self, BoxFuture, FutureExt};
use parley_utils::Result;

/// A value that arrives once the server answers a command
///
/// Awaiting never blocks the connection's reader task. Wrap it in
/// `tokio::time::timeout` to bound the wait.
#[must_use = "a deferred result does nothing unless awaited"]
pub struct Deferred<T> {
    inner: BoxFuture<'static, Result<T>>,
}

impl<T: Send + 'static> Deferred<T> {
    pub fn new<F>(fut: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self { inner: fut.boxed() }
    }

    /// An already-completed result
    pub fn ready(result: Result<T>) -> Self {
        Self::new(future::ready(result))
    }

    /// Transform the value once it arrives
    pub fn map<U, F>(self, f: F) -> Deferred<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        Deferred::new(self.inner.map(|result| result.map(f)))
    }
}

impl<T> Future for Deferred<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").finish_non_exhaustive()
    }
}
