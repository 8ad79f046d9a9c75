//! Cold, single-value request handles.
//!
//! A [`Deferred`] describes one API call without performing it. It can be
//! consumed three ways, all backed by the same transport and decoder:
//!
//! - `.await` it directly;
//! - [`Deferred::subscribe`] for a cancellable one-item [`Stream`];
//! - [`Deferred::spawn`] with a completion callback, returning a [`Task`].
//!
//! Every subscription, spawn or await performs a fresh request.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::{FusedStream, Stream};

use crate::Result;
use crate::task::Task;

type Factory<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// A lazily executed API call producing a `T`.
pub struct Deferred<T> {
    factory: Factory<T>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<T> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Deferred<T> {
    pub(crate) fn new<F, Fut>(make: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            factory: Arc::new(move || make().boxed()),
        }
    }

    /// Transform the eventual value. Errors pass through unchanged.
    pub fn map<U, F>(self, f: F) -> Deferred<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let factory = self.factory;
        let f = Arc::new(f);
        Deferred::new(move || {
            let fut = factory();
            let f = Arc::clone(&f);
            async move { fut.await.map(|value| f(value)) }
        })
    }

    /// Start a new subscription.
    ///
    /// No request is made until the returned stream is first polled.
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            phase: Phase::Idle(Arc::clone(&self.factory)),
        }
    }

    /// Perform the request in the background and pass the result to
    /// `callback` exactly once, unless the returned [`Task`] is cancelled
    /// first.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn spawn<F>(&self, callback: F) -> Task
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        Task::spawn((self.factory)(), callback)
    }
}

impl<T: Send + 'static> IntoFuture for Deferred<T> {
    type Output = Result<T>;
    type IntoFuture = BoxFuture<'static, Result<T>>;

    fn into_future(self) -> Self::IntoFuture {
        (self.factory)()
    }
}

enum Phase<T> {
    Idle(Factory<T>),
    Running(BoxFuture<'static, Result<T>>),
    Done,
}

/// A single-use stream yielding at most one result.
///
/// Yields `Some(Ok(value))` or `Some(Err(error))`, then `None`. Dropping or
/// [cancelling](Subscription::cancel) it before completion abandons the
/// in-flight request.
pub struct Subscription<T> {
    phase: Phase<T>,
}

impl<T> Subscription<T> {
    /// Cancel the subscription. Later polls yield `None`.
    pub fn cancel(&mut self) {
        self.phase = Phase::Done;
    }

    /// Whether a request is currently in flight.
    pub fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Running(_))
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self.phase {
            Phase::Idle(_) => "idle",
            Phase::Running(_) => "running",
            Phase::Done => "done",
        };
        f.debug_struct("Subscription").field("phase", &phase).finish()
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match &mut this.phase {
                Phase::Idle(factory) => {
                    let fut = factory();
                    this.phase = Phase::Running(fut);
                }
                Phase::Running(fut) => {
                    let output = ready!(fut.as_mut().poll(cx));
                    this.phase = Phase::Done;
                    return Poll::Ready(Some(output));
                }
                Phase::Done => return Poll::Ready(None),
            }
        }
    }
}

impl<T> FusedStream for Subscription<T> {
    fn is_terminated(&self) -> bool {
        matches!(self.phase, Phase::Done)
    }
}
