//! # Observer fan-out.
//!
//! [`ObserverSet`] holds one kind of observer and notifies all of them
//! concurrently, awaiting every notification before returning.
//!
//! **Warning**: `AssertUnwindSafe` is used when polling observers; an observer
//! that panics while holding a lock on its own shared state may leave it
//! inconsistent.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};

use super::observer::{ReceiveEndpointObserver, ReceiveObserver};
use crate::context::ReceiveContext;
use crate::endpoint::{ReceiveEndpointCompleted, ReceiveEndpointFaulted, ReceiveEndpointReady};
use crate::error::PipeError;

/// Registered observers of one kind.
pub struct ObserverSet<O: ?Sized> {
    observers: Vec<Arc<O>>,
}

impl<O: ?Sized> ObserverSet<O> {
    pub fn new(observers: Vec<Arc<O>>) -> Self {
        Self { observers }
    }

    pub fn push(&mut self, observer: Arc<O>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl<O: ?Sized> Default for ObserverSet<O> {
    fn default() -> Self {
        Self {
            observers: Vec::new(),
        }
    }
}

impl<O: ?Sized> Clone for ObserverSet<O> {
    fn clone(&self) -> Self {
        Self {
            observers: self.observers.clone(),
        }
    }
}

impl<O: ?Sized> fmt::Debug for ObserverSet<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverSet")
            .field("len", &self.observers.len())
            .finish()
    }
}

impl ObserverSet<dyn ReceiveEndpointObserver> {
    pub async fn ready(&self, event: &ReceiveEndpointReady) {
        fan_out(self.observers.iter().map(|o| (o.name(), o.ready(event)))).await;
    }

    pub async fn completed(&self, event: &ReceiveEndpointCompleted) {
        fan_out(self.observers.iter().map(|o| (o.name(), o.completed(event)))).await;
    }

    pub async fn faulted(&self, event: &ReceiveEndpointFaulted) {
        fan_out(self.observers.iter().map(|o| (o.name(), o.faulted(event)))).await;
    }
}

impl ObserverSet<dyn ReceiveObserver> {
    pub async fn pre_receive(&self, ctx: &ReceiveContext) {
        if self.observers.is_empty() {
            return;
        }
        fan_out(self.observers.iter().map(|o| (o.name(), o.pre_receive(ctx)))).await;
    }

    pub async fn post_receive(&self, ctx: &ReceiveContext) {
        if self.observers.is_empty() {
            return;
        }
        fan_out(self.observers.iter().map(|o| (o.name(), o.post_receive(ctx)))).await;
    }

    pub async fn receive_fault(&self, ctx: &ReceiveContext, error: &PipeError) {
        fan_out(
            self.observers
                .iter()
                .map(|o| (o.name(), o.receive_fault(ctx, error))),
        )
        .await;
    }
}

async fn fan_out<'a, I>(notifications: I)
where
    I: Iterator<Item = (&'a str, BoxFuture<'a, ()>)>,
{
    let guarded = notifications.map(|(name, fut)| async move {
        if let Err(panic) = AssertUnwindSafe(fut).catch_unwind().await {
            tracing::warn!(observer = name, info = %panic_info(&*panic), "observer panicked");
        }
    });
    join_all(guarded).await;
}

pub(crate) fn panic_info(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use url::Url;

    use super::*;

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl ReceiveEndpointObserver for Counting {
        async fn ready(&self, _: &ReceiveEndpointReady) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    struct Panicking;

    #[async_trait]
    impl ReceiveEndpointObserver for Panicking {
        async fn ready(&self, _: &ReceiveEndpointReady) {
            panic!("observer bug");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    #[tokio::test]
    async fn test_panicking_observer_does_not_affect_others() {
        let hits = Arc::new(AtomicUsize::new(0));
        let set: ObserverSet<dyn ReceiveEndpointObserver> = ObserverSet::new(vec![
            Arc::new(Counting(Arc::clone(&hits))),
            Arc::new(Panicking),
            Arc::new(Counting(Arc::clone(&hits))),
        ]);

        let event = ReceiveEndpointReady {
            input_address: Url::parse("loopback://localhost/input").unwrap(),
        };
        set.ready(&event).await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panic_info() {
        let p: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_info(&*p), "boom");
        let p: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_info(&*p), "bang");
        let p: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_info(&*p), "non-string panic payload");
    }
}
