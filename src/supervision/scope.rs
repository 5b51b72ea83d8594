//! # Supervised scope.
//!
//! A [`Scope`] is a named unit of supervised work with one-shot *Ready* and
//! *Completed* signals, a stop token, tracked in-flight work and child scopes.
//!
//! ## Lifecycle
//! ```text
//! Created ──set_ready()──► Ready ──complete(outcome)──► Completed
//!    └──────────────complete(Faulted)───────────────────────┘
//!
//! complete(outcome):
//!   ├─► stop()                    (children stop accepting work)
//!   ├─► tracker.close(); wait()   (tracked work + every child has completed)
//!   ├─► seal                      (create_scope/spawn now fail)
//!   ├─► run cleanup (once)
//!   └─► Completed.set(outcome)
//! ```
//!
//! ## Rules
//! - `set_ready` is idempotent and has no effect once the scope has completed.
//! - `complete` runs its drain on a detached task; dropping the returned future
//!   does not abandon the drain.
//! - A child holds a tracker token of its parent until the child completes (or
//!   is dropped), which is what keeps the parent from completing early.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TaskTrackerToken;

use super::signal::Signal;
use crate::error::ScopeError;

type Cleanup = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// How a scope's supervised work ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeOutcome {
    /// Work ended after a requested stop or natural completion.
    Clean,
    /// Work ended because of a fault (bind failure, lost connection, ...).
    Faulted(Arc<str>),
}

impl ScopeOutcome {
    /// Builds a faulted outcome.
    pub fn faulted(reason: impl Into<Arc<str>>) -> Self {
        ScopeOutcome::Faulted(reason.into())
    }

    /// True for [`ScopeOutcome::Faulted`].
    pub fn is_faulted(&self) -> bool {
        matches!(self, ScopeOutcome::Faulted(_))
    }

    /// Fault reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ScopeOutcome::Clean => None,
            ScopeOutcome::Faulted(r) => Some(r),
        }
    }
}

impl fmt::Display for ScopeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeOutcome::Clean => f.write_str("clean"),
            ScopeOutcome::Faulted(reason) => write!(f, "faulted: {reason}"),
        }
    }
}

/// Observable state of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Created,
    Ready,
    Completed,
}

struct Children {
    sealed: bool,
    list: Vec<Weak<ScopeInner>>,
}

struct ScopeInner {
    name: String,
    ready: Signal<()>,
    completed: Signal<ScopeOutcome>,
    stop: CancellationToken,
    tracker: TaskTracker,
    children: Mutex<Children>,
    cleanup: Mutex<Option<Cleanup>>,
    parent_token: Mutex<Option<TaskTrackerToken>>,
    completing: AtomicBool,
}

/// Handle to a supervised scope. Clones share the same scope.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    /// Creates a parentless scope.
    pub fn root(name: impl Into<String>) -> Self {
        Self::build(name.into(), CancellationToken::new(), None, None)
    }

    fn build(
        name: String,
        stop: CancellationToken,
        parent_token: Option<TaskTrackerToken>,
        cleanup: Option<Cleanup>,
    ) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                name,
                ready: Signal::new(),
                completed: Signal::new(),
                stop,
                tracker: TaskTracker::new(),
                children: Mutex::new(Children {
                    sealed: false,
                    list: Vec::new(),
                }),
                cleanup: Mutex::new(cleanup),
                parent_token: Mutex::new(parent_token),
                completing: AtomicBool::new(false),
            }),
        }
    }

    /// Diagnostic name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ScopeState {
        if self.inner.completed.is_set() {
            ScopeState::Completed
        } else if self.inner.ready.is_set() {
            ScopeState::Ready
        } else {
            ScopeState::Created
        }
    }

    /// Creates a child scope without a cleanup action.
    pub fn create_scope(&self, name: impl Into<String>) -> Result<Scope, ScopeError> {
        self.attach(name.into(), None)
    }

    /// Creates a child scope whose `cleanup` runs once its work has ended.
    pub fn create_scope_with<F, Fut>(
        &self,
        name: impl Into<String>,
        cleanup: F,
    ) -> Result<Scope, ScopeError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cleanup: Cleanup = Box::new(move || Box::pin(cleanup()));
        self.attach(name.into(), Some(cleanup))
    }

    fn attach(&self, name: String, cleanup: Option<Cleanup>) -> Result<Scope, ScopeError> {
        let mut children = self.inner.children.lock();
        if children.sealed {
            return Err(ScopeError::ParentCompleted {
                parent: self.inner.name.clone(),
            });
        }
        let child = Scope::build(
            name,
            self.inner.stop.child_token(),
            Some(self.inner.tracker.token()),
            cleanup,
        );
        children.list.retain(|w| w.strong_count() > 0);
        children.list.push(Arc::downgrade(&child.inner));
        Ok(child)
    }

    /// Spawns work tracked by this scope; completion waits for it.
    pub fn spawn<F>(&self, fut: F) -> Result<JoinHandle<F::Output>, ScopeError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let children = self.inner.children.lock();
        if children.sealed {
            return Err(ScopeError::ParentCompleted {
                parent: self.inner.name.clone(),
            });
        }
        Ok(self.inner.tracker.spawn(fut))
    }

    /// Like [`Scope::spawn`], but on `runtime`; callable from threads outside it.
    pub fn spawn_on<F>(
        &self,
        fut: F,
        runtime: &Handle,
    ) -> Result<JoinHandle<F::Output>, ScopeError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let children = self.inner.children.lock();
        if children.sealed {
            return Err(ScopeError::ParentCompleted {
                parent: self.inner.name.clone(),
            });
        }
        Ok(self.inner.tracker.spawn_on(fut, runtime))
    }

    /// Signals readiness.
    ///
    /// Returns `true` for the call that fired the signal. Has no effect once
    /// the scope has completed.
    pub fn set_ready(&self) -> bool {
        if self.inner.completed.is_set() {
            return false;
        }
        self.inner.ready.set(())
    }

    /// True once *Ready* has fired.
    pub fn is_ready(&self) -> bool {
        self.inner.ready.is_set()
    }

    /// Waits for *Ready*.
    ///
    /// Fails with [`ScopeError::CompletedBeforeReady`] if the scope completes
    /// without ever becoming ready.
    pub async fn ready(&self) -> Result<(), ScopeError> {
        tokio::select! {
            biased;
            _ = self.inner.ready.wait() => Ok(()),
            outcome = self.inner.completed.wait() => {
                if self.inner.ready.is_set() {
                    Ok(())
                } else {
                    Err(ScopeError::CompletedBeforeReady {
                        scope: self.inner.name.clone(),
                        outcome,
                    })
                }
            }
        }
    }

    /// Requests a stop: this scope and its descendants stop accepting new work.
    ///
    /// In-flight work is not canceled.
    pub fn stop(&self) {
        self.inner.stop.cancel();
    }

    /// True once a stop has been requested here or on an ancestor.
    pub fn is_stopping(&self) -> bool {
        self.inner.stop.is_cancelled()
    }

    /// Waits until a stop is requested.
    pub async fn stopped(&self) {
        self.inner.stop.cancelled().await;
    }

    /// Stop token handed to contexts created under this scope.
    pub fn stop_token(&self) -> CancellationToken {
        self.inner.stop.clone()
    }

    /// Number of tracked tasks and live children not yet finished.
    pub fn in_flight(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Names of direct children that have not completed.
    pub fn active_children(&self) -> Vec<String> {
        let children = self.inner.children.lock();
        let mut names: Vec<String> = children
            .list
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|c| !c.completed.is_set())
            .map(|c| c.name.clone())
            .collect();
        names.sort_unstable();
        names
    }

    /// Ends this scope's own work and waits for *Completed*.
    ///
    /// Only the first call's `outcome` is recorded; later calls wait for the
    /// same completion.
    pub async fn complete(&self, outcome: ScopeOutcome) -> ScopeOutcome {
        self.close(outcome);
        self.completed().await
    }

    /// Ends this scope's own work without waiting for *Completed*.
    ///
    /// Returns `true` for the call that started the drain.
    pub fn close(&self, outcome: ScopeOutcome) -> bool {
        if self.inner.completing.swap(true, Ordering::AcqRel) {
            return false;
        }
        let inner = Arc::clone(&self.inner);
        tokio::spawn(ScopeInner::drain(inner, outcome));
        true
    }

    /// True once *Completed* has fired.
    pub fn is_completed(&self) -> bool {
        self.inner.completed.is_set()
    }

    /// Waits for *Completed*.
    pub async fn completed(&self) -> ScopeOutcome {
        self.inner.completed.wait().await
    }
}

impl ScopeInner {
    async fn drain(self: Arc<Self>, outcome: ScopeOutcome) {
        self.stop.cancel();
        self.tracker.close();
        loop {
            self.tracker.wait().await;
            let mut children = self.children.lock();
            if self.tracker.is_empty() {
                children.sealed = true;
                break;
            }
        }

        let cleanup = self.cleanup.lock().take();
        if let Some(cleanup) = cleanup {
            cleanup().await;
        }

        tracing::debug!(scope = %self.name, %outcome, "scope completed");
        self.completed.set(outcome);
        drop(self.parent_token.lock().take());
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
