//! # Supervisor: root of the scope tree.
//!
//! The [`Supervisor`] is shared infrastructure owned by the bus process and
//! outlives individual endpoints. Endpoints attach child scopes to it; a
//! shutdown stops every scope and waits up to [`Config::grace`] for the tree
//! to drain.
//!
//! ## Shutdown path
//! ```text
//! Supervisor::shutdown()
//!   └─► root.stop()               → propagates to every endpoint scope
//!   └─► root.complete(Clean)      → waits for all children to complete
//!          ├─ Ok (within grace)   → Ok(())
//!          └─ grace exceeded      → RuntimeError::GraceExceeded { stuck }
//! ```

use std::future::Future;

use crate::config::Config;
use crate::error::{RuntimeError, ScopeError};
use crate::labels::ComponentId;

use super::scope::{Scope, ScopeOutcome};

/// Root node of the supervision tree.
#[derive(Debug, Clone)]
pub struct Supervisor {
    cfg: Config,
    root: Scope,
}

impl Supervisor {
    /// Creates a ready supervisor.
    pub fn new(cfg: Config) -> Self {
        let root = Scope::root(ComponentId::Supervisor.display_name());
        root.set_ready();
        Self { cfg, root }
    }

    /// Runtime configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// The root scope.
    pub fn scope(&self) -> &Scope {
        &self.root
    }

    /// Creates a child scope under the root.
    pub fn create_scope(&self, name: impl Into<String>) -> Result<Scope, ScopeError> {
        self.root.create_scope(name)
    }

    /// Creates a child scope with a cleanup action.
    pub fn create_scope_with<F, Fut>(
        &self,
        name: impl Into<String>,
        cleanup: F,
    ) -> Result<Scope, ScopeError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.root.create_scope_with(name, cleanup)
    }

    /// Requests a stop of every scope without waiting.
    pub fn stop(&self) {
        self.root.stop();
    }

    /// Names of child scopes that have not completed.
    pub fn active_scopes(&self) -> Vec<String> {
        self.root.active_children()
    }

    /// Stops every scope and waits for the tree to drain.
    ///
    /// With `grace = 0s` the drain is started and the call returns immediately.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.root.stop();
        self.root.close(ScopeOutcome::Clean);

        let grace = self.cfg.grace;
        if grace.is_zero() {
            return Ok(());
        }

        match tokio::time::timeout(grace, self.root.completed()).await {
            Ok(_) => Ok(()),
            Err(_) => {
                let stuck = self.root.active_children();
                tracing::warn!(?grace, ?stuck, "supervisor grace exceeded");
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    /// Waits until the whole tree has completed.
    pub async fn completed(&self) -> ScopeOutcome {
        self.root.completed().await
    }
}
