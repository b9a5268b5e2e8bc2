//! Per-unit-of-work module binding.
//!
//! The active module is a tokio task-local, so it travels with the future being
//! polled. Two units of work interleaving on the same worker thread (or sibling
//! futures joined inside one task) each see only their own binding, and leaving a
//! scope restores the enclosing one on success, error, panic or cancellation alike.

use std::future::Future;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::error::RouterError;
use crate::module_key::ModuleKey;

tokio::task_local! {
    static ACTIVE_MODULE: ModuleKey;
}

/// Entry point for declaring "this unit of work operates as module M".
pub struct ModuleContext;

impl ModuleContext {
    /// Run `work` with `module` bound for its whole dynamic extent.
    ///
    /// Nested calls shadow the outer binding and unwind back to it. The output of
    /// `work` is returned untouched, errors included.
    pub async fn run_as<F>(module: ModuleKey, work: F) -> F::Output
    where
        F: Future,
    {
        let span = tracing::debug_span!("module_scope", module = %module);
        ACTIVE_MODULE.scope(module, work).instrument(span).await
    }

    /// Synchronous counterpart of [`ModuleContext::run_as`].
    pub fn run_as_sync<R>(module: ModuleKey, work: impl FnOnce() -> R) -> R {
        let span = tracing::debug_span!("module_scope", module = %module);
        let _entered = span.enter();
        ACTIVE_MODULE.sync_scope(module, work)
    }

    /// The module bound to the current unit of work, if any.
    pub fn current() -> Option<ModuleKey> {
        ACTIVE_MODULE.try_with(|m| *m).ok()
    }

    /// Like [`ModuleContext::current`], but outside any scope is an error.
    pub fn require() -> Result<ModuleKey, RouterError> {
        Self::current().ok_or(RouterError::NoActiveContext)
    }

    /// Spawn a task that inherits the caller's binding.
    ///
    /// `tokio::spawn` starts tasks with no task-locals; work fanned out from inside a
    /// scope should go through here to stay on the same module.
    pub fn spawn<F>(work: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        match Self::current() {
            Some(module) => tokio::spawn(Self::run_as(module, work)),
            None => tokio::spawn(work),
        }
    }
}
