// ABOUTME: Per-request scope caching one instance per capability and owning scope-bound resources
// ABOUTME: Detects construction cycles and finalizes resources exactly once when the request ends
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::capability::Capability;
use super::registry::{downcast_instance, CapabilityRegistry, Instance};
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};
use uuid::Uuid;

/// How the request that owned a context ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeOutcome {
    /// The handler returned normally
    Completed,
    /// The handler failed; owned resources must discard their work
    Failed,
}

/// A resource whose lifetime is bound to one context
#[async_trait]
pub trait ScopeResource: Send + Sync {
    /// Finalize after a successful request
    async fn close(&self) -> AppResult<()>;

    /// Finalize after a failed request
    async fn notify_error(&self) -> AppResult<()>;
}

enum Slot {
    /// The factory for this capability is running
    Constructing,
    Ready(Instance),
}

struct ContextInner {
    id: Uuid,
    registry: Arc<CapabilityRegistry>,
    slots: Mutex<HashMap<TypeId, Slot>>,
    resources: Mutex<Vec<Arc<dyn ScopeResource>>>,
    closed: AtomicBool,
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        let pending = self
            .resources
            .get_mut()
            .map_or(0, |resources| resources.len());
        if !self.closed.load(Ordering::Acquire) && pending > 0 {
            warn!(
                context.id = %self.id,
                resources = pending,
                "Context dropped without being closed"
            );
        }
    }
}

/// Removes the in-progress marker unless construction completed
struct PendingConstruction<'a> {
    slots: &'a Mutex<HashMap<TypeId, Slot>>,
    id: TypeId,
    armed: bool,
}

impl Drop for PendingConstruction<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.slots
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.id);
        }
    }
}

/// Request scope
///
/// Created once per inbound request and threaded explicitly to every scoped
/// component. Cloning is cheap and yields a handle to the same scope; a
/// context is never shared across requests.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Open a scope over `registry`
    #[must_use]
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        let id = Uuid::new_v4();
        debug!(context.id = %id, "Context opened");
        Self {
            inner: Arc::new(ContextInner {
                id,
                registry,
                slots: Mutex::new(HashMap::new()),
                resources: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Unique id of this scope, used in logs
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Registry backing this scope
    #[must_use]
    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.inner.registry
    }

    /// Whether [`Context::close`] already ran
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<TypeId, Slot>> {
        self.inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve the scope's instance of `T`, constructing it on first use
    ///
    /// Every resolution of `T` in one context returns the same instance.
    ///
    /// # Errors
    ///
    /// Returns an error if no context provider is registered for `T`, if the
    /// factory for `T` is still running in this context (a construction
    /// cycle), if the context was closed, or if the factory fails.
    pub async fn resolve<T: ?Sized + Capability>(&self) -> AppResult<Arc<T>> {
        let id = TypeId::of::<T>();
        {
            let mut slots = self.slots();
            match slots.get(&id) {
                Some(Slot::Ready(instance)) => return downcast_instance::<T>(instance),
                Some(Slot::Constructing) => return Err(AppError::construction_cycle(T::NAME)),
                None => {}
            }
            if self.is_closed() {
                return Err(AppError::internal(format!(
                    "Cannot resolve {} in a closed context",
                    T::NAME
                )));
            }
            if self.inner.registry.scoped_slot(id).is_none() {
                return Err(AppError::missing_provider(T::NAME));
            }
            slots.insert(id, Slot::Constructing);
        }

        let mut pending = PendingConstruction {
            slots: &self.inner.slots,
            id,
            armed: true,
        };
        let slot = self
            .inner
            .registry
            .scoped_slot(id)
            .ok_or_else(|| AppError::missing_provider(T::NAME))?;
        let instance = (slot.factory)(self.clone()).await?;
        let typed = downcast_instance::<T>(&instance)?;

        pending.armed = false;
        self.slots().insert(id, Slot::Ready(instance));
        debug!(context.id = %self.inner.id, capability = slot.name, "Created context instance");
        Ok(typed)
    }

    /// Resolve a process-wide capability from the backing registry
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot resolve `T`.
    pub fn singleton<T: ?Sized + Capability>(&self) -> AppResult<Arc<T>> {
        self.inner.registry.resolve_singleton::<T>()
    }

    /// Bind a resource to this scope so it is finalized by [`Context::close`]
    pub fn defer_close<R: ScopeResource + 'static>(&self, resource: Arc<R>) {
        self.inner
            .resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(resource);
    }

    /// End the scope, finalizing every bound resource exactly once
    ///
    /// Resources are finalized in reverse binding order. On
    /// [`ScopeOutcome::Failed`] each resource is told about the error so it
    /// discards its work. Closing an already closed context is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the first finalization error; the remaining resources are still
    /// finalized.
    pub async fn close(&self, outcome: ScopeOutcome) -> AppResult<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let resources: Vec<Arc<dyn ScopeResource>> = std::mem::take(
            &mut *self
                .inner
                .resources
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        let mut first_error = None;
        for resource in resources.iter().rev() {
            let finalized = match outcome {
                ScopeOutcome::Completed => resource.close().await,
                ScopeOutcome::Failed => resource.notify_error().await,
            };
            if let Err(error) = finalized {
                warn!(context.id = %self.inner.id, error = %error, "Failed to finalize context resource");
                first_error.get_or_insert(error);
            }
        }

        self.slots().clear();
        debug!(context.id = %self.inner.id, outcome = ?outcome, "Context closed");
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use futures_util::future::BoxFuture;
    use std::sync::atomic::AtomicUsize;

    trait Counter: Send + Sync {
        fn serial(&self) -> usize;
    }

    impl Capability for dyn Counter {
        const NAME: &'static str = "Counter";
    }

    struct Numbered(usize);

    impl Counter for Numbered {
        fn serial(&self) -> usize {
            self.0
        }
    }

    trait Loop: Send + Sync {}

    impl Capability for dyn Loop {
        const NAME: &'static str = "Loop";
    }

    struct LoopImpl;

    impl Loop for LoopImpl {}

    fn counting_registry(constructions: &Arc<AtomicUsize>) -> Arc<CapabilityRegistry> {
        let counter = Arc::clone(constructions);
        let mut builder = CapabilityRegistry::builder();
        builder
            .register_scoped::<dyn Counter, _, _>(move |_context| {
                let serial = counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(Arc::new(Numbered(serial)) as Arc<dyn Counter>) }
            })
            .unwrap();
        builder.build()
    }

    #[tokio::test]
    async fn test_same_context_returns_identical_instance() {
        let constructions = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(&constructions);
        let context = registry.context();

        let first = context.resolve::<dyn Counter>().await.unwrap();
        let second = context.resolve::<dyn Counter>().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(constructions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_contexts_get_distinct_instances() {
        let constructions = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(&constructions);

        let first = registry.context().resolve::<dyn Counter>().await.unwrap();
        let second = registry.context().resolve::<dyn Counter>().await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_ne!(first.serial(), second.serial());
        assert_eq!(constructions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reentrant_resolution_is_a_construction_cycle() {
        let mut builder = CapabilityRegistry::builder();
        builder
            .register_scoped::<dyn Loop, _, _>(|context: Context| async move {
                // The factory asks for its own capability before finishing
                context.resolve::<dyn Loop>().await?;
                Ok(Arc::new(LoopImpl) as Arc<dyn Loop>)
            })
            .unwrap();
        let registry = builder.build();
        let context = registry.context();

        let error = context.resolve::<dyn Loop>().await.err().unwrap();
        assert_eq!(error.code, ErrorCode::ConstructionCycle);

        // The marker is cleared, so the same context reports the cycle again
        // instead of a stale in-progress state
        let error = context.resolve::<dyn Loop>().await.err().unwrap();
        assert_eq!(error.code, ErrorCode::ConstructionCycle);
    }

    #[tokio::test]
    async fn test_missing_scoped_provider() {
        let registry = CapabilityRegistry::builder().build();
        let error = registry
            .context()
            .resolve::<dyn Counter>()
            .await
            .err()
            .unwrap();
        assert_eq!(error.code, ErrorCode::MissingProvider);
    }

    #[derive(Default)]
    struct Recorder {
        closes: AtomicUsize,
        errors: AtomicUsize,
    }

    #[async_trait]
    impl ScopeResource for Recorder {
        async fn close(&self) -> AppResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn notify_error(&self) -> AppResult<()> {
            self.errors.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_close_finalizes_resources_once() {
        let registry = CapabilityRegistry::builder().build();
        let context = registry.context();
        let recorder = Arc::new(Recorder::default());
        context.defer_close(Arc::clone(&recorder));

        context.close(ScopeOutcome::Completed).await.unwrap();
        context.close(ScopeOutcome::Failed).await.unwrap();

        assert!(context.is_closed());
        assert_eq!(recorder.closes.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.errors.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_outcome_notifies_resources() {
        let registry = CapabilityRegistry::builder().build();
        let context = registry.context();
        let recorder = Arc::new(Recorder::default());
        context.defer_close(Arc::clone(&recorder));

        context.close(ScopeOutcome::Failed).await.unwrap();

        assert_eq!(recorder.closes.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_factory_can_bind_resources_to_its_context() {
        let recorder = Arc::new(Recorder::default());
        let bound = Arc::clone(&recorder);

        let mut builder = CapabilityRegistry::builder();
        builder
            .register_scoped::<dyn Counter, _, _>(move |context: Context| {
                let bound = Arc::clone(&bound);
                let pending: BoxFuture<'static, AppResult<Arc<dyn Counter>>> =
                    Box::pin(async move {
                        context.defer_close(bound);
                        Ok(Arc::new(Numbered(0)) as Arc<dyn Counter>)
                    });
                pending
            })
            .unwrap();
        let registry = builder.build();

        let context = registry.context();
        context.resolve::<dyn Counter>().await.unwrap();
        context.resolve::<dyn Counter>().await.unwrap();
        context.close(ScopeOutcome::Completed).await.unwrap();

        assert_eq!(recorder.closes.load(Ordering::SeqCst), 1);
    }
}
