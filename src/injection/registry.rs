// ABOUTME: Process-wide capability registry with singleton and context-scoped factory maps
// ABOUTME: Registration happens once at startup through a builder; resolution is read-only afterwards
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::capability::{Capability, CapabilityKind};
use super::context::Context;
use crate::errors::{AppError, AppResult};
use futures_util::future::BoxFuture;
use std::any::{Any, TypeId};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Type-erased instance; always holds an `Arc<T>` for the capability `T`
pub(crate) type Instance = Box<dyn Any + Send + Sync>;

type SingletonFactory = Box<dyn Fn() -> AppResult<Instance> + Send + Sync>;

pub(crate) type ScopedFactory =
    Arc<dyn Fn(Context) -> BoxFuture<'static, AppResult<Instance>> + Send + Sync>;

struct SingletonSlot {
    name: &'static str,
    factory: SingletonFactory,
    // Per-capability lock: concurrent first resolutions of the same capability
    // wait for a single construction instead of racing.
    instance: Mutex<Option<Instance>>,
}

pub(crate) struct ScopedSlot {
    pub(crate) name: &'static str,
    pub(crate) factory: ScopedFactory,
}

/// Recover the concrete `Arc<T>` from a type-erased instance
pub(crate) fn downcast_instance<T: ?Sized + Capability>(instance: &Instance) -> AppResult<Arc<T>> {
    instance.downcast_ref::<Arc<T>>().cloned().ok_or_else(|| {
        AppError::internal(format!(
            "Instance registered for {} has an unexpected type",
            T::NAME
        ))
    })
}

fn check_kind<T: ?Sized + Capability>(allow_context_only: bool) -> AppResult<()> {
    match T::KIND {
        CapabilityKind::Interface => Ok(()),
        CapabilityKind::ContextOnly if allow_context_only => Ok(()),
        CapabilityKind::ContextOnly => Err(AppError::invalid_capability(
            T::NAME,
            "context-only capabilities accept scoped providers only",
        )),
        CapabilityKind::Value => Err(AppError::invalid_capability(
            T::NAME,
            "not an interface, providers should be for interfaces",
        )),
    }
}

/// Startup-time registration surface for the [`CapabilityRegistry`]
#[derive(Default)]
pub struct RegistryBuilder {
    singletons: HashMap<TypeId, SingletonSlot>,
    scoped: HashMap<TypeId, ScopedSlot>,
}

impl RegistryBuilder {
    /// Create an empty builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the process-wide factory for `T`
    ///
    /// The factory runs at most once, on the first resolution of `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if a singleton factory for `T` already exists or if
    /// `T` is not an interface capability.
    pub fn register_singleton<T, F>(&mut self, factory: F) -> AppResult<&mut Self>
    where
        T: ?Sized + Capability,
        F: Fn() -> AppResult<Arc<T>> + Send + Sync + 'static,
    {
        check_kind::<T>(false)?;
        match self.singletons.entry(TypeId::of::<T>()) {
            Entry::Occupied(_) => Err(AppError::duplicate_provider(T::NAME)),
            Entry::Vacant(entry) => {
                debug!(capability = T::NAME, "Registered singleton provider");
                entry.insert(SingletonSlot {
                    name: T::NAME,
                    factory: Box::new(move || {
                        factory().map(|instance| Box::new(instance) as Instance)
                    }),
                    instance: Mutex::new(None),
                });
                Ok(self)
            }
        }
    }

    /// Register the context-scoped factory for `T`
    ///
    /// The factory receives the requesting [`Context`] and may resolve other
    /// capabilities through it.
    ///
    /// # Errors
    ///
    /// Returns an error if a scoped factory for `T` already exists or if `T`
    /// is a plain value capability.
    pub fn register_scoped<T, F, Fut>(&mut self, factory: F) -> AppResult<&mut Self>
    where
        T: ?Sized + Capability,
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Arc<T>>> + Send + 'static,
    {
        check_kind::<T>(true)?;
        match self.scoped.entry(TypeId::of::<T>()) {
            Entry::Occupied(_) => Err(AppError::duplicate_provider(T::NAME)),
            Entry::Vacant(entry) => {
                debug!(capability = T::NAME, "Registered context provider");
                let factory: ScopedFactory = Arc::new(
                    move |context: Context| -> BoxFuture<'static, AppResult<Instance>> {
                        let pending = factory(context);
                        Box::pin(async move {
                            pending.await.map(|instance| Box::new(instance) as Instance)
                        })
                    },
                );
                entry.insert(ScopedSlot {
                    name: T::NAME,
                    factory,
                });
                Ok(self)
            }
        }
    }

    /// Freeze the registrations
    #[must_use]
    pub fn build(self) -> Arc<CapabilityRegistry> {
        Arc::new(CapabilityRegistry {
            singletons: self.singletons,
            scoped: self.scoped,
        })
    }
}

/// Read-only registry of capability factories, shared by every worker
pub struct CapabilityRegistry {
    singletons: HashMap<TypeId, SingletonSlot>,
    scoped: HashMap<TypeId, ScopedSlot>,
}

impl CapabilityRegistry {
    /// Start registering factories
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Resolve the process-wide instance of `T`, constructing it on first use
    ///
    /// # Errors
    ///
    /// Returns an error if `T` only has a context provider, if no provider is
    /// registered, or if the factory fails. A failed construction is not
    /// cached; the next resolution retries.
    pub fn resolve_singleton<T: ?Sized + Capability>(&self) -> AppResult<Arc<T>> {
        let Some(slot) = self.singletons.get(&TypeId::of::<T>()) else {
            if T::KIND == CapabilityKind::ContextOnly || self.has_scoped::<T>() {
                return Err(AppError::context_only(T::NAME));
            }
            return Err(AppError::missing_provider(T::NAME));
        };

        let mut cached = slot
            .instance
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(instance) = cached.as_ref() {
            return downcast_instance::<T>(instance);
        }

        let instance = (slot.factory)()?;
        debug!(capability = slot.name, "Created singleton");
        let typed = downcast_instance::<T>(&instance)?;
        *cached = Some(instance);
        Ok(typed)
    }

    /// Open a new request scope backed by this registry
    #[must_use]
    pub fn context(self: &Arc<Self>) -> Context {
        Context::new(Arc::clone(self))
    }

    /// Whether a context provider is registered for `T`
    #[must_use]
    pub fn has_scoped<T: ?Sized + Capability>(&self) -> bool {
        self.scoped.contains_key(&TypeId::of::<T>())
    }

    /// Whether a singleton provider is registered for `T`
    #[must_use]
    pub fn has_singleton<T: ?Sized + Capability>(&self) -> bool {
        self.singletons.contains_key(&TypeId::of::<T>())
    }

    pub(crate) fn scoped_slot(&self, id: TypeId) -> Option<&ScopedSlot> {
        self.scoped.get(&id)
    }
}
