// ABOUTME: Two-tier dependency resolution for process-wide and per-request capabilities
// ABOUTME: Re-exports the capability marker, the registry and the request-scoped context
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Capability registry and context-scoped resolution
//!
//! # Architecture
//!
//! - [`Capability`]: marker implemented by every contract that can be resolved.
//!   Contracts are usually trait objects (`dyn UserRepository`); a few concrete
//!   types opt in as context-only capabilities (the storage session).
//! - [`RegistryBuilder`]: the only place factories are registered. It is
//!   consumed at startup by [`RegistryBuilder::build`], after which the
//!   [`CapabilityRegistry`] is read-only.
//! - [`Context`]: one per inbound request. It caches one instance per scoped
//!   capability and owns the resources (sessions) that must be finalized when
//!   the request ends.

mod capability;
mod context;
mod registry;

pub use capability::{Capability, CapabilityKind};
pub use context::{Context, ScopeOutcome, ScopeResource};
pub use registry::{CapabilityRegistry, RegistryBuilder};
