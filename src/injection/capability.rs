// ABOUTME: Capability marker trait naming every resolvable contract explicitly
// ABOUTME: Declares whether a capability is an interface, context-only, or a plain value
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// How a capability may be provided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    /// An abstract contract; accepts both singleton and scoped providers
    Interface,
    /// Only meaningful inside a request context; accepts scoped providers only
    ContextOnly,
    /// A concrete value type; never accepts a provider
    Value,
}

/// A contract that the registry can resolve
///
/// Implemented for the type consumers ask for, which is what instances are
/// cached under. For trait contracts this is the trait object:
///
/// ```rust
/// use survey_runtime::injection::Capability;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// impl Capability for dyn Greeter {
///     const NAME: &'static str = "Greeter";
/// }
/// ```
pub trait Capability: Send + Sync + 'static {
    /// Name used in logs and error messages
    const NAME: &'static str;

    /// Which registrations this capability accepts
    const KIND: CapabilityKind = CapabilityKind::Interface;
}
