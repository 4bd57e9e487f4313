// ABOUTME: Core types for the survey runtime
// ABOUTME: Foundation crate with the unified error type and user models
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Survey Core
//!
//! Foundation crate providing the types shared by every layer of the survey
//! runtime. It changes rarely, which keeps incremental builds of the main
//! crate cheap.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **models**: Users, roles and the token subject

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Core data models (User, Role, UserSubject)
pub mod models;
