// ABOUTME: Core data models for the survey runtime
// ABOUTME: Re-exports the user, role and token subject types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

mod user;

pub use user::{Role, User, UserSubject};
