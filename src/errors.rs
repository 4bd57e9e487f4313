// ABOUTME: Re-exports the unified error type and error codes from survey-core
// ABOUTME: Lets runtime modules write crate::errors::AppError without naming the core crate
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub use survey_core::errors::*;
