// ABOUTME: Cryptographic helpers used by authentication
// ABOUTME: Exposes the password encoding capability and its SHA-256 implementation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

mod password;

pub use password::{PasswordEncoder, Sha256PasswordEncoder};
