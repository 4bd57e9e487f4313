// ABOUTME: Password encoding capability applied before credentials reach the user store
// ABOUTME: The default encoder renders the SHA-256 digest as lowercase hex
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::injection::Capability;
use sha2::{Digest, Sha256};

/// Turns a plaintext password into the form stored in the user table
pub trait PasswordEncoder: Send + Sync {
    /// Encode `password`; equal inputs always encode equally
    fn encode(&self, password: &str) -> String;
}

impl Capability for dyn PasswordEncoder {
    const NAME: &'static str = "PasswordEncoder";
}

/// Hex encoded SHA-256 digest
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256PasswordEncoder;

impl PasswordEncoder for Sha256PasswordEncoder {
    fn encode(&self, password: &str) -> String {
        hex::encode(Sha256::digest(password.as_bytes()))
    }
}
