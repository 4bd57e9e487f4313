// ABOUTME: User model, role enumeration and the subject embedded in access tokens
// ABOUTME: Roles are persisted as their integer discriminant
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Operator of the whole installation
    Sysadmin = 0,
    /// Administrator of one organization
    OrganizationAdmin = 1,
    /// Designs and publishes surveys
    Researcher = 2,
    /// Reads survey results
    Analyst = 3,
}

impl Role {
    /// Decode the integer stored in the `role` column
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Sysadmin),
            1 => Some(Self::OrganizationAdmin),
            2 => Some(Self::Researcher),
            3 => Some(Self::Analyst),
            _ => None,
        }
    }

    /// Integer stored in the `role` column
    #[must_use]
    pub const fn code(self) -> i64 {
        self as i64
    }

    /// Name carried in token subjects
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sysadmin => "SYSADMIN",
            Self::OrganizationAdmin => "ORGANIZATION_ADMIN",
            Self::Researcher => "RESEARCHER",
            Self::Analyst => "ANALYST",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user account as stored by the credential store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Primary key
    pub id: i64,
    /// Account role
    pub role: Role,
    /// Display name
    pub name: String,
    /// Login name
    pub username: String,
    /// Encoded password, never serialized back out
    #[serde(skip_serializing, default)]
    pub password: String,
    /// Owning organization, if any
    pub organization_id: Option<i64>,
}

impl User {
    /// Principal embedded in access tokens
    #[must_use]
    pub fn subject(&self) -> UserSubject {
        UserSubject {
            id: self.id,
            role: self.role.as_str().to_owned(),
            name: self.name.clone(),
        }
    }
}

/// The `sub` claim of an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSubject {
    /// User id
    pub id: i64,
    /// Role name
    pub role: String,
    /// Display name
    pub name: String,
}
