//! Role tokens and the canonical role set.
//!
//! Profiles hold their roles natively as a [`RoleSet`]. The stored form
//! (a comma-joined string, or a token array coming from older rows) only
//! exists at the store edge and goes through [`normalize`] / [`serialize`].

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::model::Profile;

/// A participant role. The vocabulary is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Mentor,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Student, Role::Mentor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Mentor => "mentor",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Self::Student),
            "mentor" => Ok(Self::Mentor),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

/// Deduplicated, order-irrelevant set of roles held by a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(role: Role) -> Self {
        Self(BTreeSet::from([role]))
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn insert(&mut self, role: Role) -> bool {
        self.0.insert(role)
    }

    /// A copy of this set with `role` added.
    pub fn with(&self, role: Role) -> Self {
        let mut next = self.clone();
        next.insert(role);
        next
    }

    pub fn union(&self, other: &RoleSet) -> Self {
        Self(self.0.union(&other.0).copied().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl std::fmt::Display for RoleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&serialize(self))
    }
}

/// Role membership as it arrives from the store or an external caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawRoles {
    #[default]
    Absent,
    Delimited(String),
    Tokens(Vec<String>),
}

impl From<&str> for RawRoles {
    fn from(s: &str) -> Self {
        Self::Delimited(s.to_string())
    }
}

impl From<Option<String>> for RawRoles {
    fn from(s: Option<String>) -> Self {
        s.map(Self::Delimited).unwrap_or(Self::Absent)
    }
}

impl From<Vec<String>> for RawRoles {
    fn from(tokens: Vec<String>) -> Self {
        Self::Tokens(tokens)
    }
}

/// Convert a raw role representation into the canonical set.
///
/// Never fails: empty segments, stray separators and unknown tokens are
/// skipped.
pub fn normalize(raw: &RawRoles) -> RoleSet {
    match raw {
        RawRoles::Absent => RoleSet::new(),
        RawRoles::Delimited(s) => parse_tokens(s.split(',')),
        RawRoles::Tokens(tokens) => parse_tokens(tokens.iter().map(String::as_str)),
    }
}

fn parse_tokens<'a>(tokens: impl Iterator<Item = &'a str>) -> RoleSet {
    tokens
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter_map(|t| match t.parse::<Role>() {
            Ok(role) => Some(role),
            Err(_) => {
                tracing::debug!(token = t, "Ignoring unknown role token");
                None
            }
        })
        .collect()
}

/// Canonical stored form: tokens in declaration order, comma-joined.
pub fn serialize(roles: &RoleSet) -> String {
    roles.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(",")
}

/// Whether `profile` holds `role`. No profile holds no role.
pub fn has_role(profile: Option<&Profile>, role: Role) -> bool {
    profile.is_some_and(|p| p.role_set.contains(role))
}
