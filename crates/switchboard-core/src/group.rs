//! Group identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric identity of a chat group in the group-membership system.
///
/// Consulted only on the JOINED/LEFT broadcast path; the relay never
/// stores group state of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(u64);

impl GroupId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
