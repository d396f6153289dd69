//! Collaborator seams for the account and group systems.
//!
//! The relay core consults two external systems: an account-status sink
//! that records a user going online/offline, and a group directory that
//! resolves the current member set for join/leave broadcasts. Both are
//! trait seams so the daemon can run standalone (null/empty built-ins)
//! while an embedding service injects the real implementations.
//!
//! Failures from either collaborator are caught and logged at the call
//! site; they never abort message routing or registry mutation.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use switchboard_core::{AccountStatus, GroupId, PeerId};

/// Errors raised by collaborator implementations.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("group not found: {0}")]
    GroupNotFound(GroupId),
}

/// Sink for account presence updates.
///
/// Invoked with the numeric account identity parsed from the leading
/// segment of a peer identity. Best-effort: callers log and swallow
/// errors.
#[async_trait]
pub trait AccountStatusSink: Send + Sync {
    async fn set_status(&self, account_id: u64, status: AccountStatus)
        -> Result<(), DirectoryError>;
}

/// Resolver for the current member set of a group.
///
/// Consulted only on the GROUP_MEMBER_JOINED/LEFT fan-out path, never on
/// the OFFER/ANSWER/ICE hot path.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    async fn members(&self, group: GroupId) -> Result<Vec<PeerId>, DirectoryError>;
}

/// Account sink that records nothing.
///
/// Used by the standalone daemon where no account system is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAccountSink;

#[async_trait]
impl AccountStatusSink for NullAccountSink {
    async fn set_status(
        &self,
        account_id: u64,
        status: AccountStatus,
    ) -> Result<(), DirectoryError> {
        debug!(account_id, status = %status, "Account status update (no sink configured)");
        Ok(())
    }
}

/// Group directory with no groups.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyGroupDirectory;

#[async_trait]
impl GroupDirectory for EmptyGroupDirectory {
    async fn members(&self, group: GroupId) -> Result<Vec<PeerId>, DirectoryError> {
        Err(DirectoryError::GroupNotFound(group))
    }
}

/// In-memory group directory with a fixed membership table.
///
/// Handy for tests and demos; an embedding service would back this with
/// its relational store instead.
#[derive(Debug, Default, Clone)]
pub struct StaticGroupDirectory {
    groups: HashMap<GroupId, Vec<PeerId>>,
}

impl StaticGroupDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the member list for a group, replacing any previous list.
    pub fn with_group(mut self, group: GroupId, members: Vec<PeerId>) -> Self {
        self.groups.insert(group, members);
        self
    }
}

#[async_trait]
impl GroupDirectory for StaticGroupDirectory {
    async fn members(&self, group: GroupId) -> Result<Vec<PeerId>, DirectoryError> {
        self.groups
            .get(&group)
            .cloned()
            .ok_or(DirectoryError::GroupNotFound(group))
    }
}
