//! Account status reported to the account-status collaborator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Presence status of an underlying user account.
///
/// The relay only ever reports `Online` and `Offline`; `Busy` is part of
/// the account-system contract and set through other surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    #[serde(rename = "ONLINE")]
    Online,
    #[serde(rename = "OFFLINE")]
    Offline,
    #[serde(rename = "BUSY")]
    Busy,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "ONLINE"),
            Self::Offline => write!(f, "OFFLINE"),
            Self::Busy => write!(f, "BUSY"),
        }
    }
}
