//! Participant roster.

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Minimum username length after trimming.
pub const MIN_USERNAME_LEN: usize = 3;

/// Role value that unlocks teacher controls.
pub const TEACHER_ROLE: &str = "teacher";

/// One participant as published by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub current_points: i64,
    /// Assigned out-of-band; clients can read it but never write it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl RosterEntry {
    pub fn is_teacher(&self) -> bool {
        self.role.as_deref() == Some(TEACHER_ROLE)
    }
}

/// Merge-only profile write.
///
/// Has no `role` field: a client write can never set or change a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpsert {
    pub id: String,
    pub username: String,
    pub current_points: i64,
}

impl ProfileUpsert {
    /// Validate a username and build the join upsert.
    pub fn join(id: &str, username: &str) -> Result<Self, ClientError> {
        let username = username.trim();
        if username.chars().count() < MIN_USERNAME_LEN {
            return Err(ClientError::InvalidUsername {
                min: MIN_USERNAME_LEN,
            });
        }
        Ok(Self {
            id: id.to_string(),
            username: username.to_string(),
            current_points: 0,
        })
    }
}

/// Sort by points descending, then by username for a stable order.
pub fn sort_by_score(roster: &mut [RosterEntry]) {
    roster.sort_by(|a, b| {
        b.current_points
            .cmp(&a.current_points)
            .then_with(|| a.username.cmp(&b.username))
    });
}
