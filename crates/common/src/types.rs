// Core domain types shared across all Tripline crates.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier, rejecting blank values.
            pub fn parse(raw: impl Into<String>) -> Result<Self, InvalidId> {
                let raw = raw.into();
                if raw.trim().is_empty() {
                    return Err(InvalidId { kind: stringify!($name) });
                }
                Ok(Self(raw))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of a day: the room comments are scoped to.
    RoomId
);
string_id!(
    /// Identifier of the itinerary that owns a day.
    ItineraryId
);
string_id!(UserId);
string_id!(CommentId);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} must not be empty")]
pub struct InvalidId {
    kind: &'static str,
}

/// A room plus the parent pointer, when the caller already knows it.
///
/// Rooms opened from a deep link usually lack the parent id; resolving
/// access then costs one extra round trip to look it up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub parent: Option<ItineraryId>,
}

impl Room {
    pub fn new(id: RoomId) -> Self {
        Self { id, parent: None }
    }

    pub fn with_parent(mut self, parent: ItineraryId) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// A short text annotation on a day. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub author_id: UserId,
    pub author_name: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorRole {
    Editor,
    #[default]
    Viewer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    pub user_id: UserId,
    pub role: CollaboratorRole,
}

/// Owner and collaborator list of an itinerary, as reported by the
/// authorization service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItineraryAuthorization {
    pub owner_id: UserId,
    #[serde(default)]
    pub collaborators: Vec<Collaborator>,
}

/// Resolved view permission of one user on one room.
///
/// Derived from an [`ItineraryAuthorization`] snapshot; it can lag behind the
/// authorization service for a short while after a grant changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub user_id: UserId,
    pub allowed: bool,
    pub owner_id: UserId,
    pub collaborator_ids: HashSet<UserId>,
}

impl AccessGrant {
    pub fn evaluate(user_id: UserId, authorization: &ItineraryAuthorization) -> Self {
        let collaborator_ids: HashSet<UserId> =
            authorization.collaborators.iter().map(|c| c.user_id.clone()).collect();
        let allowed = user_id == authorization.owner_id || collaborator_ids.contains(&user_id);
        Self { user_id, allowed, owner_id: authorization.owner_id.clone(), collaborator_ids }
    }

    pub fn is_owner(&self) -> bool {
        self.user_id == self.owner_id
    }

    /// Authors may delete their own comments; the itinerary owner may delete any.
    pub fn may_delete(&self, comment: &Comment) -> bool {
        self.allowed && (comment.author_id == self.user_id || self.is_owner())
    }
}
