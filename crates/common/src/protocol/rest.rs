// Pull API wire types: response envelope, comment JSON, and route paths.
//
// Routes (relative to the API base URL):
//   GET    comments/days/{day_id}                          list comments
//   POST   comments/days/{day_id}                          create comment
//   DELETE comments/days/{day_id}/comments/{comment_id}    delete comment
//   GET    days/{day_id}/parent                            itinerary of a day
//   GET    itineraries/{itinerary_id}/authorization        owner + collaborators
//
// Route builders return raw path segments. Ids are not escaped here; the
// HTTP client percent-encodes each segment when it appends it to the base URL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    Collaborator, CollaboratorRole, Comment, CommentId, ItineraryAuthorization, ItineraryId,
    RoomId, UserId,
};

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";

pub fn comments_path(room: &RoomId) -> Vec<&str> {
    vec!["comments", "days", room.as_str()]
}

pub fn comment_path<'a>(room: &'a RoomId, comment: &'a CommentId) -> Vec<&'a str> {
    vec!["comments", "days", room.as_str(), "comments", comment.as_str()]
}

pub fn parent_path(room: &RoomId) -> Vec<&str> {
    vec!["days", room.as_str(), "parent"]
}

pub fn authorization_path(itinerary: &ItineraryId) -> Vec<&str> {
    vec!["itineraries", itinerary.as_str(), "authorization"]
}

/// Standard response envelope: `{status, message, data}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self { status: STATUS_SUCCESS.to_string(), message: Some(message.into()), data: Some(data) }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { status: STATUS_ERROR.to_string(), message: Some(message.into()), data: None }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

/// Comment as serialized by the backend, tolerant of `_id` keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WireComment {
    #[serde(alias = "_id")]
    pub id: CommentId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub user: WireUser,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireUser {
    #[serde(alias = "_id")]
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl WireComment {
    /// Convert to the domain type. The author name falls back to the email,
    /// then to the user id, when the account has no display name.
    pub fn into_comment(self) -> Comment {
        let author_name = [self.user.name, self.user.email]
            .into_iter()
            .flatten()
            .find(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.user.id.to_string());
        Comment {
            id: self.id,
            author_id: self.user.id,
            author_name,
            text: self.text,
            created_at: self.created_at,
        }
    }
}

impl From<&Comment> for WireComment {
    fn from(comment: &Comment) -> Self {
        Self {
            id: comment.id.clone(),
            text: comment.text.clone(),
            created_at: comment.created_at,
            user: WireUser {
                id: comment.author_id.clone(),
                name: Some(comment.author_name.clone()),
                email: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommentsData {
    pub comments: Vec<WireComment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommentData {
    pub comment: WireComment,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeletedData {
    pub comment_id: CommentId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateCommentRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParentData {
    pub itinerary_id: ItineraryId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationData {
    pub owner_id: UserId,
    #[serde(default)]
    pub collaborators: Vec<WireCollaborator>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WireCollaborator {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub role: CollaboratorRole,
}

impl AuthorizationData {
    /// Entries whose user was deleted come back without an id; drop them.
    pub fn into_authorization(self) -> ItineraryAuthorization {
        ItineraryAuthorization {
            owner_id: self.owner_id,
            collaborators: self
                .collaborators
                .into_iter()
                .filter_map(|c| c.user_id.map(|user_id| Collaborator { user_id, role: c.role }))
                .collect(),
        }
    }
}

impl From<&ItineraryAuthorization> for AuthorizationData {
    fn from(authorization: &ItineraryAuthorization) -> Self {
        Self {
            owner_id: authorization.owner_id.clone(),
            collaborators: authorization
                .collaborators
                .iter()
                .map(|c| WireCollaborator { user_id: Some(c.user_id.clone()), role: c.role })
                .collect(),
        }
    }
}
