// Push-channel frame types for the tripline-push.v1 protocol.
//
// Frames travel as JSON text over a WebSocket:
//   {"event": "comment-added", "data": {"dayId": "...", "comment": {...}}}

use serde::{Deserialize, Serialize};

use super::rest::WireComment;
use crate::types::{CommentId, RoomId};

pub const CURRENT_PROTOCOL_VERSION: &str = "tripline-push.v1";
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &[CURRENT_PROTOCOL_VERSION];

/// Events a client may send.
pub const CLIENT_EVENTS: &[&str] = &["join-day", "add-comment"];
/// Events a server may send.
pub const SERVER_EVENTS: &[&str] = &["room-joined", "comment-added", "comment-removed", "error"];

#[must_use]
pub fn is_supported_protocol_version(version: &str) -> bool {
    SUPPORTED_PROTOCOL_VERSIONS.contains(&version)
}

/// All frames in the tripline-push.v1 protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum PushMessage {
    /// Client -> Server: join a day room.
    #[serde(rename_all = "camelCase")]
    JoinDay { day_id: RoomId },

    /// Client -> Server: create a comment; the server answers with a
    /// `comment-added` broadcast to the whole room, sender included.
    #[serde(rename_all = "camelCase")]
    AddComment { day_id: RoomId, text: String },

    /// Server -> Client: the join was processed.
    #[serde(rename_all = "camelCase")]
    RoomJoined { day_id: RoomId },

    /// Server -> Client: a comment was created in the room.
    #[serde(rename_all = "camelCase")]
    CommentAdded { day_id: RoomId, comment: WireComment },

    /// Server -> Client: a comment was deleted from the room.
    #[serde(rename_all = "camelCase")]
    CommentRemoved { day_id: RoomId, comment_id: CommentId },

    /// Server -> Client: a request on this connection failed.
    Error { message: String },
}

impl PushMessage {
    /// Wire event name of this frame.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::JoinDay { .. } => "join-day",
            Self::AddComment { .. } => "add-comment",
            Self::RoomJoined { .. } => "room-joined",
            Self::CommentAdded { .. } => "comment-added",
            Self::CommentRemoved { .. } => "comment-removed",
            Self::Error { .. } => "error",
        }
    }

    /// The room a frame is scoped to, if any.
    pub fn room(&self) -> Option<&RoomId> {
        match self {
            Self::JoinDay { day_id }
            | Self::AddComment { day_id, .. }
            | Self::RoomJoined { day_id }
            | Self::CommentAdded { day_id, .. }
            | Self::CommentRemoved { day_id, .. } => Some(day_id),
            Self::Error { .. } => None,
        }
    }
}

pub fn decode_message(raw: &str) -> Result<PushMessage, serde_json::Error> {
    serde_json::from_str::<PushMessage>(raw)
}

pub fn encode_message(message: &PushMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn join_frame_uses_event_and_camel_case_data() {
        let frame = PushMessage::JoinDay { day_id: RoomId::from("day-1") };
        let value: serde_json::Value =
            serde_json::from_str(&encode_message(&frame).unwrap()).unwrap();
        assert_eq!(value, json!({ "event": "join-day", "data": { "dayId": "day-1" } }));
    }

    #[test]
    fn decodes_comment_removed_broadcast() {
        let raw = r#"{"event":"comment-removed","data":{"dayId":"d","commentId":"c9"}}"#;
        let frame = decode_message(raw).unwrap();
        assert_eq!(
            frame,
            PushMessage::CommentRemoved {
                day_id: RoomId::from("d"),
                comment_id: CommentId::from("c9"),
            }
        );
        assert_eq!(frame.room(), Some(&RoomId::from("d")));
    }

    #[test]
    fn decodes_comment_added_with_mongo_style_ids() {
        let raw = r#"{
            "event": "comment-added",
            "data": {
                "dayId": "d",
                "comment": {
                    "_id": "c1",
                    "text": "Hello",
                    "createdAt": "2026-03-01T10:00:00Z",
                    "user": { "_id": "u1", "name": "Ana", "email": "ana@example.com" }
                }
            }
        }"#;
        let PushMessage::CommentAdded { comment, .. } = decode_message(raw).unwrap() else {
            panic!("expected comment-added");
        };
        let comment = comment.into_comment();
        assert_eq!(comment.id.as_str(), "c1");
        assert_eq!(comment.author_id.as_str(), "u1");
        assert_eq!(comment.author_name, "Ana");
    }

    #[test]
    fn error_frame_has_no_room() {
        let frame = decode_message(r#"{"event":"error","data":{"message":"Access denied"}}"#)
            .unwrap();
        assert_eq!(frame.room(), None);
        assert_eq!(frame.event_name(), "error");
    }

    #[test]
    fn unknown_event_is_rejected() {
        assert!(decode_message(r#"{"event":"typing","data":{}}"#).is_err());
    }
}
