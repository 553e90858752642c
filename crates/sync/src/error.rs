// Error taxonomy surfaced to the UI, plus collaborator error types.

use thiserror::Error;
use tripline_common::types::RoomId;

/// Closed set of error codes a UI consumer has to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    AccessDenied,
    ResourceNotFound,
    TransportUnavailable,
    ValidationError,
    Unknown,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccessDenied => "ACCESS_DENIED",
            Self::ResourceNotFound => "RESOURCE_NOT_FOUND",
            Self::TransportUnavailable => "TRANSPORT_UNAVAILABLE",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Terminal errors block the room view until the user explicitly retries.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::AccessDenied | Self::ResourceNotFound)
    }

    pub const fn default_message(self) -> &'static str {
        match self {
            Self::AccessDenied => "you do not have access to this day; request to join first",
            Self::ResourceNotFound => "this day no longer exists",
            Self::TransportUnavailable => "live updates are unavailable",
            Self::ValidationError => "comment text is required",
            Self::Unknown => "something went wrong",
        }
    }
}

/// Failure reported by the pull API or the authorization service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("request is not authenticated")]
    Unauthorized,
    #[error("access denied: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            _ => Self::Status { status, message },
        }
    }

    /// HTTP 403: the read path has not (yet) observed a grant for the caller.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }
}

/// Failure of the push transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("invalid push endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("push connect failed: {0}")]
    Connect(String),
    #[error("push channel is not joined")]
    NotJoined,
    #[error("push channel closed")]
    Closed,
}

/// Error surfaced by the sync engine and room sessions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("access denied to day {room}")]
    AccessDenied { room: RoomId },
    #[error("day {room} not found")]
    ResourceNotFound { room: RoomId },
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),
    #[error("{0}")]
    Validation(String),
    #[error("session for day {room} is closed")]
    SessionClosed { room: RoomId },
    #[error("unexpected failure: {0}")]
    Unknown(String),
}

impl SyncError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AccessDenied { .. } => ErrorCode::AccessDenied,
            Self::ResourceNotFound { .. } => ErrorCode::ResourceNotFound,
            Self::TransportUnavailable(_) => ErrorCode::TransportUnavailable,
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::SessionClosed { .. } | Self::Unknown(_) => ErrorCode::Unknown,
        }
    }

    pub fn from_api(room: &RoomId, error: ApiError) -> Self {
        match error {
            ApiError::Unauthorized | ApiError::Forbidden(_) => {
                Self::AccessDenied { room: room.clone() }
            }
            ApiError::NotFound(_) => Self::ResourceNotFound { room: room.clone() },
            ApiError::Transport(message) => Self::TransportUnavailable(message),
            ApiError::Status { status, message } if status >= 500 => {
                Self::TransportUnavailable(format!("server returned {status}: {message}"))
            }
            other => Self::Unknown(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomId {
        RoomId::from("day-1")
    }

    #[test]
    fn status_mapping_matches_http_semantics() {
        assert_eq!(ApiError::from_status(401, "x"), ApiError::Unauthorized);
        assert!(ApiError::from_status(403, "x").is_access_denied());
        assert_eq!(ApiError::from_status(404, "gone"), ApiError::NotFound("gone".into()));
        assert_eq!(
            ApiError::from_status(502, "bad gateway"),
            ApiError::Status { status: 502, message: "bad gateway".into() }
        );
    }

    #[test]
    fn api_errors_map_to_surfaced_codes() {
        let cases = [
            (ApiError::Unauthorized, ErrorCode::AccessDenied),
            (ApiError::Forbidden("no".into()), ErrorCode::AccessDenied),
            (ApiError::NotFound("day".into()), ErrorCode::ResourceNotFound),
            (ApiError::Transport("refused".into()), ErrorCode::TransportUnavailable),
            (ApiError::Status { status: 503, message: "down".into() }, ErrorCode::TransportUnavailable),
            (ApiError::Status { status: 418, message: "teapot".into() }, ErrorCode::Unknown),
            (ApiError::Decode("eof".into()), ErrorCode::Unknown),
        ];
        for (error, code) in cases {
            assert_eq!(SyncError::from_api(&room(), error).code(), code);
        }
    }

    #[test]
    fn only_access_and_not_found_are_terminal() {
        assert!(ErrorCode::AccessDenied.is_terminal());
        assert!(ErrorCode::ResourceNotFound.is_terminal());
        assert!(!ErrorCode::TransportUnavailable.is_terminal());
        assert!(!ErrorCode::ValidationError.is_terminal());
        assert!(!ErrorCode::Unknown.is_terminal());
    }

    #[test]
    fn codes_render_as_screaming_snake() {
        assert_eq!(ErrorCode::TransportUnavailable.as_str(), "TRANSPORT_UNAVAILABLE");
        assert_eq!(SyncError::Validation("empty".into()).code().as_str(), "VALIDATION_ERROR");
    }
}
