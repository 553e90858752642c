// Collaborator contracts consumed by the sync core.
//
// The authorization service, the pull API, and the push transport are
// abstracted behind traits so the engine can be driven by in-memory fakes in
// tests. Production implementations live in `http` (reqwest) and `ws`
// (tokio-tungstenite).

pub mod http;
pub mod ws;

use std::fmt;
use std::future::Future;

use tokio::sync::mpsc;
use tripline_common::protocol::push::PushMessage;
use tripline_common::types::{Comment, CommentId, ItineraryAuthorization, ItineraryId, RoomId};

use crate::error::{ApiError, TransportError};

/// Owner/collaborator lookups. All methods return `Send` futures so callers
/// can run on a multi-threaded runtime.
pub trait AuthorizationService: Send + Sync + 'static {
    /// Resolve the itinerary a day belongs to.
    fn parent_id(
        &self,
        room: &RoomId,
    ) -> impl Future<Output = Result<ItineraryId, ApiError>> + Send;

    fn authorization(
        &self,
        itinerary: &ItineraryId,
    ) -> impl Future<Output = Result<ItineraryAuthorization, ApiError>> + Send;
}

/// Request/response comment API: bulk fetch plus the fallback write paths.
pub trait PullApi: Send + Sync + 'static {
    fn list_comments(
        &self,
        room: &RoomId,
    ) -> impl Future<Output = Result<Vec<Comment>, ApiError>> + Send;

    fn create_comment(
        &self,
        room: &RoomId,
        text: &str,
    ) -> impl Future<Output = Result<Comment, ApiError>> + Send;

    fn delete_comment(
        &self,
        room: &RoomId,
        comment: &CommentId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// Opens authenticated push links. A successful `connect` is the
/// `connect` event; an error is `connect_error`.
pub trait PushTransport: Send + Sync + 'static {
    fn connect(
        &self,
        endpoint: &str,
        auth_token: &str,
    ) -> impl Future<Output = Result<PushLink, TransportError>> + Send;
}

/// One open push connection.
///
/// Dropping `outbound` asks the transport to close the link; the transport
/// reports the end of the link with exactly one `LinkEvent::Closed`.
#[derive(Debug)]
pub struct PushLink {
    pub outbound: mpsc::UnboundedSender<PushMessage>,
    pub inbound: mpsc::UnboundedReceiver<LinkEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Message(PushMessage),
    Closed(DisconnectReason),
}

/// Who ended a push link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The remote side closed the link or the network dropped it.
    ServerInitiated(String),
    /// This client closed the link.
    ClientInitiated(String),
}

impl DisconnectReason {
    pub fn server(detail: impl Into<String>) -> Self {
        Self::ServerInitiated(detail.into())
    }

    pub fn client(detail: impl Into<String>) -> Self {
        Self::ClientInitiated(detail.into())
    }

    pub fn is_server_initiated(&self) -> bool {
        matches!(self, Self::ServerInitiated(_))
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServerInitiated(detail) => write!(f, "server disconnect: {detail}"),
            Self::ClientInitiated(detail) => write!(f, "client disconnect: {detail}"),
        }
    }
}
