// Sync engine: the only entry point a UI talks to.
//
// `start` gates on access, spawns the push connection and the store actor,
// and performs the guarded bulk fetch. Everything after that flows through
// the returned `RoomSession`.
//
// An engine stands for one client: it keeps at most one active session per
// day. Starting a day that is already open retires the older session.

mod actor;
mod registry;
mod session;

pub use session::{RoomSession, SessionStatus, SubmitOutcome, SyncMode};

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tripline_common::types::{Comment, Room, RoomId, UserId};

use self::actor::StoreActor;
use self::registry::ActiveRooms;
use crate::access::AccessResolver;
use crate::connection::{ConnectionConfig, ConnectionManager, ReconnectPolicy};
use crate::error::SyncError;
use crate::liveness::Liveness;
use crate::retry::{BulkFetch, RetryCoordinator, RetryPolicy};
use crate::transport::{AuthorizationService, PullApi, PushTransport};

/// Endpoint, credentials, and timing for every session an engine starts.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub push_endpoint: String,
    pub auth_token: String,
    pub retry: RetryPolicy,
    pub reconnect: ReconnectPolicy,
}

impl EngineSettings {
    pub fn new(push_endpoint: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            push_endpoint: push_endpoint.into(),
            auth_token: auth_token.into(),
            retry: RetryPolicy::default(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }
}

pub struct SyncEngine<A, P, T> {
    resolver: AccessResolver<A>,
    retry: RetryCoordinator<A, P>,
    pull: Arc<P>,
    push: Arc<T>,
    settings: EngineSettings,
    active: ActiveRooms,
}

impl<A, P, T> SyncEngine<A, P, T>
where
    A: AuthorizationService,
    P: PullApi,
    T: PushTransport,
{
    pub fn new(authorization: Arc<A>, pull: Arc<P>, push: Arc<T>, settings: EngineSettings) -> Self {
        let resolver = AccessResolver::new(authorization);
        Self {
            retry: RetryCoordinator::new(resolver.clone(), Arc::clone(&pull), settings.retry),
            resolver,
            pull,
            push,
            settings,
            active: ActiveRooms::default(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Whether a session started by this engine is still active on `room`.
    pub fn is_open(&self, room: &RoomId) -> bool {
        self.active.is_open(room)
    }

    /// Open a day for `user_id`.
    ///
    /// Fails with `AccessDenied` (without ever connecting) when the user has
    /// no relation to the itinerary, and with `AccessDenied` or
    /// `ResourceNotFound` when the guarded bulk fetch is refused for good.
    /// A bulk fetch that fails for any other reason is logged; the session
    /// still starts and fills from live updates.
    ///
    /// A session this engine already holds for the same day is stopped. If
    /// the new session is itself superseded before its bulk fetch finishes,
    /// `start` fails with `SessionClosed`.
    pub async fn start(&self, room: Room, user_id: UserId) -> Result<RoomSession<P>, SyncError> {
        let grant = self.resolver.resolve(&room, &user_id).await?;
        if !grant.allowed {
            info!(room = %room.id, user = %user_id, "access denied, not connecting");
            return Err(SyncError::AccessDenied { room: room.id });
        }

        let room_id = room.id.clone();
        let liveness = Liveness::new();
        self.active.claim(&room_id, &liveness);
        let (store_tx, store_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (comments_tx, comments_rx) =
            watch::channel::<Arc<[Comment]>>(Arc::from(Vec::<Comment>::new()));
        let status = Arc::new(watch::channel(SessionStatus::default()).0);

        let connection = ConnectionManager::spawn_with_liveness(
            ConnectionConfig {
                endpoint: self.settings.push_endpoint.clone(),
                auth_token: self.settings.auth_token.clone(),
                room: room_id.clone(),
            },
            self.settings.reconnect,
            Arc::clone(&self.push),
            events_tx,
            liveness.clone(),
        );

        let actor = StoreActor::new(
            room_id.clone(),
            liveness.clone(),
            store_rx,
            events_rx,
            comments_tx,
            Arc::clone(&status),
        );
        let actor = tokio::spawn(actor.run());

        let mut session = RoomSession {
            room_id,
            grant,
            pull: Arc::clone(&self.pull),
            connection,
            liveness,
            store: store_tx,
            comments: comments_rx,
            status,
            actor,
            rooms: self.active.clone(),
        };
        info!(room = %session.room_id, user = %session.user_id(), "session started");

        match self.retry.fetch(&room, &session.grant, &session.liveness).await {
            Ok(BulkFetch::Loaded { comments, grant }) => {
                session.grant = grant;
                session.merge(comments).await?;
            }
            Ok(BulkFetch::Abandoned) => {}
            Err(error) => {
                if error.code().is_terminal() {
                    warn!(room = %session.room_id, %error, "bulk fetch refused");
                    session.stop();
                    return Err(error);
                }
                warn!(room = %session.room_id, %error, "bulk fetch failed, continuing with live updates");
            }
        }

        if !session.is_active() {
            info!(room = %session.room_id, "superseded before the bulk fetch finished");
            session.stop();
            return Err(SyncError::SessionClosed { room: session.room_id.clone() });
        }
        Ok(session)
    }
}
