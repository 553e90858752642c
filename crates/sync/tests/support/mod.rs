// In-memory itinerary backend shared by the engine scenarios.
//
// One `FakeBackend` plays the authorization service, the pull API, and the
// push server. Each user talks to it through a `FakeClient`, which
// implements all three collaborator traits on that user's behalf.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::mpsc;
use tripline_common::protocol::push::PushMessage;
use tripline_common::protocol::rest::WireComment;
use tripline_common::types::{
    Collaborator, CollaboratorRole, Comment, CommentId, ItineraryAuthorization, ItineraryId,
    RoomId, UserId,
};
use tripline_sync::transport::{DisconnectReason, LinkEvent, PushLink};
use tripline_sync::{
    ApiError, AuthorizationService, EngineSettings, PullApi, PushTransport, ReconnectPolicy,
    RetryPolicy, RoomSession, SyncEngine, TransportError,
};

pub const OWNER: &str = "ana";
pub const COLLABORATOR: &str = "ben";
pub const STRANGER: &str = "cleo";
pub const DAY: &str = "day-1";
pub const ITINERARY: &str = "lisbon-trip";

struct Link {
    user: UserId,
    room: Option<RoomId>,
    inbound: mpsc::UnboundedSender<LinkEvent>,
}

#[derive(Default)]
struct State {
    comments: HashMap<RoomId, Vec<Comment>>,
    links: HashMap<usize, Link>,
    next_link: usize,
    next_comment: usize,
}

pub struct FakeBackend {
    owner: UserId,
    collaborators: Vec<UserId>,
    days: HashSet<RoomId>,
    state: Mutex<State>,
    pub push_available: AtomicBool,
    pub reject_push_writes: AtomicBool,
    /// Collaborators lose access; the owner keeps it.
    pub collaborators_revoked: AtomicBool,
    /// Number of upcoming `list_comments` calls answered with 403.
    pub deny_reads: AtomicUsize,
    pub authorization_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub connect_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            owner: UserId::from(OWNER),
            collaborators: vec![UserId::from(COLLABORATOR)],
            days: HashSet::from([RoomId::from(DAY)]),
            state: Mutex::new(State::default()),
            push_available: AtomicBool::new(true),
            reject_push_writes: AtomicBool::new(false),
            collaborators_revoked: AtomicBool::new(false),
            deny_reads: AtomicUsize::new(0),
            authorization_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            connect_calls: AtomicUsize::new(0),
        })
    }

    pub fn client(self: &Arc<Self>, user: &str) -> Arc<FakeClient> {
        Arc::new(FakeClient { backend: Arc::clone(self), user: UserId::from(user) })
    }

    pub fn engine(
        self: &Arc<Self>,
        user: &str,
    ) -> SyncEngine<FakeClient, FakeClient, FakeClient> {
        let client = self.client(user);
        SyncEngine::new(
            Arc::clone(&client),
            Arc::clone(&client),
            client,
            EngineSettings::new("wss://trips.test/ws", format!("token-{user}"))
                .with_retry(RetryPolicy::default())
                .with_reconnect(ReconnectPolicy::default()),
        )
    }

    fn is_member(&self, user: &UserId) -> bool {
        user == &self.owner || self.collaborators.contains(user)
    }

    /// Seed a comment without broadcasting it.
    pub fn seed(&self, author: &str, text: &str) -> Comment {
        let mut state = self.state.lock().unwrap();
        let comment = Self::new_comment(&mut state, &UserId::from(author), text);
        state.comments.entry(RoomId::from(DAY)).or_default().push(comment.clone());
        comment
    }

    /// Broadcast an arbitrary frame to every link joined to `room`.
    pub fn broadcast(&self, room: &RoomId, frame: PushMessage) {
        let state = self.state.lock().unwrap();
        Self::fan_out(&state, room, &frame);
    }

    /// Drop every open push link from the server side.
    pub fn drop_links(&self) {
        let mut state = self.state.lock().unwrap();
        for (_, link) in state.links.drain() {
            let _ = link.inbound.send(LinkEvent::Closed(DisconnectReason::server("server restart")));
        }
    }

    pub fn stored(&self, room: &str) -> Vec<Comment> {
        let state = self.state.lock().unwrap();
        state.comments.get(&RoomId::from(room)).cloned().unwrap_or_default()
    }

    pub fn joined_links(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.links.values().filter(|link| link.room.is_some()).count()
    }

    fn new_comment(state: &mut State, author: &UserId, text: &str) -> Comment {
        state.next_comment += 1;
        let n = state.next_comment;
        Comment {
            id: CommentId::from(format!("c{n}")),
            author_id: author.clone(),
            author_name: author.to_string(),
            text: text.to_string(),
            created_at: timestamp(n),
        }
    }

    fn fan_out(state: &State, room: &RoomId, frame: &PushMessage) {
        for link in state.links.values() {
            if link.room.as_ref() == Some(room) {
                let _ = link.inbound.send(LinkEvent::Message(frame.clone()));
            }
        }
    }

    fn create(&self, user: &UserId, room: &RoomId, text: &str) -> Comment {
        let mut state = self.state.lock().unwrap();
        let comment = Self::new_comment(&mut state, user, text);
        state.comments.entry(room.clone()).or_default().push(comment.clone());
        let frame =
            PushMessage::CommentAdded { day_id: room.clone(), comment: WireComment::from(&comment) };
        Self::fan_out(&state, room, &frame);
        comment
    }

    fn handle_frame(&self, link_id: usize, frame: PushMessage) {
        let user = {
            let mut state = self.state.lock().unwrap();
            let Some(link) = state.links.get_mut(&link_id) else {
                return;
            };
            if let PushMessage::JoinDay { day_id } = &frame {
                link.room = Some(day_id.clone());
                let _ = link
                    .inbound
                    .send(LinkEvent::Message(PushMessage::RoomJoined { day_id: day_id.clone() }));
                return;
            }
            link.user.clone()
        };

        if let PushMessage::AddComment { day_id, text } = frame {
            if self.reject_push_writes.load(Ordering::SeqCst) || !self.is_member(&user) {
                let state = self.state.lock().unwrap();
                if let Some(link) = state.links.get(&link_id) {
                    let _ = link.inbound.send(LinkEvent::Message(PushMessage::Error {
                        message: "Access denied".into(),
                    }));
                }
                return;
            }
            self.create(&user, &day_id, &text);
        }
    }
}

pub fn timestamp(n: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap() + chrono::Duration::seconds(n as i64)
}

pub struct FakeClient {
    backend: Arc<FakeBackend>,
    user: UserId,
}

impl AuthorizationService for FakeClient {
    async fn parent_id(&self, room: &RoomId) -> Result<ItineraryId, ApiError> {
        if self.backend.days.contains(room) {
            Ok(ItineraryId::from(ITINERARY))
        } else {
            Err(ApiError::NotFound("Day not found".into()))
        }
    }

    async fn authorization(
        &self,
        itinerary: &ItineraryId,
    ) -> Result<ItineraryAuthorization, ApiError> {
        self.backend.authorization_calls.fetch_add(1, Ordering::SeqCst);
        if itinerary.as_str() != ITINERARY {
            return Err(ApiError::NotFound("Itinerary not found".into()));
        }
        let collaborators = if self.backend.collaborators_revoked.load(Ordering::SeqCst) {
            Vec::new()
        } else {
            self.backend
                .collaborators
                .iter()
                .map(|user_id| Collaborator {
                    user_id: user_id.clone(),
                    role: CollaboratorRole::Editor,
                })
                .collect()
        };
        Ok(ItineraryAuthorization { owner_id: self.backend.owner.clone(), collaborators })
    }
}

impl PullApi for FakeClient {
    async fn list_comments(&self, room: &RoomId) -> Result<Vec<Comment>, ApiError> {
        self.backend.list_calls.fetch_add(1, Ordering::SeqCst);
        let denied = self
            .backend
            .deny_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if denied || !self.backend.is_member(&self.user) {
            return Err(ApiError::Forbidden("Access denied".into()));
        }
        Ok(self.backend.stored(room.as_str()))
    }

    async fn create_comment(&self, room: &RoomId, text: &str) -> Result<Comment, ApiError> {
        self.backend.create_calls.fetch_add(1, Ordering::SeqCst);
        if !self.backend.is_member(&self.user) {
            return Err(ApiError::Forbidden("Access denied".into()));
        }
        Ok(self.backend.create(&self.user, room, text))
    }

    async fn delete_comment(&self, room: &RoomId, comment: &CommentId) -> Result<(), ApiError> {
        let mut state = self.backend.state.lock().unwrap();
        let comments = state.comments.entry(room.clone()).or_default();
        let Some(position) = comments.iter().position(|c| &c.id == comment) else {
            return Err(ApiError::NotFound("Comment not found".into()));
        };
        if comments[position].author_id != self.user && self.user != self.backend.owner {
            return Err(ApiError::Forbidden("Not allowed to delete this comment".into()));
        }
        comments.remove(position);
        let frame =
            PushMessage::CommentRemoved { day_id: room.clone(), comment_id: comment.clone() };
        FakeBackend::fan_out(&state, room, &frame);
        Ok(())
    }
}

impl PushTransport for FakeClient {
    async fn connect(&self, _endpoint: &str, _auth_token: &str) -> Result<PushLink, TransportError> {
        self.backend.connect_calls.fetch_add(1, Ordering::SeqCst);
        if !self.backend.push_available.load(Ordering::SeqCst) {
            return Err(TransportError::Connect("connection refused".into()));
        }

        let (outbound, mut frames) = mpsc::unbounded_channel();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let link_id = {
            let mut state = self.backend.state.lock().unwrap();
            state.next_link += 1;
            let id = state.next_link;
            state.links.insert(id, Link { user: self.user.clone(), room: None, inbound: inbound_tx });
            id
        };

        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                backend.handle_frame(link_id, frame);
            }
            backend.state.lock().unwrap().links.remove(&link_id);
        });

        Ok(PushLink { outbound, inbound })
    }
}

/// Wait until the session's comment list satisfies `predicate`.
pub async fn wait_for_comments<P: PullApi>(
    session: &RoomSession<P>,
    predicate: impl FnMut(&Arc<[Comment]>) -> bool,
) -> Arc<[Comment]> {
    let mut comments = session.subscribe();
    let snapshot = tokio::time::timeout(Duration::from_secs(30), comments.wait_for(predicate))
        .await
        .expect("comment list should reach the expected state")
        .expect("session alive")
        .clone();
    snapshot
}
