// One client's live binding to one day.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tripline_common::protocol::push::PushMessage;
use tripline_common::types::{AccessGrant, Comment, CommentId, RoomId, UserId};

use super::actor::StoreCommand;
use super::registry::ActiveRooms;
use crate::connection::{ConnectionHandle, ConnectionState};
use crate::error::{ErrorCode, SyncError};
use crate::liveness::Liveness;
use crate::store::{InsertOutcome, MergeSummary, RemoveOutcome};
use crate::transport::PullApi;

/// How the session currently receives updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncMode {
    #[default]
    Connecting,
    /// Push channel joined; live updates flowing.
    Live,
    Reconnecting,
    /// Pull only. Submissions still work; live updates do not arrive.
    Degraded,
    Closed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub mode: SyncMode,
    /// The server confirmed the current join.
    pub join_acknowledged: bool,
    /// Most recent `error` frame from the push server.
    pub last_push_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Sent on the push channel; the comment appears when the broadcast
    /// echo arrives.
    Broadcast,
    /// Created through the pull API and already in the local list.
    Stored(Comment),
}

/// Handle the UI holds for an open day. Dropping it stops the session.
pub struct RoomSession<P: PullApi> {
    pub(super) room_id: RoomId,
    pub(super) grant: AccessGrant,
    pub(super) pull: Arc<P>,
    pub(super) connection: ConnectionHandle,
    pub(super) liveness: Liveness,
    pub(super) store: mpsc::UnboundedSender<StoreCommand>,
    pub(super) comments: watch::Receiver<Arc<[Comment]>>,
    pub(super) status: Arc<watch::Sender<SessionStatus>>,
    pub(super) actor: JoinHandle<()>,
    pub(super) rooms: ActiveRooms,
}

impl<P: PullApi> std::fmt::Debug for RoomSession<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomSession")
            .field("room_id", &self.room_id)
            .field("grant", &self.grant)
            .finish_non_exhaustive()
    }
}

impl<P: PullApi> RoomSession<P> {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn user_id(&self) -> &UserId {
        &self.grant.user_id
    }

    pub fn grant(&self) -> &AccessGrant {
        &self.grant
    }

    pub fn is_active(&self) -> bool {
        self.liveness.is_live()
    }

    /// Current comments, ascending by creation time.
    pub fn comments(&self) -> Arc<[Comment]> {
        Arc::clone(&self.comments.borrow())
    }

    /// Receiver that is notified on every change of the comment list.
    pub fn subscribe(&self) -> watch::Receiver<Arc<[Comment]>> {
        self.comments.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Whether the server would accept a delete of `comment` by this user.
    pub fn can_delete(&self, comment: &Comment) -> bool {
        self.grant.may_delete(comment)
    }

    /// Post a comment. While joined it goes over the push channel and is
    /// not stored locally; otherwise the pull API creates it and it is
    /// stored at once.
    pub async fn submit(&self, text: &str) -> Result<SubmitOutcome, SyncError> {
        self.ensure_active()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SyncError::Validation(ErrorCode::ValidationError.default_message().into()));
        }

        if self.connection.is_joined() {
            let frame = PushMessage::AddComment { day_id: self.room_id.clone(), text: text.into() };
            match self.connection.send(frame).await {
                Ok(()) => return Ok(SubmitOutcome::Broadcast),
                Err(error) => {
                    warn!(room = %self.room_id, %error, "push send failed, posting through pull API");
                }
            }
        }

        let comment = self
            .pull
            .create_comment(&self.room_id, text)
            .await
            .map_err(|error| SyncError::from_api(&self.room_id, error))?;
        self.ensure_active()?;

        let (ack, outcome) = oneshot::channel();
        self.dispatch(StoreCommand::Insert { comment: comment.clone(), ack })?;
        let _: InsertOutcome = self.await_ack(outcome).await?;
        Ok(SubmitOutcome::Stored(comment))
    }

    /// Delete through the pull API, then drop and tombstone the id locally.
    pub async fn remove(&self, comment_id: &CommentId) -> Result<(), SyncError> {
        self.ensure_active()?;
        self.pull
            .delete_comment(&self.room_id, comment_id)
            .await
            .map_err(|error| SyncError::from_api(&self.room_id, error))?;
        self.ensure_active()?;

        let (ack, outcome) = oneshot::channel();
        self.dispatch(StoreCommand::Remove { id: comment_id.clone(), ack })?;
        let _: RemoveOutcome = self.await_ack(outcome).await?;
        Ok(())
    }

    /// The "try again" action after live updates were lost: restart the push
    /// channel with a fresh reconnect budget.
    pub fn reconnect(&self) {
        if self.is_active() {
            self.connection.reconnect();
        }
    }

    /// Tear down synchronously. Pending timers and callbacks become no-ops.
    pub fn stop(&self) {
        if self.liveness.retire() {
            info!(room = %self.room_id, "session stopped");
        }
        self.connection.close();
        self.status.send_modify(|status| status.mode = SyncMode::Closed);
        self.actor.abort();
        self.rooms.release(&self.room_id, &self.liveness);
    }

    pub(super) async fn merge(&self, comments: Vec<Comment>) -> Result<MergeSummary, SyncError> {
        let (ack, outcome) = oneshot::channel();
        self.dispatch(StoreCommand::Merge { comments, ack })?;
        self.await_ack(outcome).await
    }

    fn ensure_active(&self) -> Result<(), SyncError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(SyncError::SessionClosed { room: self.room_id.clone() })
        }
    }

    fn dispatch(&self, command: StoreCommand) -> Result<(), SyncError> {
        self.store
            .send(command)
            .map_err(|_| SyncError::SessionClosed { room: self.room_id.clone() })
    }

    async fn await_ack<R>(&self, outcome: oneshot::Receiver<R>) -> Result<R, SyncError> {
        outcome.await.map_err(|_| SyncError::SessionClosed { room: self.room_id.clone() })
    }
}

impl<P: PullApi> Drop for RoomSession<P> {
    fn drop(&mut self) {
        self.stop();
    }
}
