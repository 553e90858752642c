// Single writer for a session's CommentStore.
//
// Bulk-fetch results, fallback writes, and push events all reach the store as
// messages on this task; nothing else holds a mutable reference to it.
// Readers see immutable snapshots published on a watch channel.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};
use tripline_common::types::{Comment, CommentId, RoomId};

use super::session::{SessionStatus, SyncMode};
use crate::connection::ConnectionEvent;
use crate::liveness::Liveness;
use crate::store::{CommentStore, InsertOutcome, MergeSummary, RemoveOutcome};

pub(super) enum StoreCommand {
    Merge { comments: Vec<Comment>, ack: oneshot::Sender<MergeSummary> },
    Insert { comment: Comment, ack: oneshot::Sender<InsertOutcome> },
    Remove { id: CommentId, ack: oneshot::Sender<RemoveOutcome> },
}

pub(super) struct StoreActor {
    room: RoomId,
    store: CommentStore,
    liveness: Liveness,
    commands: mpsc::UnboundedReceiver<StoreCommand>,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    comments: watch::Sender<Arc<[Comment]>>,
    status: Arc<watch::Sender<SessionStatus>>,
}

impl StoreActor {
    pub(super) fn new(
        room: RoomId,
        liveness: Liveness,
        commands: mpsc::UnboundedReceiver<StoreCommand>,
        events: mpsc::UnboundedReceiver<ConnectionEvent>,
        comments: watch::Sender<Arc<[Comment]>>,
        status: Arc<watch::Sender<SessionStatus>>,
    ) -> Self {
        Self { room, store: CommentStore::new(), liveness, commands, events, comments, status }
    }

    pub(super) async fn run(mut self) {
        let mut events_open = true;
        loop {
            tokio::select! {
                biased;
                _ = self.liveness.retired() => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => break,
                },
                event = self.events.recv(), if events_open => match event {
                    Some(event) => self.on_event(event),
                    None => events_open = false,
                },
            }
        }
        if !self.liveness.is_live() {
            self.status.send_modify(|status| status.mode = SyncMode::Closed);
        }
        debug!(room = %self.room, "store actor stopped");
    }

    fn apply(&mut self, command: StoreCommand) {
        if !self.liveness.is_live() {
            return;
        }
        match command {
            StoreCommand::Merge { comments, ack } => {
                let summary = self.store.merge(comments);
                debug!(
                    room = %self.room,
                    inserted = summary.inserted,
                    duplicates = summary.duplicates,
                    tombstoned = summary.tombstoned,
                    "bulk fetch merged"
                );
                if summary.changed() {
                    self.publish();
                }
                let _ = ack.send(summary);
            }
            StoreCommand::Insert { comment, ack } => {
                let outcome = self.insert(comment);
                let _ = ack.send(outcome);
            }
            StoreCommand::Remove { id, ack } => {
                let outcome = self.remove(&id);
                let _ = ack.send(outcome);
            }
        }
    }

    fn on_event(&mut self, event: ConnectionEvent) {
        if !self.liveness.is_live() {
            return;
        }
        match event {
            ConnectionEvent::CommentAdded(comment) => {
                self.insert(comment);
            }
            ConnectionEvent::CommentRemoved(id) => {
                self.remove(&id);
            }
            ConnectionEvent::Joined => self.update_status(|status| {
                status.mode = SyncMode::Live;
                status.join_acknowledged = false;
            }),
            ConnectionEvent::JoinAcknowledged => {
                self.update_status(|status| status.join_acknowledged = true)
            }
            ConnectionEvent::ServerError(message) => {
                self.update_status(|status| status.last_push_error = Some(message))
            }
            ConnectionEvent::Disconnected { will_retry: true, .. } => {
                self.update_status(|status| status.mode = SyncMode::Reconnecting)
            }
            ConnectionEvent::Disconnected { reason, will_retry: false } => {
                info!(room = %self.room, %reason, "live updates paused, using pull only");
                self.update_status(|status| status.mode = SyncMode::Degraded);
            }
            ConnectionEvent::TransportUnavailable { attempts } => {
                warn!(room = %self.room, attempts, "push transport unavailable, degraded to pull only");
                self.update_status(|status| status.mode = SyncMode::Degraded);
            }
        }
    }

    fn insert(&mut self, comment: Comment) -> InsertOutcome {
        let id = comment.id.clone();
        let outcome = self.store.insert(comment);
        match outcome {
            InsertOutcome::Inserted => self.publish(),
            InsertOutcome::Duplicate => debug!(room = %self.room, comment = %id, "duplicate add ignored"),
            InsertOutcome::Tombstoned => {
                debug!(room = %self.room, comment = %id, "add for removed comment dropped")
            }
        }
        outcome
    }

    fn remove(&mut self, id: &CommentId) -> RemoveOutcome {
        let outcome = self.store.remove(id);
        match outcome {
            RemoveOutcome::Removed => self.publish(),
            RemoveOutcome::Absent => debug!(room = %self.room, comment = %id, "remove for absent comment"),
        }
        outcome
    }

    fn publish(&self) {
        self.comments.send_replace(self.store.list());
    }

    fn update_status(&self, change: impl FnOnce(&mut SessionStatus)) {
        self.status.send_if_modified(|status| {
            if status.mode == SyncMode::Closed {
                return false;
            }
            let before = status.clone();
            change(status);
            *status != before
        });
    }
}
