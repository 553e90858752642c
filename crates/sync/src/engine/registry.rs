// Rooms with a live session on one engine. An engine is one client, so a
// room holds at most one entry; the newest claim wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;
use tripline_common::types::RoomId;

use crate::liveness::Liveness;

#[derive(Debug, Clone, Default)]
pub(crate) struct ActiveRooms {
    rooms: Arc<Mutex<HashMap<RoomId, Liveness>>>,
}

impl ActiveRooms {
    /// Register `liveness` as the session for `room`, retiring any session
    /// that still holds it.
    pub(crate) fn claim(&self, room: &RoomId, liveness: &Liveness) {
        let previous = self.lock().insert(room.clone(), liveness.clone());
        if let Some(previous) = previous {
            if !previous.same_as(liveness) && previous.retire() {
                info!(%room, "previous session for day superseded");
            }
        }
    }

    /// Drop the entry for `room` if it still belongs to `liveness`.
    pub(crate) fn release(&self, room: &RoomId, liveness: &Liveness) {
        let mut rooms = self.lock();
        if rooms.get(room).is_some_and(|current| current.same_as(liveness)) {
            rooms.remove(room);
        }
    }

    pub(crate) fn is_open(&self, room: &RoomId) -> bool {
        self.lock().get(room).is_some_and(Liveness::is_live)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RoomId, Liveness>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(id: &str) -> RoomId {
        RoomId::from(id)
    }

    #[test]
    fn second_claim_retires_the_first() {
        let rooms = ActiveRooms::default();
        let first = Liveness::new();
        let second = Liveness::new();

        rooms.claim(&day("d1"), &first);
        rooms.claim(&day("d1"), &second);

        assert!(!first.is_live());
        assert!(second.is_live());
        assert!(rooms.is_open(&day("d1")));
    }

    #[test]
    fn claims_on_other_rooms_do_not_interfere() {
        let rooms = ActiveRooms::default();
        let first = Liveness::new();
        let second = Liveness::new();

        rooms.claim(&day("d1"), &first);
        rooms.claim(&day("d2"), &second);

        assert!(first.is_live());
        assert!(second.is_live());
    }

    #[test]
    fn stale_release_keeps_the_newer_session() {
        let rooms = ActiveRooms::default();
        let first = Liveness::new();
        let second = Liveness::new();
        rooms.claim(&day("d1"), &first);
        rooms.claim(&day("d1"), &second);

        rooms.release(&day("d1"), &first);
        assert!(rooms.is_open(&day("d1")));

        rooms.release(&day("d1"), &second);
        assert!(!rooms.is_open(&day("d1")));
    }

    #[test]
    fn retired_entry_is_not_open() {
        let rooms = ActiveRooms::default();
        let liveness = Liveness::new();
        rooms.claim(&day("d1"), &liveness);
        liveness.retire();
        assert!(!rooms.is_open(&day("d1")));
    }
}
