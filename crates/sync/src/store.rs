// Ordered, deduplicated, tombstone-aware comment collection for one session.
//
// Comments are kept ascending by `created_at`; comments with equal
// timestamps keep their arrival order. A removed id is tombstoned for the
// rest of the session so a late add (a slow bulk fetch, a replayed
// broadcast) can never resurrect it.

use std::collections::HashSet;
use std::sync::Arc;

use tripline_common::types::{Comment, CommentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The id is already present; the store is unchanged.
    Duplicate,
    /// The id was removed earlier in this session; the add is dropped.
    Tombstoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// Nothing to delete; the id is tombstoned anyway.
    Absent,
}

/// Tally of a bulk merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub inserted: usize,
    pub duplicates: usize,
    pub tombstoned: usize,
}

impl MergeSummary {
    pub fn changed(&self) -> bool {
        self.inserted > 0
    }
}

#[derive(Debug, Default)]
pub struct CommentStore {
    comments: Vec<Comment>,
    ids: HashSet<CommentId>,
    tombstones: HashSet<CommentId>,
}

impl CommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, comment: Comment) -> InsertOutcome {
        if self.tombstones.contains(&comment.id) {
            return InsertOutcome::Tombstoned;
        }
        if self.ids.contains(&comment.id) {
            return InsertOutcome::Duplicate;
        }

        let position = self.comments.partition_point(|c| c.created_at <= comment.created_at);
        self.ids.insert(comment.id.clone());
        self.comments.insert(position, comment);
        InsertOutcome::Inserted
    }

    pub fn merge(&mut self, comments: impl IntoIterator<Item = Comment>) -> MergeSummary {
        let mut summary = MergeSummary::default();
        for comment in comments {
            match self.insert(comment) {
                InsertOutcome::Inserted => summary.inserted += 1,
                InsertOutcome::Duplicate => summary.duplicates += 1,
                InsertOutcome::Tombstoned => summary.tombstoned += 1,
            }
        }
        summary
    }

    pub fn remove(&mut self, id: &CommentId) -> RemoveOutcome {
        self.tombstones.insert(id.clone());
        if !self.ids.remove(id) {
            return RemoveOutcome::Absent;
        }
        self.comments.retain(|c| &c.id != id);
        RemoveOutcome::Removed
    }

    /// Immutable snapshot, ascending by `created_at`.
    pub fn list(&self) -> Arc<[Comment]> {
        Arc::from(self.comments.as_slice())
    }

    pub fn contains(&self, id: &CommentId) -> bool {
        self.ids.contains(id)
    }

    pub fn is_tombstoned(&self, id: &CommentId) -> bool {
        self.tombstones.contains(id)
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }
}
