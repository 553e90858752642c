// Guarded initial bulk fetch.
//
// A grant that was just approved may not have reached the read path yet, so
// the first fetch waits for a short settle delay, and a 403 on a room the
// resolver reported as allowed gets exactly one more attempt after a longer
// delay. The grant is resolved again before that attempt; a grant revoked in
// the meantime ends the fetch with `AccessDenied`. Both delays are empirical
// workarounds for the propagation race, not a guarantee; a server-issued
// grant version would replace them.
//
// Every wake-up checks the session's liveness first: a fetch scheduled for a
// session that was stopped in the meantime is skipped.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use tripline_common::types::{AccessGrant, Comment, Room};

use crate::access::AccessResolver;
use crate::error::SyncError;
use crate::liveness::Liveness;
use crate::transport::{AuthorizationService, PullApi};

/// Upper bound on fetch attempts per `fetch` call.
pub const MAX_FETCH_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Debounce before the first fetch.
    pub settle_delay: Duration,
    /// Wait before the single retry after a 403.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { settle_delay: Duration::from_millis(500), retry_delay: Duration::from_millis(2000) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkFetch {
    /// `grant` is the one the successful attempt ran under; it differs from
    /// the caller's when the retry re-resolved access.
    Loaded { comments: Vec<Comment>, grant: AccessGrant },
    /// The session went away before a fetch was due.
    Abandoned,
}

#[derive(Debug)]
pub struct RetryCoordinator<A, P> {
    resolver: AccessResolver<A>,
    pull: Arc<P>,
    policy: RetryPolicy,
}

impl<A, P> Clone for RetryCoordinator<A, P> {
    fn clone(&self) -> Self {
        Self { resolver: self.resolver.clone(), pull: Arc::clone(&self.pull), policy: self.policy }
    }
}

impl<A: AuthorizationService, P: PullApi> RetryCoordinator<A, P> {
    pub fn new(resolver: AccessResolver<A>, pull: Arc<P>, policy: RetryPolicy) -> Self {
        Self { resolver, pull, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetch the room's comments, retrying a 403 once when `grant` says the
    /// user is allowed and a fresh resolution still agrees. Any other
    /// failure, and a second 403, is returned mapped to a `SyncError`.
    pub async fn fetch(
        &self,
        room: &Room,
        grant: &AccessGrant,
        liveness: &Liveness,
    ) -> Result<BulkFetch, SyncError> {
        let mut grant = grant.clone();
        let mut attempt = 1;
        let mut delay = self.policy.settle_delay;

        loop {
            tokio::time::sleep(delay).await;
            if !liveness.is_live() {
                debug!(room = %room.id, attempt, "session retired before fetch");
                return Ok(BulkFetch::Abandoned);
            }

            if attempt > 1 {
                grant = self.resolver.resolve(room, &grant.user_id).await?;
                if !liveness.is_live() {
                    debug!(room = %room.id, attempt, "session retired while re-resolving access");
                    return Ok(BulkFetch::Abandoned);
                }
                if !grant.allowed {
                    info!(room = %room.id, user = %grant.user_id, "access revoked before retry");
                    return Err(SyncError::AccessDenied { room: room.id.clone() });
                }
            }

            match self.pull.list_comments(&room.id).await {
                Ok(comments) => {
                    debug!(room = %room.id, attempt, count = comments.len(), "bulk fetch loaded");
                    return Ok(BulkFetch::Loaded { comments, grant });
                }
                Err(error)
                    if error.is_access_denied()
                        && grant.allowed
                        && attempt < MAX_FETCH_ATTEMPTS =>
                {
                    info!(
                        room = %room.id,
                        attempt,
                        retry_in_ms = self.policy.retry_delay.as_millis() as u64,
                        "fetch denied although access was granted, retrying once"
                    );
                    attempt += 1;
                    delay = self.policy.retry_delay;
                }
                Err(error) => return Err(SyncError::from_api(&room.id, error)),
            }
        }
    }
}
