// Access resolution: may this user view this day?
//
// Two-hop lookup against the authorization service. When the room carries no
// parent pointer the parent itinerary is resolved first, then its owner and
// collaborator list is fetched and evaluated. Pure read; retries are the
// caller's business.

use std::sync::Arc;

use tracing::debug;
use tripline_common::types::{AccessGrant, Room, UserId};

use crate::error::SyncError;
use crate::transport::AuthorizationService;

#[derive(Debug)]
pub struct AccessResolver<A> {
    service: Arc<A>,
}

impl<A> Clone for AccessResolver<A> {
    fn clone(&self) -> Self {
        Self { service: Arc::clone(&self.service) }
    }
}

impl<A: AuthorizationService> AccessResolver<A> {
    pub fn new(service: Arc<A>) -> Self {
        Self { service }
    }

    /// Fails with `ResourceNotFound` when the day or its itinerary is gone
    /// and with `TransportUnavailable` when the service cannot be reached.
    /// A user without a relation to the itinerary gets `allowed = false`,
    /// not an error.
    pub async fn resolve(&self, room: &Room, user_id: &UserId) -> Result<AccessGrant, SyncError> {
        let itinerary = match &room.parent {
            Some(parent) => parent.clone(),
            None => self
                .service
                .parent_id(&room.id)
                .await
                .map_err(|error| SyncError::from_api(&room.id, error))?,
        };

        let authorization = self
            .service
            .authorization(&itinerary)
            .await
            .map_err(|error| SyncError::from_api(&room.id, error))?;

        let grant = AccessGrant::evaluate(user_id.clone(), &authorization);
        debug!(
            room = %room.id,
            itinerary = %itinerary,
            user = %user_id,
            allowed = grant.allowed,
            "access resolved"
        );
        Ok(grant)
    }
}
