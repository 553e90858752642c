// reqwest-backed pull API and authorization service.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;
use tripline_common::protocol::rest::{
    self, AuthorizationData, CommentData, CommentsData, CreateCommentRequest, DeletedData,
    Envelope, ParentData,
};
use tripline_common::types::{Comment, CommentId, ItineraryAuthorization, ItineraryId, RoomId};
use url::Url;

use super::{AuthorizationService, PullApi};
use crate::error::ApiError;

/// HTTP client for the itinerary backend, authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: Url,
    auth_token: String,
}

impl HttpApi {
    pub fn new(base_url: &str, auth_token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, base_url: normalize_base_url(base_url)?, auth_token: auth_token.into() })
    }

    /// Append `segments` to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Transport(format!("`{}` cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request
            .bearer_auth(&self.auth_token)
            .send()
            .await
            .map_err(|error| ApiError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let fallback = status.canonical_reason().unwrap_or("request failed").to_string();
            let message = response
                .json::<Envelope<serde_json::Value>>()
                .await
                .ok()
                .and_then(|envelope| envelope.message)
                .unwrap_or(fallback);
            debug!(status = status.as_u16(), %message, "pull API request failed");
            return Err(ApiError::from_status(status.as_u16(), message));
        }

        let envelope: Envelope<T> =
            response.json().await.map_err(|error| ApiError::Decode(error.to_string()))?;
        if !envelope.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: envelope.message.unwrap_or_else(|| "request was not successful".into()),
            });
        }
        envelope.data.ok_or_else(|| ApiError::Decode("response envelope has no data".into()))
    }
}

impl PullApi for HttpApi {
    async fn list_comments(&self, room: &RoomId) -> Result<Vec<Comment>, ApiError> {
        let url = self.url(&rest::comments_path(room))?;
        let data: CommentsData = self.execute(self.client.get(url)).await?;
        Ok(data.comments.into_iter().map(|c| c.into_comment()).collect())
    }

    async fn create_comment(&self, room: &RoomId, text: &str) -> Result<Comment, ApiError> {
        let url = self.url(&rest::comments_path(room))?;
        let body = CreateCommentRequest { text: text.to_string() };
        let data: CommentData = self.execute(self.client.post(url).json(&body)).await?;
        Ok(data.comment.into_comment())
    }

    async fn delete_comment(&self, room: &RoomId, comment: &CommentId) -> Result<(), ApiError> {
        let url = self.url(&rest::comment_path(room, comment))?;
        let _: DeletedData = self.execute(self.client.delete(url)).await?;
        Ok(())
    }
}

impl AuthorizationService for HttpApi {
    async fn parent_id(&self, room: &RoomId) -> Result<ItineraryId, ApiError> {
        let url = self.url(&rest::parent_path(room))?;
        let data: ParentData = self.execute(self.client.get(url)).await?;
        Ok(data.itinerary_id)
    }

    async fn authorization(
        &self,
        itinerary: &ItineraryId,
    ) -> Result<ItineraryAuthorization, ApiError> {
        let url = self.url(&rest::authorization_path(itinerary))?;
        let data: AuthorizationData = self.execute(self.client.get(url)).await?;
        Ok(data.into_authorization())
    }
}

/// Relative joins replace the last path segment unless the base ends in `/`.
fn normalize_base_url(value: &str) -> Result<Url> {
    let mut url =
        Url::parse(value).map_err(|error| anyhow!("invalid api_url `{value}`: {error}"))?;
    if url.cannot_be_a_base() {
        return Err(anyhow!("api_url `{value}` cannot be used as a base URL"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
