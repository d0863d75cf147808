use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::gateway::MeetingStore;
use async_trait::async_trait;
use huddle_core::{
    ChatMessage, MeetingInfo, NewChatMessage, RoomId, ScheduledMeeting, TeamId, TeamInfo,
};
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Meeting store reached over its REST API.
///
/// - `GET  {base}/meetings/{room_id}`: meeting metadata, 404 when unknown
/// - `POST {base}/meetings/{room_id}/end`
/// - `POST {base}/chat/{room_id}/messages`: returns the stored message
/// - `GET  {base}/teams/{team_id}`: team with members, 404 when unknown
/// - `GET  {base}/schedule`: scheduled meetings with reminder state
/// - `POST {base}/schedule/{room_id}/reminders/{index}/sent`
/// - `POST {base}/schedule/{room_id}/started`
pub struct HttpMeetingStore {
    base_url: Url,
    service_token: Option<String>,
    http: reqwest::Client,
}

impl std::fmt::Debug for HttpMeetingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMeetingStore")
            .field("base_url", &self.base_url.as_str())
            .field("service_token", &self.service_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl HttpMeetingStore {
    pub fn new(
        base_url: &str,
        service_token: Option<String>,
        config: &StoreConfig,
    ) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StoreError::Unavailable(format!("invalid base url {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Unavailable(format!("{base_url} cannot be a base url")));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout())
            .timeout(config.timeout())
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            base_url,
            service_token,
            http,
        })
    }

    /// Builds the client from `[store]`; `None` when no base url is configured.
    pub fn from_config(config: &StoreConfig) -> Result<Option<Self>, StoreError> {
        match &config.base_url {
            Some(url) => Self::new(url, config.service_token.clone(), config).map(Some),
            None => Ok(None),
        }
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.service_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, StoreError> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn reject(response: Response) -> StoreError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        StoreError::Rejected { status, body }
    }

    async fn expect_success(response: Response, room_id: &RoomId) -> Result<(), StoreError> {
        match response.status() {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(room_id.clone())),
            status if status.is_success() => Ok(()),
            _ => Err(Self::reject(response).await),
        }
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl MeetingStore for HttpMeetingStore {
    async fn resolve_meeting(&self, room_id: &RoomId) -> Result<Option<MeetingInfo>, StoreError> {
        let url = self.url(&["meetings", room_id.as_str()]);
        debug!(%url, "Resolving meeting");

        let response = self.send(self.http.get(url)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Self::json(response).await.map(Some),
            _ => Err(Self::reject(response).await),
        }
    }

    async fn mark_ended(&self, room_id: &RoomId) -> Result<(), StoreError> {
        let url = self.url(&["meetings", room_id.as_str(), "end"]);

        let response = self.send(self.http.post(url)).await?;
        Self::expect_success(response, room_id).await
    }

    async fn save_chat_message(&self, message: NewChatMessage) -> Result<ChatMessage, StoreError> {
        let url = self.url(&["chat", message.room_id.as_str(), "messages"]);

        let response = self.send(self.http.post(url).json(&message)).await?;
        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }
        Self::json(response).await
    }

    async fn resolve_team(&self, team_id: &TeamId) -> Result<Option<TeamInfo>, StoreError> {
        let url = self.url(&["teams", team_id.as_str()]);

        let response = self.send(self.http.get(url)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Self::json(response).await.map(Some),
            _ => Err(Self::reject(response).await),
        }
    }

    async fn scheduled_meetings(&self) -> Result<Vec<ScheduledMeeting>, StoreError> {
        let response = self.send(self.http.get(self.url(&["schedule"]))).await?;
        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }
        Self::json(response).await
    }

    async fn mark_reminder_sent(
        &self,
        room_id: &RoomId,
        reminder: usize,
    ) -> Result<(), StoreError> {
        let index = reminder.to_string();
        let url = self.url(&["schedule", room_id.as_str(), "reminders", &index, "sent"]);

        let response = self.send(self.http.post(url)).await?;
        Self::expect_success(response, room_id).await
    }

    async fn mark_start_notified(&self, room_id: &RoomId) -> Result<(), StoreError> {
        let url = self.url(&["schedule", room_id.as_str(), "started"]);

        let response = self.send(self.http.post(url)).await?;
        Self::expect_success(response, room_id).await
    }
}
