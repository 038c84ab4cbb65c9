// REST client for the league backend.
//
// Cheap to clone (reqwest pools connections internally); each spawned task gets its own copy.

use std::time::Duration;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder};
use serde_json::json;

use super::poller::{PollPayload, PollTarget};
use super::wire;
use crate::actions::InviteAction;
use crate::error::SyncError;
use crate::state::ChatMessage;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone)]
pub(crate) struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth_scheme: String,
    timeout: Duration,
}

impl ApiClient {
    pub(crate) fn new(base_url: String, auth_scheme: String, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            auth_scheme,
            timeout,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str, token: &str) -> Result<RequestBuilder, SyncError> {
        let auth = HeaderValue::from_str(&format!("{} {}", self.auth_scheme, token)).map_err(
            |_| SyncError::NotAuthenticated,
        )?;
        Ok(self
            .http
            .request(method, self.url(path))
            .timeout(self.timeout)
            .header(AUTHORIZATION, auth)
            .header(REQUEST_ID_HEADER, uuid::Uuid::new_v4().to_string()))
    }

    /// Sends the request and returns the body of a 2xx response; other statuses are classified.
    async fn execute(&self, req: RequestBuilder, what: &'static str) -> Result<Vec<u8>, SyncError> {
        let resp = req.send().await.map_err(|e| {
            tracing::debug!(what, err = %e, "request failed before response");
            SyncError::from(e)
        })?;
        let status = resp.status().as_u16();
        if let Some(err) = SyncError::from_status(status) {
            tracing::debug!(what, status, "request rejected");
            return Err(err);
        }
        let body = resp.bytes().await.map_err(SyncError::from)?;
        Ok(body.to_vec())
    }

    async fn get(&self, path: &str, token: &str, what: &'static str) -> Result<Vec<u8>, SyncError> {
        let req = self.request(Method::GET, path, token)?;
        self.execute(req, what).await
    }

    async fn post(
        &self,
        path: &str,
        token: &str,
        body: Option<serde_json::Value>,
        what: &'static str,
    ) -> Result<Vec<u8>, SyncError> {
        let mut req = self.request(Method::POST, path, token)?;
        if let Some(body) = body {
            req = req.json(&body);
        }
        self.execute(req, what).await
    }

    pub(crate) async fn fetch(&self, target: PollTarget, token: &str) -> Result<PollPayload, SyncError> {
        match target {
            PollTarget::Messages { league_id } => {
                let body = self
                    .get(&format!("leagues/{league_id}/chat/messages"), token, "messages")
                    .await?;
                wire::parse_messages(&body).map(PollPayload::Messages)
            }
            PollTarget::Notifications => {
                let body = self.get("notifications/", token, "notifications").await?;
                wire::parse_notifications(&body).map(PollPayload::Notifications)
            }
            PollTarget::FriendRequests => {
                let body = self.get("friend-requests/", token, "friend_requests").await?;
                wire::parse_friend_requests(&body).map(PollPayload::FriendRequests)
            }
        }
    }

    pub(crate) async fn send_message(
        &self,
        league_id: u64,
        content: &str,
        token: &str,
    ) -> Result<ChatMessage, SyncError> {
        let body = self
            .post(
                &format!("leagues/{league_id}/chat/send/"),
                token,
                Some(json!({ "content": content })),
                "send_message",
            )
            .await?;
        wire::parse_message(&body)
    }

    /// Acknowledgement only; the body is ignored.
    pub(crate) async fn mark_notifications_read(&self, token: &str) -> Result<(), SyncError> {
        self.post("notifications/mark-read/", token, None, "mark_read")
            .await
            .map(|_| ())
    }

    pub(crate) async fn handle_friend_request(
        &self,
        request_id: u64,
        action: InviteAction,
        token: &str,
    ) -> Result<(), SyncError> {
        self.post(
            &format!("friend-request/{request_id}/handle/"),
            token,
            Some(json!({ "action": action.as_wire() })),
            "handle_friend_request",
        )
        .await
        .map(|_| ())
    }

    pub(crate) async fn handle_group_invite(
        &self,
        invite_id: u64,
        action: InviteAction,
        token: &str,
    ) -> Result<(), SyncError> {
        self.post(
            &format!("league-invites/{invite_id}/handle/"),
            token,
            Some(json!({ "action": action.as_wire() })),
            "handle_group_invite",
        )
        .await
        .map(|_| ())
    }
}
