// Server payload normalization.
//
// The backend has shipped several field spellings over time (`content` vs `message`,
// `type` vs `notification_type`, wrapped vs bare friend-request lists, numeric vs string
// timestamps). Everything is folded into one canonical shape here so nothing downstream
// has to care.

use serde::Deserialize;
use serde_json::Value;

use crate::error::SyncError;
use crate::state::{ChatMessage, FriendRequestItem, NotificationItem, NotificationKind, Participant};

#[derive(Debug, Deserialize)]
struct WireParticipant {
    id: u64,
    username: String,
    #[serde(default, alias = "profileImageUrl")]
    profile_image_url: Option<String>,
    #[serde(default, alias = "embeddedImageData")]
    embedded_image_data: Option<String>,
}

impl From<WireParticipant> for Participant {
    fn from(w: WireParticipant) -> Self {
        Participant {
            id: w.id,
            username: w.username,
            profile_image_url: w.profile_image_url.filter(|s| !s.trim().is_empty()),
            embedded_image_data: w.embedded_image_data.filter(|s| !s.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: u64,
    sender: WireParticipant,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default, alias = "createdAt")]
    created_at: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireNotification {
    id: u64,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    notification_type: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, alias = "isRead")]
    is_read: bool,
    #[serde(default, alias = "createdAt")]
    created_at: Option<Value>,
    #[serde(default, alias = "referenceId")]
    reference_id: Option<u64>,
    #[serde(default, alias = "requiresAction")]
    requires_action: bool,
}

#[derive(Debug, Deserialize)]
struct WireFriendRequest {
    id: u64,
    #[serde(alias = "fromUser")]
    from_user: WireParticipant,
    #[serde(default, alias = "createdAt")]
    created_at: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireFriendRequestList {
    Wrapped { requests: Vec<WireFriendRequest> },
    Bare(Vec<WireFriendRequest>),
}

fn malformed(what: &str, err: impl std::fmt::Display) -> SyncError {
    SyncError::MalformedResponse {
        reason: format!("{what}: {err}"),
    }
}

/// Strings pass through, numbers are stringified (epoch seconds/millis), anything else is dropped.
fn timestamp_text(v: Option<Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn normalize_message(w: WireMessage) -> Result<ChatMessage, SyncError> {
    let content = w
        .content
        .or(w.message)
        .ok_or_else(|| malformed("message", format!("id {} has no content", w.id)))?;
    Ok(ChatMessage {
        id: w.id,
        sender: w.sender.into(),
        content,
        timestamp: timestamp_text(w.timestamp).or_else(|| timestamp_text(w.created_at)),
    })
}

pub(super) fn notification_kind(raw: Option<&str>) -> NotificationKind {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("league_invite") | Some("group_invite") | Some("groupinvite") => {
            NotificationKind::GroupInvite
        }
        Some("friend_request") | Some("friendrequest") => NotificationKind::FriendRequest,
        _ => NotificationKind::Generic,
    }
}

fn normalize_notification(w: WireNotification) -> NotificationItem {
    let kind = notification_kind(w.kind.as_deref().or(w.notification_type.as_deref()));
    NotificationItem {
        id: w.id,
        kind,
        message: w.message.unwrap_or_default(),
        is_read: w.is_read,
        created_at: timestamp_text(w.created_at),
        reference_id: w.reference_id,
        requires_action: w.requires_action,
    }
}

pub(super) fn parse_messages(body: &[u8]) -> Result<Vec<ChatMessage>, SyncError> {
    let raw: Vec<WireMessage> =
        serde_json::from_slice(body).map_err(|e| malformed("messages", e))?;
    raw.into_iter().map(normalize_message).collect()
}

pub(super) fn parse_message(body: &[u8]) -> Result<ChatMessage, SyncError> {
    let raw: WireMessage = serde_json::from_slice(body).map_err(|e| malformed("message", e))?;
    normalize_message(raw)
}

pub(super) fn parse_notifications(body: &[u8]) -> Result<Vec<NotificationItem>, SyncError> {
    let raw: Vec<WireNotification> =
        serde_json::from_slice(body).map_err(|e| malformed("notifications", e))?;
    Ok(raw.into_iter().map(normalize_notification).collect())
}

pub(super) fn parse_friend_requests(body: &[u8]) -> Result<Vec<FriendRequestItem>, SyncError> {
    let raw: WireFriendRequestList =
        serde_json::from_slice(body).map_err(|e| malformed("friend requests", e))?;
    let list = match raw {
        WireFriendRequestList::Wrapped { requests } => requests,
        WireFriendRequestList::Bare(list) => list,
    };
    Ok(list
        .into_iter()
        .map(|w| FriendRequestItem {
            id: w.id,
            from_user: w.from_user.into(),
            created_at: timestamp_text(w.created_at),
        })
        .collect())
}
