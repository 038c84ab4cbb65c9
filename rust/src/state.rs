use crate::error::SyncError;

/// Full snapshot handed to the platform on every change.
#[derive(uniffi::Record, Clone, Debug, PartialEq)]
pub struct AppState {
    pub rev: u64,
    pub current_user: Option<Participant>,
    /// Set when a view found no credential; the UI should route to sign-in.
    pub auth_required: bool,
    pub chat: Option<ChatViewState>,
    pub inbox: InboxState,
    pub toast: Option<String>,
}

impl AppState {
    pub fn empty() -> Self {
        Self {
            rev: 0,
            current_user: None,
            auth_required: false,
            chat: None,
            inbox: InboxState::default(),
            toast: None,
        }
    }
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct Participant {
    pub id: u64,
    pub username: String,
    pub profile_image_url: Option<String>,
    pub embedded_image_data: Option<String>,
}

/// Canonical message shape after wire normalization.
#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: u64,
    pub sender: Participant,
    pub content: String,
    /// Raw server timestamp; formatted only at projection time.
    pub timestamp: Option<String>,
}

#[derive(uniffi::Enum, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Generic,
    GroupInvite,
    FriendRequest,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct NotificationItem {
    pub id: u64,
    pub kind: NotificationKind,
    pub message: String,
    pub is_read: bool,
    pub created_at: Option<String>,
    /// Server-side invite id for actionable notifications.
    pub reference_id: Option<u64>,
    pub requires_action: bool,
}

impl NotificationItem {
    /// Group invites and anything the server flags with `requires_action` offer accept/decline.
    pub fn is_actionable(&self) -> bool {
        self.kind == NotificationKind::GroupInvite || self.requires_action
    }
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct FriendRequestItem {
    pub id: u64,
    pub from_user: Participant,
    pub created_at: Option<String>,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessageView {
    pub id: u64,
    pub sender_id: u64,
    pub sender_name: String,
    pub sender_avatar_url: String,
    pub content: String,
    pub timestamp_display: String,
    pub is_mine: bool,
    /// Appended locally after a successful send and not yet seen in a poll.
    pub is_provisional: bool,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq)]
pub struct ChatViewState {
    pub league_id: u64,
    pub messages: Vec<ChatMessageView>,
    pub draft: String,
    /// True until the first poll for this view lands (success or error).
    pub is_loading: bool,
    pub is_sending: bool,
    pub poll_error: Option<SyncError>,
    pub send_error: Option<SyncError>,
}

#[derive(uniffi::Enum, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InboxEntrySource {
    FriendRequest,
    Notification { kind: NotificationKind },
}

/// One row of the merged friend-request + notification list.
#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct InboxEntry {
    pub source: InboxEntrySource,
    pub id: u64,
    pub text: String,
    pub avatar_url: Option<String>,
    pub created_at_display: String,
    pub is_read: bool,
    pub actionable: bool,
    pub is_resolving: bool,
}

#[derive(uniffi::Record, Clone, Debug, Default, PartialEq)]
pub struct InboxState {
    pub is_syncing: bool,
    pub unread_count: u32,
    pub entries: Vec<InboxEntry>,
    pub notifications_error: Option<SyncError>,
    pub friend_requests_error: Option<SyncError>,
    pub action_error: Option<SyncError>,
}
