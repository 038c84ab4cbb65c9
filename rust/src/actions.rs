use crate::state::Participant;

#[derive(uniffi::Enum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InviteSource {
    FriendRequest,
    Notification,
}

#[derive(uniffi::Enum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InviteAction {
    Accept,
    Reject,
}

impl InviteAction {
    /// Value of the `action` field in the handle request body.
    pub fn as_wire(&self) -> &'static str {
        match self {
            InviteAction::Accept => "accept",
            InviteAction::Reject => "reject",
        }
    }
}

#[derive(uniffi::Enum, Debug, Clone)]
pub enum AppAction {
    // Session
    SetCurrentUser {
        user: Option<Participant>,
    },
    SetSessionAvatar {
        user_id: u64,
        image_data: Option<String>,
    },

    // League chat
    OpenLeagueChat {
        league_id: u64,
    },
    CloseLeagueChat,
    UpdateDraft {
        content: String,
    },
    SendMessage {
        content: String,
    },

    // Inbox
    StartNotificationSync,
    StopNotificationSync,
    RefreshNotifications,
    MarkAllNotificationsRead,
    ResolveInvite {
        source: InviteSource,
        id: u64,
        action: InviteAction,
    },

    // UI
    ClearToast,
}

impl AppAction {
    /// Log-safe action tag (never includes message bodies or image data).
    pub fn tag(&self) -> &'static str {
        match self {
            // Session
            AppAction::SetCurrentUser { .. } => "SetCurrentUser",
            AppAction::SetSessionAvatar { .. } => "SetSessionAvatar",

            // League chat
            AppAction::OpenLeagueChat { .. } => "OpenLeagueChat",
            AppAction::CloseLeagueChat => "CloseLeagueChat",
            AppAction::UpdateDraft { .. } => "UpdateDraft",
            AppAction::SendMessage { .. } => "SendMessage",

            // Inbox
            AppAction::StartNotificationSync => "StartNotificationSync",
            AppAction::StopNotificationSync => "StopNotificationSync",
            AppAction::RefreshNotifications => "RefreshNotifications",
            AppAction::MarkAllNotificationsRead => "MarkAllNotificationsRead",
            AppAction::ResolveInvite { .. } => "ResolveInvite",

            // UI
            AppAction::ClearToast => "ClearToast",
        }
    }
}
