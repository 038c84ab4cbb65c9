use crate::actions::{AppAction, InviteAction, InviteSource};
use crate::core::poller::{PollPayload, PollTarget};
use crate::error::SyncError;
use crate::state::{AppState, ChatMessage};

#[derive(uniffi::Enum, Clone, Debug)]
#[allow(clippy::large_enum_variant)] // uniffi enums cannot use Box<T> indirection
pub enum AppUpdate {
    /// Primary update stream: always send a full state snapshot.
    FullState(AppState),
}

impl AppUpdate {
    pub fn rev(&self) -> u64 {
        match self {
            AppUpdate::FullState(s) => s.rev,
        }
    }
}

#[derive(Debug)]
pub(crate) enum CoreMsg {
    Action(AppAction),
    Internal(Box<InternalEvent>),
}

#[derive(Debug)]
pub(crate) enum InternalEvent {
    // Poll cycle
    PollTick {
        target: PollTarget,
        generation: u64,
    },
    PollFetched {
        target: PollTarget,
        generation: u64,
        result: Result<PollPayload, SyncError>,
    },

    // Write results
    MessageSent {
        league_id: u64,
        result: Result<ChatMessage, SyncError>,
    },
    NotificationsAcked {
        error: Option<SyncError>,
    },
    InviteResolved {
        source: InviteSource,
        id: u64,
        action: InviteAction,
        result: Result<(), SyncError>,
    },

    // UI
    ToastAutoDismiss {
        token: u64,
    },
}
