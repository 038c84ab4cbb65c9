/// Failure taxonomy shared by the poll path and the write path.
///
/// Poll errors are stored on the view that owns the poller and never stop the
/// timer, except `NotAuthenticated`, which is terminal for that view.
#[derive(uniffi::Enum, thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("no credential available")]
    NotAuthenticated,
    #[error("credential rejected by server (401)")]
    AuthExpired,
    #[error("forbidden (403)")]
    Forbidden,
    #[error("not found (404)")]
    NotFound,
    #[error("server error ({status})")]
    ServerError { status: u16 },
    #[error("unexpected status ({status})")]
    UnexpectedStatus { status: u16 },
    #[error("server unreachable: {reason}")]
    Unreachable { reason: String },
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },
}

impl SyncError {
    /// Only a missing credential ends a view's sync; everything else self-heals on the next tick.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncError::NotAuthenticated)
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::ServerError { .. }
                | SyncError::Unreachable { .. }
                | SyncError::MalformedResponse { .. }
                | SyncError::UnexpectedStatus { .. }
        )
    }

    /// Whether the UI should route the user back to sign-in.
    pub fn requires_login(&self) -> bool {
        matches!(self, SyncError::NotAuthenticated | SyncError::AuthExpired)
    }

    /// Short inline text for the view that hit the error.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::NotAuthenticated => "Not signed in. Please log in.".to_string(),
            SyncError::AuthExpired => "Your session expired. Please log in again.".to_string(),
            SyncError::Forbidden => "You are not a member of this league.".to_string(),
            SyncError::NotFound => "Not found.".to_string(),
            SyncError::ServerError { .. } => "Server error. Please try again later.".to_string(),
            SyncError::UnexpectedStatus { status } => {
                format!("Request failed ({status}). Please try again.")
            }
            SyncError::Unreachable { .. } => {
                "Can't reach the server. Check your connection and retry.".to_string()
            }
            SyncError::MalformedResponse { .. } => {
                "Received an unexpected response. Retrying.".to_string()
            }
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return SyncError::MalformedResponse {
                reason: err.to_string(),
            };
        }
        if let Some(status) = err.status() {
            if let Some(classified) = SyncError::from_status(status.as_u16()) {
                return classified;
            }
        }
        SyncError::Unreachable {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::MalformedResponse {
            reason: err.to_string(),
        }
    }
}

impl SyncError {
    /// Maps a non-success HTTP status to the taxonomy; `None` for 2xx.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            401 => Some(SyncError::AuthExpired),
            403 => Some(SyncError::Forbidden),
            404 => Some(SyncError::NotFound),
            500..=599 => Some(SyncError::ServerError { status }),
            _ => Some(SyncError::UnexpectedStatus { status }),
        }
    }
}
