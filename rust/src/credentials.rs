use std::sync::RwLock;

/// Read-only accessor for the caller-held bearer credential.
///
/// The core never writes through this: a 401 is reported on the view that saw it and the
/// platform decides whether to sign the user out.
#[uniffi::export(callback_interface)]
pub trait CredentialSource: Send + Sync + 'static {
    fn bearer_token(&self) -> Option<String>;
}

/// In-process credential holder for hosts that manage the token in Rust (CLI tools, tests).
#[derive(Debug, Default)]
pub struct StaticCredentials {
    token: RwLock<Option<String>>,
}

impl StaticCredentials {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token),
        }
    }

    /// Swap the held token (sign-in / sign-out on the host side).
    pub fn set_token(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut slot) => *slot = token,
            Err(poison) => *poison.into_inner() = token,
        }
    }
}

impl CredentialSource for StaticCredentials {
    fn bearer_token(&self) -> Option<String> {
        let guard = match self.token.read() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        guard
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToString::to_string)
    }
}
