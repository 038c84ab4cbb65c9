use std::collections::HashMap;

use crate::state::Participant;

pub(crate) const DEFAULT_AVATAR_GENERATOR_URL: &str = "https://ui-avatars.com/api/";

/// Picks one image source per participant.
///
/// Priority: self-held embedded data, then the session cache (both only for the signed-in
/// user), then the remote profile URL, then a generated avatar. Self-held data wins so a
/// fresh upload is shown even while the server still returns the old URL.
#[derive(Debug, Clone)]
pub struct AvatarResolver {
    media_base_url: String,
    generator_url: String,
    /// Session-scoped images keyed by user id; never persisted.
    session_images: HashMap<u64, String>,
}

impl AvatarResolver {
    pub fn new(media_base_url: impl Into<String>, generator_url: impl Into<String>) -> Self {
        Self {
            media_base_url: media_base_url.into(),
            generator_url: generator_url.into(),
            session_images: HashMap::new(),
        }
    }

    pub fn set_session_image(&mut self, user_id: u64, image: Option<String>) {
        match image.filter(|s| !s.trim().is_empty()) {
            Some(image) => {
                self.session_images.insert(user_id, image);
            }
            None => {
                self.session_images.remove(&user_id);
            }
        }
    }

    pub fn resolve(&self, participant: &Participant, is_self: bool) -> String {
        if is_self {
            if let Some(embedded) = non_blank(participant.embedded_image_data.as_deref()) {
                return embedded.to_string();
            }
            if let Some(cached) = self.session_images.get(&participant.id) {
                return cached.clone();
            }
        }
        if let Some(url) = non_blank(participant.profile_image_url.as_deref()) {
            return normalize_media_url(url, &self.media_base_url);
        }
        self.generated(&participant.username)
    }

    /// Resolves `participant` relative to the signed-in user. The server never echoes the
    /// user's own image data, so it is read from `current_user` and wins over the sender's fields.
    pub fn resolve_for(&self, participant: &Participant, current_user: Option<&Participant>) -> String {
        let Some(me) = current_user.filter(|u| u.id == participant.id) else {
            return self.resolve(participant, false);
        };
        if let Some(embedded) = non_blank(me.embedded_image_data.as_deref()) {
            return embedded.to_string();
        }
        self.resolve(participant, true)
    }

    fn generated(&self, username: &str) -> String {
        let name = if username.trim().is_empty() {
            "U"
        } else {
            username
        };
        // Percent-encode like a browser's encodeURIComponent: spaces become %20, not `+`.
        // A literal `+` is already escaped to %2B by the form serializer.
        let encoded = url::form_urlencoded::byte_serialize(name.as_bytes())
            .collect::<String>()
            .replace('+', "%20");
        let sep = if self.generator_url.contains('?') { '&' } else { '?' };
        format!("{}{sep}name={encoded}&background=random", self.generator_url)
    }
}

/// Absolute URLs pass through; server-relative media paths are placed under `media_base_url`.
pub fn normalize_media_url(raw: &str, media_base_url: &str) -> String {
    let raw = raw.trim();
    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:") {
        return raw.to_string();
    }
    let base = media_base_url.trim_end_matches('/');
    if raw.starts_with("/media/") {
        return format!("{base}{raw}");
    }
    let path = raw.trim_start_matches('/');
    let path = path.strip_prefix("media/").unwrap_or(path);
    format!("{base}/media/{path}")
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}
