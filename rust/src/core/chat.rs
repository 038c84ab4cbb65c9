use std::collections::HashSet;

use super::avatar::AvatarResolver;
use super::timestamps::format_timestamp;
use crate::state::{ChatMessage, ChatMessageView, Participant};

/// Local message list for the open league conversation.
///
/// Polls are authoritative. In replace mode a poll overwrites the list, so an optimistic
/// append survives only until the next list arrives (which normally already contains it).
/// In merge mode provisional messages missing from the server list are kept at the end.
#[derive(Debug)]
pub(crate) struct ChatTimeline {
    league_id: u64,
    messages: Vec<ChatMessage>,
    provisional: HashSet<u64>,
    merge: bool,
}

impl ChatTimeline {
    pub(crate) fn new(league_id: u64, merge: bool) -> Self {
        Self {
            league_id,
            messages: Vec::new(),
            provisional: HashSet::new(),
            merge,
        }
    }

    pub(crate) fn league_id(&self) -> u64 {
        self.league_id
    }

    pub(crate) fn len(&self) -> usize {
        self.messages.len()
    }

    pub(crate) fn apply_server_list(&mut self, server: Vec<ChatMessage>) {
        let seen: HashSet<u64> = server.iter().map(|m| m.id).collect();
        let previous = std::mem::take(&mut self.messages);
        let kept: Vec<ChatMessage> = if self.merge {
            let provisional = &self.provisional;
            previous
                .into_iter()
                .filter(|m| provisional.contains(&m.id) && !seen.contains(&m.id))
                .collect()
        } else {
            Vec::new()
        };
        if self.merge {
            self.provisional.retain(|id| !seen.contains(id));
        } else {
            self.provisional.clear();
        }

        let mut ids = HashSet::with_capacity(server.len() + kept.len());
        self.messages = server
            .into_iter()
            .chain(kept)
            .filter(|m| ids.insert(m.id))
            .collect();
    }

    /// Appends a server-confirmed message from a send. Returns false if the id was already present.
    pub(crate) fn append_confirmed(&mut self, message: ChatMessage) -> bool {
        if self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        self.provisional.insert(message.id);
        self.messages.push(message);
        true
    }

    pub(crate) fn views(
        &self,
        avatars: &AvatarResolver,
        current_user: Option<&Participant>,
    ) -> Vec<ChatMessageView> {
        self.messages
            .iter()
            .map(|m| {
                let is_mine = current_user.is_some_and(|u| u.id == m.sender.id);
                ChatMessageView {
                    id: m.id,
                    sender_id: m.sender.id,
                    sender_name: m.sender.username.clone(),
                    sender_avatar_url: avatars.resolve_for(&m.sender, current_user),
                    content: m.content.clone(),
                    timestamp_display: format_timestamp(m.timestamp.clone()),
                    is_mine,
                    is_provisional: self.provisional.contains(&m.id),
                }
            })
            .collect()
    }
}
