// Friend requests and notifications, merged only at projection time.

use std::cmp::Ordering;
use std::collections::HashSet;

use super::avatar::AvatarResolver;
use super::timestamps::{format_date, parse_timestamp};
use crate::actions::InviteSource;
use crate::state::{FriendRequestItem, InboxEntry, InboxEntrySource, NotificationItem};

#[derive(Debug, Default)]
pub(crate) struct Inbox {
    notifications: Vec<NotificationItem>,
    friend_requests: Vec<FriendRequestItem>,
    resolving: HashSet<(InviteSource, u64)>,
}

impl Inbox {
    pub(crate) fn replace_notifications(&mut self, items: Vec<NotificationItem>) {
        self.notifications = items;
    }

    pub(crate) fn replace_friend_requests(&mut self, items: Vec<FriendRequestItem>) {
        self.friend_requests = items;
    }

    pub(crate) fn clear(&mut self) {
        self.notifications.clear();
        self.friend_requests.clear();
        self.resolving.clear();
    }

    /// Unread notifications plus every pending friend request. Always derived, never stored.
    pub(crate) fn unread_count(&self) -> u32 {
        let unread = self.notifications.iter().filter(|n| !n.is_read).count();
        u32::try_from(unread + self.friend_requests.len()).unwrap_or(u32::MAX)
    }

    pub(crate) fn has_unread_notifications(&self) -> bool {
        self.notifications.iter().any(|n| !n.is_read)
    }

    /// Returns true when anything changed.
    pub(crate) fn mark_all_read(&mut self) -> bool {
        let mut changed = false;
        for n in self.notifications.iter_mut().filter(|n| !n.is_read) {
            n.is_read = true;
            changed = true;
        }
        changed
    }

    pub(crate) fn friend_request(&self, id: u64) -> Option<&FriendRequestItem> {
        self.friend_requests.iter().find(|r| r.id == id)
    }

    pub(crate) fn notification(&self, id: u64) -> Option<&NotificationItem> {
        self.notifications.iter().find(|n| n.id == id)
    }

    pub(crate) fn remove(&mut self, source: InviteSource, id: u64) -> bool {
        let before = self.len();
        match source {
            InviteSource::FriendRequest => self.friend_requests.retain(|r| r.id != id),
            InviteSource::Notification => self.notifications.retain(|n| n.id != id),
        }
        self.len() != before
    }

    fn len(&self) -> usize {
        self.notifications.len() + self.friend_requests.len()
    }

    /// Marks an item as resolving. Returns false if it already was.
    pub(crate) fn begin_resolve(&mut self, source: InviteSource, id: u64) -> bool {
        self.resolving.insert((source, id))
    }

    pub(crate) fn end_resolve(&mut self, source: InviteSource, id: u64) {
        self.resolving.remove(&(source, id));
    }

    pub(crate) fn is_resolving(&self, source: InviteSource, id: u64) -> bool {
        self.resolving.contains(&(source, id))
    }

    /// Newest first; rows without a parseable timestamp go last in source order
    /// (friend requests, then notifications).
    pub(crate) fn entries(&self, avatars: &AvatarResolver) -> Vec<InboxEntry> {
        let requests = self.friend_requests.iter().map(|r| {
            let entry = InboxEntry {
                source: InboxEntrySource::FriendRequest,
                id: r.id,
                text: format!("{} sent you a friend request", r.from_user.username),
                avatar_url: Some(avatars.resolve(&r.from_user, false)),
                created_at_display: format_date(r.created_at.clone()),
                is_read: false,
                actionable: true,
                is_resolving: self.is_resolving(InviteSource::FriendRequest, r.id),
            };
            (r.created_at.as_deref().and_then(parse_timestamp), entry)
        });
        let notifications = self.notifications.iter().map(|n| {
            let entry = InboxEntry {
                source: InboxEntrySource::Notification { kind: n.kind },
                id: n.id,
                text: n.message.clone(),
                avatar_url: None,
                created_at_display: format_date(n.created_at.clone()),
                is_read: n.is_read,
                actionable: n.is_actionable(),
                is_resolving: self.is_resolving(InviteSource::Notification, n.id),
            };
            (n.created_at.as_deref().and_then(parse_timestamp), entry)
        });

        let mut rows: Vec<_> = requests.chain(notifications).collect();
        // Stable sort keeps source order among equal keys.
        rows.sort_by(|(a, _), (b, _)| match (a, b) {
            (Some(a), Some(b)) => b.cmp(a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        rows.into_iter().map(|(_, entry)| entry).collect()
    }
}
