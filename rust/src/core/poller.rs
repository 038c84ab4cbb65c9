// Poll bookkeeping for the actor: one entry per mounted collection endpoint.
//
// Timers and fetches run on the tokio runtime; the actor only tracks generations and the
// in-flight bit. Every start mints a new generation so ticks and responses from a stopped
// poller can be recognized and dropped.

use std::collections::HashMap;
use std::time::Duration;

use crate::state::{ChatMessage, FriendRequestItem, NotificationItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum PollTarget {
    Messages { league_id: u64 },
    Notifications,
    FriendRequests,
}

impl PollTarget {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            PollTarget::Messages { .. } => "messages",
            PollTarget::Notifications => "notifications",
            PollTarget::FriendRequests => "friend_requests",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum PollPayload {
    Messages(Vec<ChatMessage>),
    Notifications(Vec<NotificationItem>),
    FriendRequests(Vec<FriendRequestItem>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickDecision {
    /// Generation no longer current (stopped or restarted).
    Stale,
    /// A fetch for this target is still running; this tick is dropped.
    InFlight,
    Fetch,
}

#[derive(Debug)]
struct Poller {
    generation: u64,
    interval: Duration,
    in_flight: bool,
}

#[derive(Debug, Default)]
pub(crate) struct PollRegistry {
    pollers: HashMap<PollTarget, Poller>,
    next_generation: u64,
}

impl PollRegistry {
    /// (Re)starts polling `target`; any previous generation becomes stale.
    pub(crate) fn start(&mut self, target: PollTarget, interval: Duration) -> u64 {
        self.next_generation = self.next_generation.wrapping_add(1);
        let generation = self.next_generation;
        self.pollers.insert(
            target,
            Poller {
                generation,
                interval,
                in_flight: false,
            },
        );
        generation
    }

    pub(crate) fn stop(&mut self, target: &PollTarget) -> bool {
        self.pollers.remove(target).is_some()
    }

    pub(crate) fn stop_all(&mut self) {
        self.pollers.clear();
    }

    pub(crate) fn current(&self, target: &PollTarget) -> Option<(u64, Duration)> {
        self.pollers
            .get(target)
            .map(|p| (p.generation, p.interval))
    }

    #[cfg(test)]
    pub(crate) fn is_in_flight(&self, target: &PollTarget) -> bool {
        self.pollers.get(target).is_some_and(|p| p.in_flight)
    }

    /// Decides whether a tick may start a fetch; marks the target in flight when it may.
    pub(crate) fn begin_tick(&mut self, target: &PollTarget, generation: u64) -> TickDecision {
        let Some(p) = self.pollers.get_mut(target) else {
            return TickDecision::Stale;
        };
        if p.generation != generation {
            return TickDecision::Stale;
        }
        if p.in_flight {
            return TickDecision::InFlight;
        }
        p.in_flight = true;
        TickDecision::Fetch
    }

    /// Clears the in-flight bit. Returns false when the response belongs to a stale generation
    /// and must not be applied.
    pub(crate) fn finish(&mut self, target: &PollTarget, generation: u64) -> bool {
        match self.pollers.get_mut(target) {
            Some(p) if p.generation == generation => {
                p.in_flight = false;
                true
            }
            _ => false,
        }
    }
}
