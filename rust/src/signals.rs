// Cross-component refresh signals.
//
// Views that own lists outside the core (group list, friends list) subscribe here and refetch
// when a signal arrives. Signals carry no payload and may be delivered more than once.

use std::sync::Mutex;

use flume::{Receiver, Sender};

#[derive(uniffi::Enum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppSignal {
    GroupsChanged,
    FriendsChanged,
}

#[uniffi::export(callback_interface)]
pub trait SignalListener: Send + Sync + 'static {
    fn on_signal(&self, signal: AppSignal);
}

#[derive(Debug, Default)]
pub struct SignalBus {
    subscribers: Mutex<Vec<Sender<AppSignal>>>,
}

impl SignalBus {
    pub fn subscribe(&self) -> Receiver<AppSignal> {
        let (tx, rx) = flume::unbounded();
        match self.subscribers.lock() {
            Ok(mut subs) => subs.push(tx),
            Err(poison) => poison.into_inner().push(tx),
        }
        rx
    }

    /// Fire-and-forget. Subscribers whose receiver was dropped are pruned.
    pub fn emit(&self, signal: AppSignal) {
        let mut subs = match self.subscribers.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        subs.retain(|tx| tx.send(signal).is_ok());
        tracing::debug!(?signal, subscribers = subs.len(), "signal emitted");
    }

    pub fn subscriber_count(&self) -> usize {
        match self.subscribers.lock() {
            Ok(g) => g.len(),
            Err(poison) => poison.into_inner().len(),
        }
    }
}
