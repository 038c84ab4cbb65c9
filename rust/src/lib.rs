mod actions;
mod core;
mod credentials;
mod error;
mod logging;
mod signals;
mod state;
mod updates;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

use flume::{Receiver, Sender};

pub use actions::{AppAction, InviteAction, InviteSource};
pub use credentials::*;
pub use error::SyncError;
pub use signals::*;
pub use state::*;
pub use updates::*;

/// Pure helpers re-exported for platform code that renders outside the snapshot
/// (e.g. a profile header before any chat is open).
pub use crate::core::avatar::{normalize_media_url, AvatarResolver};
pub use crate::core::timestamps::{format_date, format_timestamp};

uniffi::setup_scaffolding!();

#[uniffi::export(callback_interface)]
pub trait AppReconciler: Send + Sync + 'static {
    fn reconcile(&self, update: AppUpdate);
}

#[derive(uniffi::Object)]
pub struct FfiApp {
    core_tx: Sender<CoreMsg>,
    update_rx: Receiver<AppUpdate>,
    listening: AtomicBool,
    shared_state: Arc<RwLock<AppState>>,
    signals: Arc<SignalBus>,
}

#[uniffi::export]
impl FfiApp {
    #[uniffi::constructor]
    pub fn new(data_dir: String, credentials: Box<dyn CredentialSource>) -> Arc<Self> {
        Self::with_credentials(data_dir, Arc::from(credentials))
    }

    pub fn state(&self) -> AppState {
        match self.shared_state.read() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    pub fn dispatch(&self, action: AppAction) {
        // Contract: never block caller.
        let _ = self.core_tx.send(CoreMsg::Action(action));
    }

    pub fn listen_for_updates(&self, reconciler: Box<dyn AppReconciler>) {
        if self
            .listening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Avoid multiple listeners that would split messages.
            return;
        }

        let rx = self.update_rx.clone();
        thread::spawn(move || {
            while let Ok(update) = rx.recv() {
                reconciler.reconcile(update);
            }
        });
    }

    /// Every call registers an independent listener; each one sees every signal.
    pub fn listen_for_signals(&self, listener: Box<dyn SignalListener>) {
        let rx = self.signals.subscribe();
        thread::spawn(move || {
            while let Ok(signal) = rx.recv() {
                listener.on_signal(signal);
            }
        });
    }
}

impl FfiApp {
    pub fn with_credentials(data_dir: String, credentials: Arc<dyn CredentialSource>) -> Arc<Self> {
        logging::init_logging(&data_dir);
        tracing::info!(data_dir = %data_dir, "FfiApp::new() starting");

        let (update_tx, update_rx) = flume::unbounded();
        let (core_tx, core_rx) = flume::unbounded::<CoreMsg>();
        let shared_state = Arc::new(RwLock::new(AppState::empty()));
        let signals = Arc::new(SignalBus::default());

        // Actor loop thread (single threaded "app actor").
        let core_tx_for_core = core_tx.clone();
        let shared_for_core = shared_state.clone();
        let signals_for_core = signals.clone();
        thread::spawn(move || {
            let mut core = crate::core::AppCore::new(
                update_tx,
                core_tx_for_core,
                data_dir,
                shared_for_core,
                credentials,
                signals_for_core,
            );
            while let Ok(msg) = core_rx.recv() {
                core.handle_message(msg);
            }
        });

        Arc::new(Self {
            core_tx,
            update_rx,
            listening: AtomicBool::new(false),
            shared_state,
            signals,
        })
    }

    /// Rust-side subscription to cross-component signals (group list, friends list).
    pub fn subscribe_signals(&self) -> Receiver<AppSignal> {
        self.signals.subscribe()
    }
}
