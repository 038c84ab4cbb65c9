mod api;
pub mod avatar;
mod chat;
mod config;
mod inbox;
pub(crate) mod poller;
pub mod timestamps;
mod wire;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use flume::Sender;

use crate::actions::{AppAction, InviteAction, InviteSource};
use crate::credentials::CredentialSource;
use crate::error::SyncError;
use crate::signals::{AppSignal, SignalBus};
use crate::state::{ChatViewState, InboxState};
use crate::updates::{AppUpdate, CoreMsg, InternalEvent};

use avatar::AvatarResolver;
use chat::ChatTimeline;
use inbox::Inbox;
use poller::{PollPayload, PollRegistry, PollTarget, TickDecision};

const TOAST_DURATION: Duration = Duration::from_secs(3);

const INBOX_TARGETS: [PollTarget; 2] = [PollTarget::Notifications, PollTarget::FriendRequests];

pub struct AppCore {
    pub state: crate::state::AppState,
    rev: u64,

    update_sender: Sender<AppUpdate>,
    core_sender: Sender<CoreMsg>,
    shared_state: Arc<RwLock<crate::state::AppState>>,
    credentials: Arc<dyn CredentialSource>,
    signals: Arc<SignalBus>,

    config: config::AppConfig,
    runtime: tokio::runtime::Runtime,
    api: api::ApiClient,

    pollers: PollRegistry,
    avatars: AvatarResolver,
    chat: Option<ChatTimeline>,
    inbox: Inbox,

    toast_dismiss_token: u64,
}

impl AppCore {
    pub fn new(
        update_sender: Sender<AppUpdate>,
        core_sender: Sender<CoreMsg>,
        data_dir: String,
        shared_state: Arc<RwLock<crate::state::AppState>>,
        credentials: Arc<dyn CredentialSource>,
        signals: Arc<SignalBus>,
    ) -> Self {
        let config = config::load_app_config(&data_dir);
        let state = crate::state::AppState::empty();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .enable_io()
            .build()
            .expect("tokio runtime");

        let api = api::ApiClient::new(
            config.api_base_url(),
            config.auth_scheme(),
            config.request_timeout(),
        );
        let avatars = AvatarResolver::new(config.media_base_url(), config.avatar_generator_url());
        tracing::info!(
            api = %config.api_base_url(),
            network = config.network_enabled(),
            merge_optimistic = config.merge_optimistic_messages(),
            "core configured"
        );

        let mut this = Self {
            state,
            rev: 0,
            update_sender,
            core_sender,
            shared_state,
            credentials,
            signals,
            config,
            runtime,
            api,
            pollers: PollRegistry::default(),
            avatars,
            chat: None,
            inbox: Inbox::default(),
            toast_dismiss_token: 0,
        };
        // Ensure FfiApp.state() has a coherent snapshot immediately after construction.
        let snapshot = this.state.clone();
        this.commit_state_snapshot(&snapshot);
        this
    }

    fn next_rev(&mut self) -> u64 {
        self.rev += 1;
        self.state.rev = self.rev;
        self.rev
    }

    fn commit_state_snapshot(&self, snapshot: &crate::state::AppState) {
        match self.shared_state.write() {
            Ok(mut g) => *g = snapshot.clone(),
            Err(poison) => *poison.into_inner() = snapshot.clone(),
        }
    }

    fn emit_state(&mut self) {
        self.next_rev();
        let snapshot = self.state.clone();
        self.commit_state_snapshot(&snapshot);
        let _ = self.update_sender.send(AppUpdate::FullState(snapshot));
    }

    fn toast(&mut self, msg: impl Into<String>) {
        self.state.toast = Some(msg.into());
        self.toast_dismiss_token = self.toast_dismiss_token.saturating_add(1);
        self.schedule_toast_auto_dismiss(self.toast_dismiss_token);
        self.emit_state();
    }

    fn schedule_toast_auto_dismiss(&self, token: u64) {
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(TOAST_DURATION).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(
                InternalEvent::ToastAutoDismiss { token },
            )));
        });
    }

    fn handle_toast_auto_dismiss(&mut self, token: u64) {
        if token != self.toast_dismiss_token {
            return;
        }
        if self.state.toast.is_some() {
            self.state.toast = None;
            self.emit_state();
        }
    }

    fn bearer_token(&self) -> Option<String> {
        self.credentials
            .bearer_token()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    // Projections

    fn refresh_chat_view(&mut self) {
        let (Some(view), Some(timeline)) = (self.state.chat.as_mut(), self.chat.as_ref()) else {
            return;
        };
        view.messages = timeline.views(&self.avatars, self.state.current_user.as_ref());
    }

    fn refresh_inbox_view(&mut self) {
        let inbox = &mut self.state.inbox;
        inbox.is_syncing = self.pollers.current(&PollTarget::Notifications).is_some();
        inbox.unread_count = self.inbox.unread_count();
        inbox.entries = self.inbox.entries(&self.avatars);
    }

    fn refresh_all_views(&mut self) {
        self.refresh_chat_view();
        self.refresh_inbox_view();
    }

    // Polling

    /// Starts (or restarts) a poller: immediate fetch, then one tick per interval.
    fn start_polling(&mut self, target: PollTarget, interval: Duration) {
        let generation = self.pollers.start(target, interval);
        tracing::info!(poll = target.label(), generation, ?interval, "poller started");
        self.schedule_poll_tick(target, generation, interval);
        self.try_fetch(target, generation);
    }

    fn stop_polling(&mut self, target: PollTarget) {
        if self.pollers.stop(&target) {
            tracing::info!(poll = target.label(), "poller stopped");
        }
    }

    fn schedule_poll_tick(&self, target: PollTarget, generation: u64, interval: Duration) {
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(interval).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::PollTick {
                target,
                generation,
            })));
        });
    }

    fn handle_poll_tick(&mut self, target: PollTarget, generation: u64) {
        let Some((current, interval)) = self.pollers.current(&target) else {
            return;
        };
        if current != generation {
            return;
        }
        self.schedule_poll_tick(target, generation, interval);
        self.try_fetch(target, generation);
    }

    /// Runs one fetch for `target` unless one is already in flight.
    fn try_fetch(&mut self, target: PollTarget, generation: u64) {
        match self.pollers.begin_tick(&target, generation) {
            TickDecision::Stale => return,
            TickDecision::InFlight => {
                tracing::debug!(poll = target.label(), "fetch in flight; tick skipped");
                return;
            }
            TickDecision::Fetch => {}
        }

        let Some(token) = self.bearer_token() else {
            tracing::warn!(poll = target.label(), "no credential; stopping poller");
            self.stop_polling(target);
            self.set_poll_error(target, SyncError::NotAuthenticated);
            self.state.auth_required = true;
            self.refresh_inbox_view();
            self.emit_state();
            return;
        };

        if !self.config.network_enabled() {
            return;
        }

        let api = self.api.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = api.fetch(target, &token).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::PollFetched {
                target,
                generation,
                result,
            })));
        });
    }

    fn set_poll_error(&mut self, target: PollTarget, err: SyncError) {
        match target {
            PollTarget::Messages { league_id } => {
                if let Some(view) = self.state.chat.as_mut().filter(|v| v.league_id == league_id) {
                    view.poll_error = Some(err);
                    view.is_loading = false;
                }
            }
            PollTarget::Notifications => self.state.inbox.notifications_error = Some(err),
            PollTarget::FriendRequests => self.state.inbox.friend_requests_error = Some(err),
        }
    }

    fn handle_poll_fetched(
        &mut self,
        target: PollTarget,
        generation: u64,
        result: Result<PollPayload, SyncError>,
    ) {
        if !self.pollers.finish(&target, generation) {
            tracing::debug!(poll = target.label(), generation, "stale poll response dropped");
            return;
        }

        if result.is_ok() {
            // A credential was accepted; the sign-in prompt no longer applies.
            self.state.auth_required = false;
        }
        match result {
            Ok(PollPayload::Messages(messages)) => {
                let PollTarget::Messages { league_id } = target else {
                    return;
                };
                let Some(timeline) = self.chat.as_mut().filter(|t| t.league_id() == league_id)
                else {
                    return;
                };
                timeline.apply_server_list(messages);
                tracing::debug!(league_id, count = timeline.len(), "messages replaced");
                if let Some(view) = self.state.chat.as_mut() {
                    view.poll_error = None;
                    view.is_loading = false;
                }
                self.refresh_chat_view();
            }
            Ok(PollPayload::Notifications(items)) => {
                self.inbox.replace_notifications(items);
                self.state.inbox.notifications_error = None;
                self.refresh_inbox_view();
            }
            Ok(PollPayload::FriendRequests(items)) => {
                self.inbox.replace_friend_requests(items);
                self.state.inbox.friend_requests_error = None;
                self.refresh_inbox_view();
            }
            Err(err) => {
                tracing::warn!(poll = target.label(), %err, "poll failed");
                if err.is_terminal() {
                    self.stop_polling(target);
                    self.state.auth_required = true;
                }
                self.set_poll_error(target, err);
                self.refresh_inbox_view();
            }
        }
        self.emit_state();
    }

    // League chat

    fn open_league_chat(&mut self, league_id: u64) {
        if let Some(prev) = self.chat.take() {
            self.stop_polling(PollTarget::Messages {
                league_id: prev.league_id(),
            });
        }
        self.chat = Some(ChatTimeline::new(
            league_id,
            self.config.merge_optimistic_messages(),
        ));
        self.state.chat = Some(ChatViewState {
            league_id,
            messages: vec![],
            draft: String::new(),
            is_loading: true,
            is_sending: false,
            poll_error: None,
            send_error: None,
        });
        self.emit_state();
        self.start_polling(
            PollTarget::Messages { league_id },
            self.config.message_poll_interval(),
        );
    }

    fn close_league_chat(&mut self) {
        let Some(timeline) = self.chat.take() else {
            return;
        };
        self.stop_polling(PollTarget::Messages {
            league_id: timeline.league_id(),
        });
        self.state.chat = None;
        self.emit_state();
    }

    fn send_message(&mut self, content: String) {
        let content = content.trim().to_string();
        if content.is_empty() {
            return;
        }
        let Some(view) = self.state.chat.as_mut() else {
            tracing::debug!("send without open chat ignored");
            return;
        };
        if view.is_sending {
            tracing::debug!(league_id = view.league_id, "send already in flight; ignored");
            return;
        }
        let league_id = view.league_id;

        let Some(token) = self.bearer_token() else {
            if let Some(view) = self.state.chat.as_mut() {
                view.send_error = Some(SyncError::NotAuthenticated);
            }
            self.state.auth_required = true;
            self.toast(SyncError::NotAuthenticated.user_message());
            return;
        };

        if let Some(view) = self.state.chat.as_mut() {
            view.is_sending = true;
            view.send_error = None;
        }
        self.emit_state();

        if !self.config.network_enabled() {
            return;
        }

        let api = self.api.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = api.send_message(league_id, &content, &token).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::MessageSent {
                league_id,
                result,
            })));
        });
    }

    fn handle_message_sent(&mut self, league_id: u64, result: Result<crate::state::ChatMessage, SyncError>) {
        let Some(view) = self.state.chat.as_mut().filter(|v| v.league_id == league_id) else {
            tracing::debug!(league_id, "send result for closed chat dropped");
            return;
        };
        view.is_sending = false;

        match result {
            Ok(message) => {
                view.draft.clear();
                view.send_error = None;
                let id = message.id;
                if let Some(timeline) = self.chat.as_mut() {
                    if !timeline.append_confirmed(message) {
                        tracing::debug!(league_id, id, "sent message already present");
                    }
                }
                self.refresh_chat_view();
                self.emit_state();
            }
            Err(err) => {
                tracing::warn!(league_id, %err, "send failed");
                view.send_error = Some(err.clone());
                self.toast(err.user_message());
            }
        }
    }

    // Inbox

    fn start_notification_sync(&mut self) {
        if self.pollers.current(&PollTarget::Notifications).is_some() {
            tracing::debug!("notification sync already running");
            return;
        }
        self.inbox.clear();
        self.state.inbox = InboxState::default();
        let interval = self.config.notification_poll_interval();
        for target in INBOX_TARGETS {
            // Register both before fetching so the projection sees sync as running.
            let generation = self.pollers.start(target, interval);
            self.schedule_poll_tick(target, generation, interval);
        }
        self.refresh_inbox_view();
        self.emit_state();
        for target in INBOX_TARGETS {
            if let Some((generation, _)) = self.pollers.current(&target) {
                tracing::info!(poll = target.label(), generation, ?interval, "poller started");
                self.try_fetch(target, generation);
            }
        }
    }

    fn stop_notification_sync(&mut self) {
        for target in INBOX_TARGETS {
            self.stop_polling(target);
        }
        self.inbox.clear();
        self.state.inbox = InboxState::default();
        self.emit_state();
    }

    /// Immediate out-of-schedule fetch for both inbox collections.
    fn refresh_inbox(&mut self) {
        for target in INBOX_TARGETS {
            match self.pollers.current(&target) {
                Some((generation, _)) => self.try_fetch(target, generation),
                None => tracing::debug!(poll = target.label(), "refresh ignored; not polling"),
            }
        }
    }

    fn mark_all_notifications_read(&mut self) {
        if !self.inbox.has_unread_notifications() {
            tracing::debug!("nothing unread; mark-read skipped");
            return;
        }
        self.inbox.mark_all_read();
        self.refresh_inbox_view();
        self.emit_state();

        let Some(token) = self.bearer_token() else {
            tracing::warn!("no credential; mark-read not sent");
            return;
        };
        if !self.config.network_enabled() {
            return;
        }
        let api = self.api.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let error = api.mark_notifications_read(&token).await.err();
            let _ = tx.send(CoreMsg::Internal(Box::new(
                InternalEvent::NotificationsAcked { error },
            )));
        });
    }

    fn handle_notifications_acked(&mut self, error: Option<SyncError>) {
        match error {
            // Local read state is kept; the next poll is authoritative.
            Some(err) => tracing::warn!(%err, "mark-read not acknowledged"),
            None => tracing::debug!("mark-read acknowledged"),
        }
    }

    fn resolve_invite(&mut self, source: InviteSource, id: u64, action: InviteAction) {
        let invite_id = match source {
            InviteSource::FriendRequest => self.inbox.friend_request(id).map(|r| r.id),
            InviteSource::Notification => self
                .inbox
                .notification(id)
                .filter(|n| n.is_actionable())
                .map(|n| n.reference_id.unwrap_or(n.id)),
        };
        let Some(invite_id) = invite_id else {
            tracing::debug!(?source, id, "invite not found or not actionable");
            return;
        };
        if !self.inbox.begin_resolve(source, id) {
            tracing::debug!(?source, id, "invite already resolving; ignored");
            return;
        }

        let Some(token) = self.bearer_token() else {
            self.inbox.end_resolve(source, id);
            self.state.inbox.action_error = Some(SyncError::NotAuthenticated);
            self.state.auth_required = true;
            self.toast(SyncError::NotAuthenticated.user_message());
            return;
        };

        self.state.inbox.action_error = None;
        self.refresh_inbox_view();
        self.emit_state();

        if !self.config.network_enabled() {
            return;
        }
        let api = self.api.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = match source {
                InviteSource::FriendRequest => {
                    api.handle_friend_request(invite_id, action, &token).await
                }
                InviteSource::Notification => {
                    api.handle_group_invite(invite_id, action, &token).await
                }
            };
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::InviteResolved {
                source,
                id,
                action,
                result,
            })));
        });
    }

    fn handle_invite_resolved(
        &mut self,
        source: InviteSource,
        id: u64,
        action: InviteAction,
        result: Result<(), SyncError>,
    ) {
        self.inbox.end_resolve(source, id);
        match result {
            Ok(()) => {
                self.inbox.remove(source, id);
                self.state.inbox.action_error = None;
                self.refresh_inbox_view();
                self.emit_state();
                tracing::info!(?source, id, action = action.as_wire(), "invite resolved");

                if action == InviteAction::Accept {
                    match source {
                        InviteSource::Notification => self.signals.emit(AppSignal::GroupsChanged),
                        InviteSource::FriendRequest => {
                            self.signals.emit(AppSignal::FriendsChanged);
                            self.refresh_inbox();
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!(?source, id, %err, "invite resolution failed");
                self.state.inbox.action_error = Some(err.clone());
                self.refresh_inbox_view();
                let verb = match action {
                    InviteAction::Accept => "accept",
                    InviteAction::Reject => "decline",
                };
                self.toast(format!("Could not {verb} invite: {}", err.user_message()));
            }
        }
    }

    // Session

    fn set_current_user(&mut self, user: Option<crate::state::Participant>) {
        let signed_out = user.is_none() && self.state.current_user.is_some();
        if user.is_some() {
            self.state.auth_required = false;
        }
        self.state.current_user = user;
        if signed_out {
            tracing::info!("signed out; tearing down views");
            self.pollers.stop_all();
            self.chat = None;
            self.state.chat = None;
            self.inbox.clear();
            self.state.inbox = InboxState::default();
        }
        self.refresh_all_views();
        self.emit_state();
    }

    // Dispatch

    pub fn handle_message(&mut self, msg: CoreMsg) {
        match msg {
            CoreMsg::Action(ref action) => {
                // Never log `?action` directly: it carries message bodies and image data.
                tracing::info!(action = action.tag(), "dispatch");
                self.handle_action(action.clone());
            }
            CoreMsg::Internal(internal) => self.handle_internal(*internal),
        }
    }

    fn handle_internal(&mut self, internal: InternalEvent) {
        match internal {
            InternalEvent::PollTick { target, generation } => {
                self.handle_poll_tick(target, generation)
            }
            InternalEvent::PollFetched {
                target,
                generation,
                result,
            } => self.handle_poll_fetched(target, generation, result),
            InternalEvent::MessageSent { league_id, result } => {
                self.handle_message_sent(league_id, result)
            }
            InternalEvent::NotificationsAcked { error } => self.handle_notifications_acked(error),
            InternalEvent::InviteResolved {
                source,
                id,
                action,
                result,
            } => self.handle_invite_resolved(source, id, action, result),
            InternalEvent::ToastAutoDismiss { token } => self.handle_toast_auto_dismiss(token),
        }
    }

    fn handle_action(&mut self, action: AppAction) {
        match action {
            // Session
            AppAction::SetCurrentUser { user } => self.set_current_user(user),
            AppAction::SetSessionAvatar {
                user_id,
                image_data,
            } => {
                self.avatars.set_session_image(user_id, image_data);
                self.refresh_all_views();
                self.emit_state();
            }

            // League chat
            AppAction::OpenLeagueChat { league_id } => self.open_league_chat(league_id),
            AppAction::CloseLeagueChat => self.close_league_chat(),
            AppAction::UpdateDraft { content } => {
                if let Some(view) = self.state.chat.as_mut() {
                    view.draft = content;
                    self.emit_state();
                }
            }
            AppAction::SendMessage { content } => self.send_message(content),

            // Inbox
            AppAction::StartNotificationSync => self.start_notification_sync(),
            AppAction::StopNotificationSync => self.stop_notification_sync(),
            AppAction::RefreshNotifications => self.refresh_inbox(),
            AppAction::MarkAllNotificationsRead => self.mark_all_notifications_read(),
            AppAction::ResolveInvite { source, id, action } => {
                self.resolve_invite(source, id, action)
            }

            // UI
            AppAction::ClearToast => {
                if self.state.toast.take().is_some() {
                    self.emit_state();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentials;
    use crate::state::{ChatMessage, NotificationItem, NotificationKind, Participant};

    fn make_core_with(credentials: Arc<StaticCredentials>) -> (AppCore, tempfile::TempDir) {
        let tempdir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            tempdir.path().join("roster_config.json"),
            r#"{"disable_network": true, "api_base_url": "http://127.0.0.1:9/api"}"#,
        )
        .expect("write config");
        let (update_tx, _update_rx) = flume::unbounded();
        let (core_tx, _core_rx) = flume::unbounded();
        let core = AppCore::new(
            update_tx,
            core_tx,
            tempdir.path().to_string_lossy().into_owned(),
            Arc::new(RwLock::new(crate::state::AppState::empty())),
            credentials,
            Arc::new(SignalBus::default()),
        );
        (core, tempdir)
    }

    fn make_core() -> (AppCore, tempfile::TempDir) {
        make_core_with(Arc::new(StaticCredentials::new(Some("t0k".into()))))
    }

    fn act(core: &mut AppCore, action: AppAction) {
        core.handle_message(CoreMsg::Action(action));
    }

    fn internal(core: &mut AppCore, event: InternalEvent) {
        core.handle_message(CoreMsg::Internal(Box::new(event)));
    }

    fn generation(core: &AppCore, target: PollTarget) -> u64 {
        core.pollers.current(&target).expect("poller running").0
    }

    fn deliver(core: &mut AppCore, target: PollTarget, result: Result<PollPayload, SyncError>) {
        let generation = generation(core, target);
        internal(
            core,
            InternalEvent::PollFetched {
                target,
                generation,
                result,
            },
        );
    }

    fn participant(id: u64) -> Participant {
        Participant {
            id,
            username: format!("user{id}"),
            profile_image_url: None,
            embedded_image_data: None,
        }
    }

    fn message(id: u64, sender: u64, content: &str) -> ChatMessage {
        ChatMessage {
            id,
            sender: participant(sender),
            content: content.to_string(),
            timestamp: Some("2024-03-05T14:07:00Z".into()),
        }
    }

    fn notification(id: u64, kind: NotificationKind, reference_id: Option<u64>) -> NotificationItem {
        NotificationItem {
            id,
            kind,
            message: format!("notification {id}"),
            is_read: false,
            created_at: None,
            reference_id,
            requires_action: kind == NotificationKind::GroupInvite,
        }
    }

    fn message_ids(core: &AppCore) -> Vec<u64> {
        core.state
            .chat
            .as_ref()
            .expect("chat open")
            .messages
            .iter()
            .map(|m| m.id)
            .collect()
    }

    #[test]
    fn mark_read_survives_failed_ack() {
        let (mut core, _dir) = make_core();
        act(&mut core, AppAction::StartNotificationSync);
        deliver(
            &mut core,
            PollTarget::Notifications,
            Ok(PollPayload::Notifications(vec![notification(
                1,
                NotificationKind::Generic,
                None,
            )])),
        );
        assert_eq!(core.state.inbox.unread_count, 1);

        act(&mut core, AppAction::MarkAllNotificationsRead);
        assert_eq!(core.state.inbox.unread_count, 0);
        internal(
            &mut core,
            InternalEvent::NotificationsAcked {
                error: Some(SyncError::ServerError { status: 500 }),
            },
        );
        assert_eq!(core.state.inbox.unread_count, 0);
        assert!(core.state.inbox.entries[0].is_read);

        let rev = core.state.rev;
        act(&mut core, AppAction::MarkAllNotificationsRead);
        assert_eq!(core.state.rev, rev, "second mark-read is a no-op");
    }

    #[test]
    fn sent_message_is_not_duplicated_by_next_poll() {
        let (mut core, _dir) = make_core();
        act(&mut core, AppAction::SetCurrentUser { user: Some(participant(9)) });
        act(&mut core, AppAction::OpenLeagueChat { league_id: 3 });
        let target = PollTarget::Messages { league_id: 3 };
        deliver(&mut core, target, Ok(PollPayload::Messages(vec![message(40, 2, "hey")])));
        assert!(!core.state.chat.as_ref().unwrap().is_loading);

        act(&mut core, AppAction::UpdateDraft { content: "hello".into() });
        act(&mut core, AppAction::SendMessage { content: "  hello ".into() });
        assert!(core.state.chat.as_ref().unwrap().is_sending);
        internal(
            &mut core,
            InternalEvent::MessageSent {
                league_id: 3,
                result: Ok(message(42, 9, "hello")),
            },
        );
        let chat = core.state.chat.as_ref().unwrap();
        assert!(!chat.is_sending);
        assert_eq!(chat.draft, "");
        assert_eq!(message_ids(&core), vec![40, 42]);
        assert!(core.state.chat.as_ref().unwrap().messages[1].is_mine);

        let generation = generation(&core, target);
        internal(&mut core, InternalEvent::PollTick { target, generation });
        deliver(
            &mut core,
            target,
            Ok(PollPayload::Messages(vec![
                message(40, 2, "hey"),
                message(42, 9, "hello"),
            ])),
        );
        assert_eq!(message_ids(&core), vec![40, 42]);
    }

    #[test]
    fn failed_send_keeps_messages_and_surfaces_error() {
        let (mut core, _dir) = make_core();
        act(&mut core, AppAction::OpenLeagueChat { league_id: 3 });
        let target = PollTarget::Messages { league_id: 3 };
        deliver(&mut core, target, Ok(PollPayload::Messages(vec![message(40, 2, "hey")])));
        act(&mut core, AppAction::UpdateDraft { content: "hello".into() });
        act(&mut core, AppAction::SendMessage { content: "hello".into() });
        act(&mut core, AppAction::SendMessage { content: "again".into() });
        internal(
            &mut core,
            InternalEvent::MessageSent {
                league_id: 3,
                result: Err(SyncError::Forbidden),
            },
        );
        let chat = core.state.chat.as_ref().unwrap();
        assert_eq!(chat.send_error, Some(SyncError::Forbidden));
        assert_eq!(chat.draft, "hello");
        assert_eq!(message_ids(&core), vec![40]);
        assert!(core.state.toast.is_some());
    }

    #[test]
    fn accepting_group_invite_removes_it_and_signals_once() {
        let (mut core, _dir) = make_core();
        let signals = core.signals.subscribe();
        act(&mut core, AppAction::StartNotificationSync);
        deliver(
            &mut core,
            PollTarget::Notifications,
            Ok(PollPayload::Notifications(vec![
                notification(7, NotificationKind::GroupInvite, Some(70)),
                notification(8, NotificationKind::Generic, None),
            ])),
        );
        assert_eq!(core.state.inbox.unread_count, 2);

        let resolve = AppAction::ResolveInvite {
            source: InviteSource::Notification,
            id: 7,
            action: InviteAction::Accept,
        };
        act(&mut core, resolve.clone());
        assert!(core.state.inbox.entries.iter().any(|e| e.id == 7 && e.is_resolving));
        act(&mut core, resolve);

        internal(
            &mut core,
            InternalEvent::InviteResolved {
                source: InviteSource::Notification,
                id: 7,
                action: InviteAction::Accept,
                result: Ok(()),
            },
        );
        assert!(core.state.inbox.entries.iter().all(|e| e.id != 7));
        assert_eq!(core.state.inbox.unread_count, 1);
        assert_eq!(signals.try_recv().ok(), Some(AppSignal::GroupsChanged));
        assert!(signals.try_recv().is_err());
    }

    #[test]
    fn failed_invite_resolution_keeps_item_for_retry() {
        let (mut core, _dir) = make_core();
        let signals = core.signals.subscribe();
        act(&mut core, AppAction::StartNotificationSync);
        deliver(
            &mut core,
            PollTarget::Notifications,
            Ok(PollPayload::Notifications(vec![notification(
                7,
                NotificationKind::GroupInvite,
                None,
            )])),
        );
        let resolve = AppAction::ResolveInvite {
            source: InviteSource::Notification,
            id: 7,
            action: InviteAction::Reject,
        };
        act(&mut core, resolve.clone());
        internal(
            &mut core,
            InternalEvent::InviteResolved {
                source: InviteSource::Notification,
                id: 7,
                action: InviteAction::Reject,
                result: Err(SyncError::Unreachable {
                    reason: "offline".into(),
                }),
            },
        );
        let entry = &core.state.inbox.entries[0];
        assert_eq!(entry.id, 7);
        assert!(!entry.is_resolving);
        assert!(core.state.inbox.action_error.is_some());
        assert!(core.state.toast.is_some());
        assert!(signals.try_recv().is_err());

        act(&mut core, resolve);
        assert!(core.state.inbox.entries[0].is_resolving, "retry allowed");
        assert_eq!(core.state.inbox.action_error, None);
    }

    #[test]
    fn generic_notification_is_not_resolvable() {
        let (mut core, _dir) = make_core();
        act(&mut core, AppAction::StartNotificationSync);
        deliver(
            &mut core,
            PollTarget::Notifications,
            Ok(PollPayload::Notifications(vec![notification(
                5,
                NotificationKind::Generic,
                None,
            )])),
        );
        let rev = core.state.rev;
        act(
            &mut core,
            AppAction::ResolveInvite {
                source: InviteSource::Notification,
                id: 5,
                action: InviteAction::Accept,
            },
        );
        assert_eq!(core.state.rev, rev);
    }

    #[test]
    fn auth_expired_poll_keeps_poller_running() {
        let (mut core, _dir) = make_core();
        act(&mut core, AppAction::StartNotificationSync);
        deliver(&mut core, PollTarget::Notifications, Err(SyncError::AuthExpired));
        assert_eq!(
            core.state.inbox.notifications_error,
            Some(SyncError::AuthExpired)
        );
        assert!(!core.state.auth_required);

        let generation = generation(&core, PollTarget::Notifications);
        internal(
            &mut core,
            InternalEvent::PollTick {
                target: PollTarget::Notifications,
                generation,
            },
        );
        assert!(core.pollers.is_in_flight(&PollTarget::Notifications));

        deliver(
            &mut core,
            PollTarget::Notifications,
            Ok(PollPayload::Notifications(vec![])),
        );
        assert_eq!(core.state.inbox.notifications_error, None);
    }

    #[test]
    fn refresh_while_in_flight_is_skipped() {
        let (mut core, _dir) = make_core();
        act(&mut core, AppAction::StartNotificationSync);
        let generation = generation(&core, PollTarget::Notifications);
        assert!(core.pollers.is_in_flight(&PollTarget::Notifications));
        act(&mut core, AppAction::RefreshNotifications);
        // The registry still holds the first fetch; a second begin would be refused.
        assert_eq!(
            core.pollers
                .begin_tick(&PollTarget::Notifications, generation),
            TickDecision::InFlight
        );
    }

    #[test]
    fn response_after_close_is_dropped() {
        let (mut core, _dir) = make_core();
        act(&mut core, AppAction::OpenLeagueChat { league_id: 3 });
        let target = PollTarget::Messages { league_id: 3 };
        let stale = generation(&core, target);
        act(&mut core, AppAction::CloseLeagueChat);
        let rev = core.state.rev;
        internal(
            &mut core,
            InternalEvent::PollFetched {
                target,
                generation: stale,
                result: Ok(PollPayload::Messages(vec![message(1, 2, "late")])),
            },
        );
        assert_eq!(core.state.rev, rev);
        assert!(core.state.chat.is_none());

        act(&mut core, AppAction::OpenLeagueChat { league_id: 3 });
        internal(
            &mut core,
            InternalEvent::PollFetched {
                target,
                generation: stale,
                result: Ok(PollPayload::Messages(vec![message(1, 2, "late")])),
            },
        );
        let chat = core.state.chat.as_ref().unwrap();
        assert!(chat.messages.is_empty());
        assert!(chat.is_loading);
    }

    #[test]
    fn missing_credential_stops_poller_and_requires_auth() {
        let (mut core, _dir) = make_core_with(Arc::new(StaticCredentials::new(None)));
        act(&mut core, AppAction::OpenLeagueChat { league_id: 3 });
        let chat = core.state.chat.as_ref().unwrap();
        assert_eq!(chat.poll_error, Some(SyncError::NotAuthenticated));
        assert!(core.state.auth_required);
        assert!(core
            .pollers
            .current(&PollTarget::Messages { league_id: 3 })
            .is_none());
    }

    #[test]
    fn session_avatar_applies_to_own_messages() {
        let (mut core, _dir) = make_core();
        act(&mut core, AppAction::SetCurrentUser { user: Some(participant(9)) });
        act(&mut core, AppAction::OpenLeagueChat { league_id: 3 });
        deliver(
            &mut core,
            PollTarget::Messages { league_id: 3 },
            Ok(PollPayload::Messages(vec![message(1, 9, "mine"), message(2, 4, "theirs")])),
        );
        act(
            &mut core,
            AppAction::SetSessionAvatar {
                user_id: 9,
                image_data: Some("data:image/png;base64,AAAA".into()),
            },
        );
        let messages = &core.state.chat.as_ref().unwrap().messages;
        assert_eq!(messages[0].sender_avatar_url, "data:image/png;base64,AAAA");
        assert!(messages[1].sender_avatar_url.contains("name=user4"));
    }

    #[test]
    fn own_embedded_image_beats_stale_remote_url() {
        let (mut core, _dir) = make_core();
        let me = Participant {
            embedded_image_data: Some("data:image/png;base64,EMBED".into()),
            ..participant(9)
        };
        act(&mut core, AppAction::SetCurrentUser { user: Some(me) });
        act(&mut core, AppAction::OpenLeagueChat { league_id: 3 });

        let mut echoed = message(1, 9, "mine");
        echoed.sender.profile_image_url = Some("https://cdn.example.com/old.png".into());
        let mut theirs = message(2, 4, "theirs");
        theirs.sender.profile_image_url = Some("https://cdn.example.com/four.png".into());
        deliver(
            &mut core,
            PollTarget::Messages { league_id: 3 },
            Ok(PollPayload::Messages(vec![echoed, theirs])),
        );

        let messages = &core.state.chat.as_ref().unwrap().messages;
        assert!(messages[0].is_mine);
        assert_eq!(messages[0].sender_avatar_url, "data:image/png;base64,EMBED");
        assert_eq!(messages[1].sender_avatar_url, "https://cdn.example.com/four.png");
    }

    #[test]
    fn auth_required_clears_after_credential_returns() {
        let credentials = Arc::new(StaticCredentials::new(None));
        let (mut core, _dir) = make_core_with(credentials.clone());
        act(&mut core, AppAction::StartNotificationSync);
        assert!(core.state.auth_required);
        assert!(core.pollers.current(&PollTarget::Notifications).is_none());

        credentials.set_token(Some("fresh".into()));
        act(&mut core, AppAction::StartNotificationSync);
        assert!(core.pollers.current(&PollTarget::Notifications).is_some());
        assert!(core.state.auth_required, "still set until a poll succeeds");

        deliver(
            &mut core,
            PollTarget::Notifications,
            Ok(PollPayload::Notifications(Vec::new())),
        );
        assert!(!core.state.auth_required);
        assert_eq!(core.state.inbox.notifications_error, None);
    }

    #[test]
    fn notification_requiring_action_is_resolvable() {
        let (mut core, _dir) = make_core();
        act(&mut core, AppAction::StartNotificationSync);
        let mut pending = notification(5, NotificationKind::Generic, Some(55));
        pending.requires_action = true;
        deliver(
            &mut core,
            PollTarget::Notifications,
            Ok(PollPayload::Notifications(vec![pending])),
        );
        assert!(core.state.inbox.entries[0].actionable);

        act(
            &mut core,
            AppAction::ResolveInvite {
                source: InviteSource::Notification,
                id: 5,
                action: InviteAction::Accept,
            },
        );
        assert!(core.state.inbox.entries[0].is_resolving);
    }

    #[test]
    fn sign_out_tears_down_views() {
        let (mut core, _dir) = make_core();
        act(&mut core, AppAction::SetCurrentUser { user: Some(participant(9)) });
        act(&mut core, AppAction::OpenLeagueChat { league_id: 3 });
        act(&mut core, AppAction::StartNotificationSync);
        act(&mut core, AppAction::SetCurrentUser { user: None });
        assert!(core.state.chat.is_none());
        assert!(!core.state.inbox.is_syncing);
        assert!(core.pollers.current(&PollTarget::Notifications).is_none());
    }

    #[test]
    fn toast_auto_dismiss_ignores_stale_tokens() {
        let (mut core, _dir) = make_core();
        core.toast("first");
        let first = core.toast_dismiss_token;
        core.toast("second");
        internal(&mut core, InternalEvent::ToastAutoDismiss { token: first });
        assert_eq!(core.state.toast.as_deref(), Some("second"));
        let current = core.toast_dismiss_token;
        internal(&mut core, InternalEvent::ToastAutoDismiss { token: current });
        assert_eq!(core.state.toast, None);
    }
}
