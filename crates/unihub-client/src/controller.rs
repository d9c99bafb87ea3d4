//! Room Session State Machine.
//!
//! [`RoomController`] owns the Identity Store, the per-room session, the
//! timers and the table of outstanding gateway requests. Every input (an
//! intent from the presentation layer, a gateway event, a timer firing)
//! is applied to it one at a time by the driver.
//!
//! Each request that expects a reply is registered under a fresh
//! [`RequestId`]. The first resolution removes it from the table, so any
//! later reply for the same id is stale and dropped.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use unihub_shared::constants::{DEFAULT_PORT, DEFAULT_ROOM_NAME};
use unihub_shared::protocol::{is_rejection, rejection_reason, GatewayEvent, HostRequest, JoinRequest};
use unihub_shared::{ChannelMode, ChannelUid, RequestId, RoomCode, UserId, ValidationError};
use unihub_store::ChannelKey;

use crate::config::{ClientConfig, SessionTimings};
use crate::error::SessionError;
use crate::events::{emit_event, EventSink, SessionEvent};
use crate::gateway::SessionGateway;
use crate::identity::IdentityStore;
use crate::registry::{self, StagedRelaunch};
use crate::state::{PromotionOverlay, ProfileCard, RoomSession, SessionSnapshot, SessionState};
use crate::timers::{TimerKind, TimerSlots};

/// Parameters of a host intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostIntent {
    /// Blank names fall back to a default label.
    pub name: String,
    /// Falls back to the configured default port when absent.
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub password: String,
    /// Bind address remembered with the channel.
    #[serde(default)]
    pub address: Option<String>,
}

/// Parameters of a join intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinIntent {
    pub address: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub password: String,
}

/// What a leave intent did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Disconnected from a joined room.
    Left,
    /// A connecting join was given up.
    Abandoned,
    /// Hosts choose how to leave; the exit decision is now open.
    DecisionRequired,
}

#[derive(Debug, Clone)]
pub(crate) struct HostAttempt {
    name: String,
    address: Option<String>,
    port: u16,
    password: String,
    channel_uid: ChannelUid,
}

#[derive(Debug, Clone)]
pub(crate) struct JoinAttempt {
    address: String,
    port: u16,
    password: String,
}

#[derive(Debug, Clone)]
pub(crate) enum PendingRequest {
    Host(HostAttempt),
    Join(JoinAttempt),
    Migrate,
    Reenter,
    AcceptSecondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestKind {
    Host,
    Join,
    Migrate,
    Reenter,
    AcceptSecondary,
}

impl PendingRequest {
    fn kind(&self) -> RequestKind {
        match self {
            Self::Host(_) => RequestKind::Host,
            Self::Join(_) => RequestKind::Join,
            Self::Migrate => RequestKind::Migrate,
            Self::Reenter => RequestKind::Reenter,
            Self::AcceptSecondary => RequestKind::AcceptSecondary,
        }
    }
}

pub struct RoomController {
    pub(crate) identity: IdentityStore,
    pub(crate) session: RoomSession,
    pub(crate) state: SessionState,
    pub(crate) gateway: Box<dyn SessionGateway>,
    pub(crate) events: EventSink,
    pub(crate) timers: TimerSlots,
    pub(crate) timings: SessionTimings,
    default_port: u16,
    pub(crate) pending: HashMap<RequestId, PendingRequest>,
    next_request: u64,
    pub(crate) next_offer: u64,
}

impl RoomController {
    pub fn new(
        identity: IdentityStore,
        gateway: Box<dyn SessionGateway>,
        events: EventSink,
        timings: SessionTimings,
    ) -> Self {
        Self {
            identity,
            session: RoomSession::default(),
            state: SessionState::Idle,
            gateway,
            events,
            timers: TimerSlots::default(),
            timings,
            default_port: DEFAULT_PORT,
            pending: HashMap::new(),
            next_request: 0,
            next_offer: 0,
        }
    }

    /// Build a controller with the timings and default port from `config`.
    pub fn from_config(
        identity: IdentityStore,
        gateway: Box<dyn SessionGateway>,
        events: EventSink,
        config: &ClientConfig,
    ) -> Self {
        let mut controller = Self::new(identity, gateway, events, config.timings);
        controller.default_port = config.default_port;
        controller
    }

    // -----------------------------------------------------------------------
    // Read side
    // -----------------------------------------------------------------------

    /// State as shown to the user, including the promotion overlay.
    pub fn state(&self) -> SessionState {
        match self.session.promotion {
            PromotionOverlay::Offered(_) => SessionState::AwaitingSecondaryDecision,
            _ => self.state,
        }
    }

    /// The room state underneath any overlay.
    pub fn base_state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> &RoomSession {
        &self.session
    }

    pub fn identity(&self) -> &IdentityStore {
        &self.identity
    }

    pub fn profile_card(&self, uid: &UserId) -> Option<ProfileCard> {
        self.session.profile_card(uid)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state(),
            is_host: self.session.is_host,
            room_name: self.session.room_name.clone(),
            room_code: self.session.room_code.clone(),
            roster: self.session.roster.clone(),
            secondary: self.session.secondary.clone(),
            promotion_offered: matches!(self.session.promotion, PromotionOverlay::Offered(_)),
            exit_decision_open: self.session.exit_decision_open,
            background_banner: self.state == SessionState::Backgrounded,
        }
    }

    // -----------------------------------------------------------------------
    // Intents
    // -----------------------------------------------------------------------

    /// Start hosting a room. The reply arrives as `HostStarted` or a
    /// rejection.
    pub fn host(&mut self, intent: HostIntent) -> Result<RequestId, SessionError> {
        self.require("host a room", &[SessionState::Idle])?;
        let port = self.resolve_port(intent.port)?;
        let name = match intent.name.trim() {
            "" => DEFAULT_ROOM_NAME.to_string(),
            trimmed => trimmed.to_string(),
        };

        let staged = match self.session.take_staged() {
            (Some(channel_uid), rehost_code) => Some(StagedRelaunch {
                channel_uid,
                rehost_code,
            }),
            (None, _) => None,
        };
        let resolved = registry::resolve_host_identity(&self.identity, staged, &name, port);

        self.session.begin(true);
        self.session.channel_uid = Some(resolved.channel_uid.clone());

        let request = self.next_request_id();
        self.pending.insert(
            request,
            PendingRequest::Host(HostAttempt {
                name: name.clone(),
                address: intent.address,
                port,
                password: intent.password.clone(),
                channel_uid: resolved.channel_uid.clone(),
            }),
        );
        self.transition(SessionState::HostConnecting);

        tracing::info!(
            %request,
            name = %name,
            port,
            channel_uid = %resolved.channel_uid,
            previous_code = ?resolved.previous_code,
            "Starting host"
        );

        let params = HostRequest {
            name,
            port,
            password: intent.password,
            previous_code: resolved.previous_code,
            channel_uid: Some(resolved.channel_uid),
        };
        if let Err(e) = self.gateway.start_host(request, params) {
            self.resolve_rejected(request, e.to_string());
        }
        Ok(request)
    }

    /// Join a remote room. Resolves on `RoomAccepted`, a rejection, or the
    /// join timeout, whichever comes first.
    pub fn join(&mut self, intent: JoinIntent) -> Result<RequestId, SessionError> {
        self.require("join a room", &[SessionState::Idle])?;
        let address = intent.address.trim().to_string();
        if address.is_empty() {
            return Err(ValidationError::EmptyAddress.into());
        }
        let port = self.resolve_port(intent.port)?;

        self.session.begin(false);

        let request = self.next_request_id();
        self.pending.insert(
            request,
            PendingRequest::Join(JoinAttempt {
                address: address.clone(),
                port,
                password: intent.password.clone(),
            }),
        );
        self.transition(SessionState::JoinConnecting);
        self.timers.arm(
            TimerKind::JoinTimeout,
            request.0,
            self.timings.join_timeout,
            Instant::now(),
        );

        tracing::info!(%request, address = %address, port, "Joining room");

        let params = JoinRequest {
            address,
            port,
            password: intent.password,
        };
        if let Err(e) = self.gateway.start_client(request, params) {
            self.resolve_rejected(request, e.to_string());
        }
        Ok(request)
    }

    pub fn leave(&mut self) -> Result<LeaveOutcome, SessionError> {
        match self.state {
            SessionState::Joined => {
                self.disconnect(true);
                self.return_to_idle();
                self.emit(SessionEvent::Left);
                Ok(LeaveOutcome::Left)
            }
            SessionState::JoinConnecting => {
                tracing::info!("Abandoning join attempt");
                self.disconnect(true);
                self.return_to_idle();
                self.emit(SessionEvent::Left);
                Ok(LeaveOutcome::Abandoned)
            }
            SessionState::Hosted => {
                if !self.session.exit_decision_open {
                    self.session.exit_decision_open = true;
                    self.emit(SessionEvent::ExitDecisionOpened);
                }
                Ok(LeaveOutcome::DecisionRequired)
            }
            _ => Err(self.invalid("leave")),
        }
    }

    pub fn send_chat(&mut self, text: &str) -> Result<(), SessionError> {
        self.require("chat", &[SessionState::Hosted, SessionState::Joined])?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        self.gateway.send_chat(text)?;

        let uid = self.identity.uid().clone();
        let nick = self.identity.profile().nickname.clone();
        self.session.push_line(Some(uid.clone()), &nick, text);
        self.emit(SessionEvent::Chat {
            uid,
            nick,
            text: text.to_string(),
        });
        Ok(())
    }

    pub fn complete_setup(&mut self, nickname: &str, bio: &str) -> Result<(), SessionError> {
        self.identity.complete_setup(nickname, bio)?;
        self.emit(SessionEvent::ProfileChanged);
        Ok(())
    }

    /// Save profile edits and, while connected, pass them on to the room.
    pub fn update_profile(&mut self, nickname: &str, bio: &str) -> Result<(), SessionError> {
        self.identity.update_profile(nickname, bio)?;
        if matches!(
            self.state,
            SessionState::Hosted
                | SessionState::Joined
                | SessionState::Backgrounded
                | SessionState::Migrating
        ) {
            let profile = self.identity.profile();
            if let Err(e) = self.gateway.update_profile(&profile.nickname, &profile.bio) {
                tracing::warn!(error = %e, "Failed to forward profile update");
            }
        }
        self.emit(SessionEvent::ProfileChanged);
        Ok(())
    }

    pub fn set_avatar(&mut self, avatar: Option<Vec<u8>>) -> Result<(), SessionError> {
        self.identity.set_avatar(avatar)?;
        self.emit(SessionEvent::ProfileChanged);
        Ok(())
    }

    /// Stage a remembered host channel's identity for the next host start.
    pub fn stage_relaunch(&mut self, key: &ChannelKey) -> Result<(), SessionError> {
        let record = self
            .identity
            .channel(key)
            .ok_or_else(|| SessionError::UnknownChannel(key.clone()))?;
        if let Some(staged) = registry::staged_for(record) {
            tracing::debug!(%key, "Staged channel relaunch");
            self.session
                .stage_relaunch(staged.channel_uid, staged.rehost_code);
        }
        Ok(())
    }

    /// Host or join a remembered channel with its saved parameters.
    pub fn relaunch(&mut self, key: &ChannelKey) -> Result<RequestId, SessionError> {
        let record = self
            .identity
            .channel(key)
            .cloned()
            .ok_or_else(|| SessionError::UnknownChannel(key.clone()))?;
        self.require("relaunch a channel", &[SessionState::Idle])?;

        match record.mode {
            ChannelMode::Host => {
                self.stage_relaunch(key)?;
                self.host(HostIntent {
                    name: record.name,
                    port: Some(record.port),
                    password: record.password.unwrap_or_default(),
                    address: Some(record.address),
                })
            }
            ChannelMode::Join => self.join(JoinIntent {
                address: record.address,
                port: Some(record.port),
                password: record.password.unwrap_or_default(),
            }),
        }
    }

    pub fn forget(&mut self, key: &ChannelKey) -> Result<bool, SessionError> {
        let removed = registry::forget(&mut self.identity, key)?;
        if removed {
            self.emit(SessionEvent::ChannelsChanged);
        }
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Gateway events and timers
    // -----------------------------------------------------------------------

    pub fn handle_event(&mut self, event: GatewayEvent) {
        match event {
            GatewayEvent::HostStarted { request, room_code } => self.on_host_started(request, room_code),
            GatewayEvent::Rejected { request, reason } => self.resolve_rejected(request, reason),
            GatewayEvent::RoomAccepted { request, code, name } => {
                self.on_room_accepted(request, code, name)
            }
            GatewayEvent::SystemMessage { request, text } => self.on_system_message(request, text),
            GatewayEvent::MigrateResult { request, accepted } => {
                self.on_migrate_result(request, accepted)
            }
            GatewayEvent::ReenterResult { request, room } => self.on_reenter_result(request, room),
            GatewayEvent::RosterUpdate { entries } => {
                if self.state == SessionState::Idle {
                    tracing::debug!("Ignoring roster update while idle");
                    return;
                }
                self.session.apply_roster(entries);
                self.emit(SessionEvent::RosterUpdated {
                    participants: self.session.roster.len(),
                });
            }
            GatewayEvent::PromotionOffered => self.on_promotion_offered(),
            GatewayEvent::SecondaryAssigned { uid } => self.on_secondary_assigned(uid),
            GatewayEvent::ControlsPromotedToHost => self.on_promoted_to_host(),
            GatewayEvent::RoomClosed => {
                if self.state != SessionState::Joined {
                    tracing::debug!(state = %self.state, "Ignoring room-closed notice");
                    return;
                }
                tracing::info!("Host closed the room");
                self.return_to_idle();
                self.emit(SessionEvent::RoomClosed);
            }
            GatewayEvent::ChatReceived { uid, nick, text } => {
                if self.state == SessionState::Idle {
                    return;
                }
                self.session.push_line(Some(uid.clone()), &nick, &text);
                self.emit(SessionEvent::Chat { uid, nick, text });
            }
        }
    }

    /// Fire every timer whose deadline is at or before `now`.
    pub fn fire_due_timers(&mut self, now: Instant) {
        for (kind, token) in self.timers.take_due(now) {
            match kind {
                TimerKind::JoinTimeout => self.on_join_timeout(RequestId(token)),
                TimerKind::PromotionSettle => self.on_settle_elapsed(token),
            }
        }
    }

    fn on_host_started(&mut self, request: RequestId, room_code: RoomCode) {
        let Some(PendingRequest::Host(attempt)) = self.take_pending(request, RequestKind::Host)
        else {
            return;
        };

        self.session.enter(attempt.name.clone(), room_code.clone());
        self.transition(SessionState::Hosted);
        tracing::info!(%request, code = %room_code, "Hosting room");

        let saved = registry::record_host(
            &mut self.identity,
            &attempt.name,
            attempt.address.as_deref(),
            attempt.port,
            &attempt.password,
            attempt.channel_uid,
            room_code.clone(),
        );
        self.after_save(saved.map(|_| ()));

        self.emit(SessionEvent::RoomEntered {
            name: attempt.name,
            code: room_code,
            is_host: true,
        });
    }

    fn on_room_accepted(&mut self, request: RequestId, code: RoomCode, name: String) {
        let Some(PendingRequest::Join(attempt)) = self.take_pending(request, RequestKind::Join)
        else {
            return;
        };
        self.timers.cancel(TimerKind::JoinTimeout);

        self.session.enter(name.clone(), code.clone());
        self.transition(SessionState::Joined);
        tracing::info!(%request, code = %code, "Joined room");

        let saved = registry::record_join(
            &mut self.identity,
            &name,
            &attempt.address,
            attempt.port,
            &attempt.password,
            code.clone(),
        );
        self.after_save(saved.map(|_| ()));

        self.emit(SessionEvent::RoomEntered {
            name,
            code,
            is_host: false,
        });
    }

    fn on_system_message(&mut self, request: Option<RequestId>, text: String) {
        if is_rejection(&text) {
            // Untagged rejections belong to the join in flight, if any.
            match request.or_else(|| self.pending_join()) {
                Some(target) if self.pending.contains_key(&target) => {
                    self.resolve_rejected(target, rejection_reason(&text).to_string())
                }
                _ => tracing::debug!(?request, "Discarding stale rejection"),
            }
            return;
        }

        if self.state == SessionState::Idle {
            tracing::debug!(text = %text, "Ignoring system message while idle");
            return;
        }
        self.notice(text);
    }

    fn on_join_timeout(&mut self, request: RequestId) {
        if self.take_pending(request, RequestKind::Join).is_none() {
            return;
        }
        tracing::warn!(%request, "Join attempt timed out");
        self.disconnect(true);
        self.return_to_idle();
        self.emit(SessionEvent::ConnectionTimedOut);
    }

    /// Apply an explicit refusal to whichever request `request` refers to.
    pub(crate) fn resolve_rejected(&mut self, request: RequestId, reason: String) {
        let Some(pending) = self.pending.remove(&request) else {
            tracing::debug!(%request, "Discarding stale rejection");
            return;
        };
        tracing::warn!(%request, kind = ?pending.kind(), reason = %reason, "Request rejected");

        match pending {
            PendingRequest::Host(_) | PendingRequest::Join(_) => {
                self.return_to_idle();
                self.emit(SessionEvent::ConnectionRejected { reason });
            }
            PendingRequest::Migrate => self.migration_failed(reason),
            PendingRequest::Reenter => self.finish_reenter(None),
            PendingRequest::AcceptSecondary => {
                self.notice(format!("Secondary host request refused: {reason}"))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn resolve_port(&self, port: Option<u16>) -> Result<u16, SessionError> {
        match port.unwrap_or(self.default_port) {
            0 => Err(ValidationError::InvalidPort("0".to_string()).into()),
            port => Ok(port),
        }
    }

    pub(crate) fn next_request_id(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId(self.next_request)
    }

    /// Remove `request` from the pending table if it is of the expected
    /// kind. Anything else is a stale reply.
    pub(crate) fn take_pending(
        &mut self,
        request: RequestId,
        kind: RequestKind,
    ) -> Option<PendingRequest> {
        if self.pending.get(&request).map(PendingRequest::kind) == Some(kind) {
            self.pending.remove(&request)
        } else {
            tracing::debug!(%request, ?kind, "Discarding stale gateway reply");
            None
        }
    }

    fn pending_join(&self) -> Option<RequestId> {
        self.pending
            .iter()
            .find(|(_, pending)| pending.kind() == RequestKind::Join)
            .map(|(request, _)| *request)
    }

    pub(crate) fn require(
        &self,
        action: &'static str,
        allowed: &[SessionState],
    ) -> Result<(), SessionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    pub(crate) fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            action,
            state: self.state(),
        }
    }

    pub(crate) fn transition(&mut self, to: SessionState) {
        let before = self.state();
        self.state = to;
        self.announce(before);
    }

    /// Emit a state change if the visible state differs from `before`.
    pub(crate) fn announce(&mut self, before: SessionState) {
        let after = self.state();
        if before != after {
            tracing::info!(from = %before, to = %after, "Session state changed");
            self.emit(SessionEvent::StateChanged {
                from: before,
                to: after,
            });
        }
    }

    /// Tear the room session down. Outstanding requests and timers are
    /// dropped, so their late replies are stale.
    pub(crate) fn return_to_idle(&mut self) {
        let before = self.state();
        self.timers.cancel(TimerKind::JoinTimeout);
        self.timers.cancel(TimerKind::PromotionSettle);
        self.pending.clear();
        self.session.reset();
        self.state = SessionState::Idle;
        self.announce(before);
    }

    pub(crate) fn disconnect(&mut self, terminal: bool) {
        if let Err(e) = self.gateway.disconnect(terminal) {
            tracing::warn!(error = %e, terminal, "Failed to send disconnect");
        }
    }

    pub(crate) fn notice(&mut self, text: String) {
        self.session.push_notice(&text);
        self.emit(SessionEvent::SystemMessage { text });
    }

    fn after_save(&mut self, saved: Result<(), SessionError>) {
        match saved {
            Ok(()) => self.emit(SessionEvent::ChannelsChanged),
            Err(e) => {
                tracing::error!(error = %e, "Failed to remember channel");
                self.notice(format!("Could not save this channel: {e}"));
            }
        }
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        emit_event(&self.events, event);
    }
}
