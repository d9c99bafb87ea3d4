//! Host-Handoff Coordinator: how a host leaves its room, and the
//! secondary-host promotion handshake on both sides.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use unihub_shared::{RequestId, RoomInfo, UserId};

use crate::controller::{PendingRequest, RequestKind, RoomController};
use crate::error::SessionError;
use crate::events::SessionEvent;
use crate::state::{PromotionOverlay, SessionState};
use crate::timers::TimerKind;

/// The three ways a host can leave its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostExit {
    /// Close the room for everyone.
    Shutdown,
    /// Keep the room running without this client in the foreground.
    Background,
    /// Hand the room to the designated secondary host.
    Migrate,
}

impl RoomController {
    /// Close the exit decision without leaving.
    pub fn dismiss_exit_decision(&mut self) -> Result<(), SessionError> {
        if !self.session.exit_decision_open {
            return Err(self.invalid("dismiss the exit decision"));
        }
        self.close_exit_decision();
        Ok(())
    }

    fn close_exit_decision(&mut self) {
        if std::mem::take(&mut self.session.exit_decision_open) {
            self.emit(SessionEvent::ExitDecisionDismissed);
        }
    }

    /// Leave a hosted room. Returns the request id when the exit waits on
    /// the gateway (migration).
    pub fn choose_exit(&mut self, exit: HostExit) -> Result<Option<RequestId>, SessionError> {
        self.require("leave the hosted room", &[SessionState::Hosted])?;
        self.close_exit_decision();
        tracing::info!(?exit, "Host leaving room");

        match exit {
            HostExit::Shutdown => {
                self.disconnect(true);
                self.return_to_idle();
                self.emit(SessionEvent::ServerShutdown);
                Ok(None)
            }
            HostExit::Background => {
                self.disconnect(false);
                self.transition(SessionState::Backgrounded);
                self.emit(SessionEvent::BackgroundBanner { visible: true });
                Ok(None)
            }
            HostExit::Migrate => {
                let request = self.next_request_id();
                self.pending.insert(request, PendingRequest::Migrate);
                self.transition(SessionState::Migrating);
                if let Err(e) = self.gateway.migrate_host(request) {
                    self.resolve_rejected(request, e.to_string());
                }
                Ok(Some(request))
            }
        }
    }

    pub(crate) fn on_migrate_result(&mut self, request: RequestId, accepted: bool) {
        if self.take_pending(request, RequestKind::Migrate).is_none() {
            return;
        }
        if accepted {
            tracing::info!(%request, "Room handed to secondary host");
            self.return_to_idle();
            self.emit(SessionEvent::Migrated);
        } else {
            self.migration_failed("No secondary host assigned".to_string());
        }
    }

    pub(crate) fn migration_failed(&mut self, reason: String) {
        tracing::warn!(reason = %reason, "Migration failed, still hosting");
        self.transition(SessionState::Hosted);
        self.notice(format!("Migration failed: {reason}"));
        self.emit(SessionEvent::MigrationFailed { reason });
    }

    /// Ask the gateway whether the backgrounded room is still alive.
    pub fn reenter(&mut self) -> Result<RequestId, SessionError> {
        self.require("reenter the room", &[SessionState::Backgrounded])?;
        // A newer re-entry supersedes one still in flight.
        self.pending
            .retain(|_, pending| !matches!(pending, PendingRequest::Reenter));

        let request = self.next_request_id();
        self.pending.insert(request, PendingRequest::Reenter);
        if let Err(e) = self.gateway.reenter(request) {
            self.resolve_rejected(request, e.to_string());
        }
        Ok(request)
    }

    pub(crate) fn on_reenter_result(&mut self, request: RequestId, room: Option<RoomInfo>) {
        if self.take_pending(request, RequestKind::Reenter).is_none() {
            return;
        }
        self.finish_reenter(room);
    }

    pub(crate) fn finish_reenter(&mut self, room: Option<RoomInfo>) {
        self.emit(SessionEvent::BackgroundBanner { visible: false });
        match room {
            Some(info) => {
                tracing::info!(code = %info.code, "Re-entered backgrounded room");
                self.session.roster.clear();
                self.session.transcript.clear();
                self.session.enter(info.name.clone(), info.code.clone());
                self.transition(SessionState::Hosted);
                self.emit(SessionEvent::RoomEntered {
                    name: info.name,
                    code: info.code,
                    is_host: true,
                });
            }
            None => {
                tracing::info!("Backgrounded room has expired");
                self.return_to_idle();
                self.emit(SessionEvent::RoomExpired);
            }
        }
    }

    /// Stop a backgrounded room for good.
    pub fn shutdown_background(&mut self) -> Result<(), SessionError> {
        self.require("shut the background room down", &[SessionState::Backgrounded])?;
        self.disconnect(true);
        self.return_to_idle();
        self.emit(SessionEvent::BackgroundBanner { visible: false });
        self.emit(SessionEvent::ServerShutdown);
        Ok(())
    }

    /// Ask a roster member to stand by as secondary host. No reply is
    /// expected.
    pub fn designate_secondary(&mut self, uid: &UserId) -> Result<(), SessionError> {
        self.require("designate a secondary host", &[SessionState::Hosted])?;
        let nick = self
            .session
            .roster
            .iter()
            .find(|entry| &entry.uid == uid)
            .map(|entry| entry.nick.clone())
            .ok_or_else(|| SessionError::UnknownParticipant(uid.clone()))?;

        self.gateway.request_secondary(uid)?;
        tracing::info!(uid = %uid.short(), "Requested secondary host");
        self.notice(format!("Requested {nick} to act as secondary host."));
        Ok(())
    }

    pub(crate) fn on_promotion_offered(&mut self) {
        if !self.state.is_live() {
            tracing::debug!(state = %self.state, "Ignoring promotion offer");
            return;
        }
        let before = self.state();
        if let PromotionOverlay::Settling(offer) = self.session.promotion {
            tracing::info!(offer, "New promotion offer supersedes pending acceptance");
            self.timers.cancel(TimerKind::PromotionSettle);
        }
        self.next_offer += 1;
        self.session.promotion = PromotionOverlay::Offered(self.next_offer);
        self.announce(before);
        self.emit(SessionEvent::PromotionOffered);
    }

    /// Accept the displayed offer. The gateway hears about it once the
    /// settle delay has passed.
    pub fn accept_promotion(&mut self) -> Result<(), SessionError> {
        let PromotionOverlay::Offered(offer) = self.session.promotion else {
            return Err(self.invalid("accept a secondary-host offer"));
        };
        let before = self.state();
        self.session.promotion = PromotionOverlay::Settling(offer);
        self.timers.arm(
            TimerKind::PromotionSettle,
            offer,
            self.timings.promotion_settle,
            Instant::now(),
        );
        self.announce(before);
        self.notice("Testing port capability...".to_string());
        self.emit(SessionEvent::PromotionDismissed { accepted: true });
        Ok(())
    }

    pub fn decline_promotion(&mut self) -> Result<(), SessionError> {
        if !matches!(self.session.promotion, PromotionOverlay::Offered(_)) {
            return Err(self.invalid("decline a secondary-host offer"));
        }
        let before = self.state();
        self.session.promotion = PromotionOverlay::Hidden;
        self.announce(before);
        self.emit(SessionEvent::PromotionDismissed { accepted: false });
        Ok(())
    }

    pub(crate) fn on_settle_elapsed(&mut self, offer: u64) {
        if self.session.promotion != PromotionOverlay::Settling(offer) {
            tracing::debug!(offer, "Discarding superseded settle timer");
            return;
        }
        self.session.promotion = PromotionOverlay::Hidden;

        let request = self.next_request_id();
        self.pending.insert(request, PendingRequest::AcceptSecondary);
        tracing::info!(%request, offer, "Accepting secondary host duty");
        if let Err(e) = self.gateway.accept_secondary(request) {
            self.resolve_rejected(request, e.to_string());
        }
    }

    pub(crate) fn on_secondary_assigned(&mut self, uid: UserId) {
        if self.state == SessionState::Idle {
            return;
        }
        let is_self = &uid == self.identity.uid();
        // Any assignment settles the candidacy, whoever was picked.
        self.pending
            .retain(|_, pending| !matches!(pending, PendingRequest::AcceptSecondary));
        tracing::info!(uid = %uid.short(), is_self, "Secondary host assigned");
        self.session.secondary = Some(uid.clone());
        self.emit(SessionEvent::SecondaryAssigned { uid, is_self });
    }

    pub(crate) fn on_promoted_to_host(&mut self) {
        if self.state != SessionState::Joined {
            tracing::debug!(state = %self.state, "Ignoring promotion to host");
            return;
        }
        self.timers.cancel(TimerKind::PromotionSettle);
        self.pending
            .retain(|_, pending| !matches!(pending, PendingRequest::AcceptSecondary));
        let before = self.state();
        self.session.promotion = PromotionOverlay::Hidden;
        self.session.is_host = true;
        self.session.secondary = None;
        self.state = SessionState::Hosted;
        self.announce(before);
        self.notice("You are now the host.".to_string());
        self.emit(SessionEvent::PromotedToHost);
    }
}
