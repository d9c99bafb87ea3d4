//! Runs a [`RoomController`] inside one tokio task.
//!
//! The task is the single thread of control for the room session: it waits
//! on presentation intents, gateway events and the nearest armed timer, and
//! applies whichever arrives to the controller. Gateway events are taken
//! ahead of timers and timers ahead of intents when several are ready.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use unihub_shared::protocol::GatewayEvent;
use unihub_shared::UserId;
use unihub_store::ChannelKey;

use crate::controller::{HostIntent, JoinIntent, RoomController};
use crate::error::SessionError;
use crate::events::SessionEvent;
use crate::handoff::HostExit;
use crate::state::SessionSnapshot;

const INTENT_BUFFER: usize = 64;

/// Requests from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Host(HostIntent),
    Join(JoinIntent),
    Leave,
    ChooseExit(HostExit),
    DismissExitDecision,
    Reenter,
    ShutdownBackground,
    DesignateSecondary(UserId),
    AcceptPromotion,
    DeclinePromotion,
    SendChat(String),
    StageRelaunch(ChannelKey),
    Relaunch(ChannelKey),
    Forget(ChannelKey),
    CompleteSetup { nickname: String, bio: String },
    UpdateProfile { nickname: String, bio: String },
    SetAvatar(Option<Vec<u8>>),
    /// Stop the driver task and hand the controller back.
    Shutdown,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Host(_) => "host",
            Self::Join(_) => "join",
            Self::Leave => "leave",
            Self::ChooseExit(_) => "choose-exit",
            Self::DismissExitDecision => "dismiss-exit-decision",
            Self::Reenter => "reenter",
            Self::ShutdownBackground => "shutdown-background",
            Self::DesignateSecondary(_) => "designate-secondary",
            Self::AcceptPromotion => "accept-promotion",
            Self::DeclinePromotion => "decline-promotion",
            Self::SendChat(_) => "send-chat",
            Self::StageRelaunch(_) => "stage-relaunch",
            Self::Relaunch(_) => "relaunch",
            Self::Forget(_) => "forget",
            Self::CompleteSetup { .. } => "complete-setup",
            Self::UpdateProfile { .. } => "update-profile",
            Self::SetAvatar(_) => "set-avatar",
            Self::Shutdown => "shutdown",
        }
    }
}

impl RoomController {
    /// Apply one intent. Failures are logged and reported as
    /// [`SessionEvent::IntentFailed`].
    pub fn apply(&mut self, intent: Intent) {
        let name = intent.name();
        let result = match intent {
            Intent::Host(params) => self.host(params).map(drop),
            Intent::Join(params) => self.join(params).map(drop),
            Intent::Leave => self.leave().map(drop),
            Intent::ChooseExit(exit) => self.choose_exit(exit).map(drop),
            Intent::DismissExitDecision => self.dismiss_exit_decision(),
            Intent::Reenter => self.reenter().map(drop),
            Intent::ShutdownBackground => self.shutdown_background(),
            Intent::DesignateSecondary(uid) => self.designate_secondary(&uid),
            Intent::AcceptPromotion => self.accept_promotion(),
            Intent::DeclinePromotion => self.decline_promotion(),
            Intent::SendChat(text) => self.send_chat(&text),
            Intent::StageRelaunch(key) => self.stage_relaunch(&key),
            Intent::Relaunch(key) => self.relaunch(&key).map(drop),
            Intent::Forget(key) => self.forget(&key).map(drop),
            Intent::CompleteSetup { nickname, bio } => self.complete_setup(&nickname, &bio),
            Intent::UpdateProfile { nickname, bio } => self.update_profile(&nickname, &bio),
            Intent::SetAvatar(avatar) => self.set_avatar(avatar),
            Intent::Shutdown => Ok(()),
        };

        if let Err(e) = result {
            tracing::warn!(intent = name, error = %e, "Intent failed");
            self.emit(SessionEvent::IntentFailed {
                reason: e.to_string(),
            });
        }
    }
}

pub struct ControllerHandle {
    intents: mpsc::Sender<Intent>,
    snapshots: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<RoomController>,
}

impl ControllerHandle {
    pub async fn send(&self, intent: Intent) -> Result<(), SessionError> {
        self.intents
            .send(intent)
            .await
            .map_err(|_| SessionError::ControllerStopped)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Stop the driver and take the controller back.
    pub async fn shutdown(self) -> Result<RoomController, SessionError> {
        // The task may already have stopped on its own.
        let _ = self.intents.send(Intent::Shutdown).await;
        self.task.await.map_err(|e| {
            tracing::error!(error = %e, "Room controller task failed");
            SessionError::ControllerStopped
        })
    }
}

/// Spawn the driver task for `controller`, fed by `gateway_events`.
pub fn spawn_controller(
    mut controller: RoomController,
    mut gateway_events: mpsc::UnboundedReceiver<GatewayEvent>,
) -> ControllerHandle {
    let (intent_tx, mut intent_rx) = mpsc::channel(INTENT_BUFFER);
    let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());

    let task = tokio::spawn(async move {
        let mut gateway_open = true;
        tracing::info!("Room controller started");

        loop {
            let deadline = controller.next_deadline();

            tokio::select! {
                biased;

                event = gateway_events.recv(), if gateway_open => match event {
                    Some(event) => {
                        tracing::debug!(?event, "Gateway event");
                        controller.handle_event(event);
                    }
                    None => {
                        tracing::warn!("Session backend closed its event stream");
                        gateway_open = false;
                    }
                },

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    controller.fire_due_timers(Instant::now());
                }

                intent = intent_rx.recv() => match intent {
                    Some(Intent::Shutdown) | None => break,
                    Some(intent) => {
                        tracing::debug!(intent = intent.name(), "Applying intent");
                        controller.apply(intent);
                    }
                },
            }

            snapshot_tx.send_replace(controller.snapshot());
        }

        tracing::info!("Room controller stopped");
        controller
    });

    ControllerHandle {
        intents: intent_tx,
        snapshots: snapshot_rx,
        task,
    }
}
