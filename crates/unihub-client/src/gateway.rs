//! The seam between the room controller and the session backend.
//!
//! The controller never blocks on the backend: every request is handed off
//! through [`SessionGateway::submit`] and its reply arrives later as a
//! `GatewayEvent` on the driver's event channel.

use tokio::sync::mpsc;

use unihub_shared::protocol::{GatewayCommand, HostRequest, JoinRequest};
use unihub_shared::{GatewayError, RequestId, UserId};

/// Outbound side of the session backend. Implementors only provide
/// [`submit`](SessionGateway::submit); the per-request helpers build the
/// matching [`GatewayCommand`].
pub trait SessionGateway: Send {
    /// Hand one command to the backend without waiting for it.
    fn submit(&mut self, command: GatewayCommand) -> Result<(), GatewayError>;

    fn start_host(&mut self, request: RequestId, params: HostRequest) -> Result<(), GatewayError> {
        self.submit(GatewayCommand::StartHost { request, params })
    }

    fn start_client(&mut self, request: RequestId, params: JoinRequest) -> Result<(), GatewayError> {
        self.submit(GatewayCommand::StartClient { request, params })
    }

    fn disconnect(&mut self, terminal: bool) -> Result<(), GatewayError> {
        self.submit(GatewayCommand::Disconnect { terminal })
    }

    fn migrate_host(&mut self, request: RequestId) -> Result<(), GatewayError> {
        self.submit(GatewayCommand::MigrateHost { request })
    }

    fn request_secondary(&mut self, target: &UserId) -> Result<(), GatewayError> {
        self.submit(GatewayCommand::RequestSecondary {
            target: target.clone(),
        })
    }

    fn accept_secondary(&mut self, request: RequestId) -> Result<(), GatewayError> {
        self.submit(GatewayCommand::AcceptSecondary { request })
    }

    fn reenter(&mut self, request: RequestId) -> Result<(), GatewayError> {
        self.submit(GatewayCommand::Reenter { request })
    }

    fn send_chat(&mut self, text: &str) -> Result<(), GatewayError> {
        self.submit(GatewayCommand::SendChat {
            text: text.to_string(),
        })
    }

    fn update_profile(&mut self, nickname: &str, bio: &str) -> Result<(), GatewayError> {
        self.submit(GatewayCommand::UpdateProfile {
            nickname: nickname.to_string(),
            bio: bio.to_string(),
        })
    }
}

/// Gateway that forwards commands over an in-process channel to whatever
/// task owns the backend connection.
#[derive(Debug, Clone)]
pub struct ChannelGateway {
    tx: mpsc::UnboundedSender<GatewayCommand>,
}

impl ChannelGateway {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<GatewayCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SessionGateway for ChannelGateway {
    fn submit(&mut self, command: GatewayCommand) -> Result<(), GatewayError> {
        tracing::debug!(?command, "Submitting gateway command");
        self.tx.send(command).map_err(|_| GatewayError::Closed)
    }
}
