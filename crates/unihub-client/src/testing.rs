//! Shared fixtures for controller unit tests.

use tokio::sync::mpsc;

use unihub_shared::protocol::{GatewayCommand, GatewayEvent};
use unihub_shared::{ChannelUid, RequestId, RoomCode};
use unihub_store::Database;

use crate::config::SessionTimings;
use crate::controller::{HostIntent, JoinIntent, RoomController};
use crate::events::SessionEvent;
use crate::gateway::ChannelGateway;
use crate::identity::IdentityStore;

pub(crate) fn alpha() -> HostIntent {
    HostIntent {
        name: "Alpha".into(),
        port: Some(25565),
        password: String::new(),
        address: None,
    }
}

pub(crate) fn beta() -> JoinIntent {
    JoinIntent {
        address: "10.0.0.5".into(),
        port: Some(25565),
        password: "secret".into(),
    }
}

pub(crate) struct Harness {
    pub controller: RoomController,
    commands: mpsc::UnboundedReceiver<GatewayCommand>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Harness {
    pub fn new() -> Self {
        let (gateway, commands) = ChannelGateway::new();
        let (events_tx, events) = mpsc::unbounded_channel();
        let identity = IdentityStore::open(Database::open_in_memory().unwrap()).unwrap();
        let controller = RoomController::new(
            identity,
            Box::new(gateway),
            events_tx,
            SessionTimings::default(),
        );
        Self {
            controller,
            commands,
            events,
        }
    }

    /// Make every further gateway submission fail.
    pub fn close_gateway(&mut self) {
        self.commands.close();
    }

    pub fn commands(&mut self) -> Vec<GatewayCommand> {
        std::iter::from_fn(|| self.commands.try_recv().ok()).collect()
    }

    pub fn events(&mut self) -> Vec<SessionEvent> {
        std::iter::from_fn(|| self.events.try_recv().ok()).collect()
    }

    /// Host "Alpha" and have the gateway assign `ABC123`. Returns the
    /// channel uid that was sent.
    pub fn enter_hosted(&mut self) -> ChannelUid {
        let request = self.controller.host(alpha()).unwrap();
        let uid = match self.commands().as_slice() {
            [GatewayCommand::StartHost { params, .. }] => params.channel_uid.clone().unwrap(),
            other => panic!("unexpected commands {other:?}"),
        };
        self.controller.handle_event(GatewayEvent::HostStarted {
            request,
            room_code: RoomCode::from("ABC123"),
        });
        self.events();
        uid
    }

    pub fn enter_joined(&mut self) -> RequestId {
        let request = self.controller.join(beta()).unwrap();
        self.controller.handle_event(GatewayEvent::RoomAccepted {
            request,
            code: RoomCode::from("555"),
            name: "Beta".into(),
        });
        self.commands();
        self.events();
        request
    }
}
