//! Room controller driven through its tokio task, on a paused clock.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use unihub_client::{
    spawn_controller, ChannelGateway, ClientConfig, ControllerHandle, HostExit, HostIntent,
    IdentityStore, Intent, JoinIntent, RoomController, SessionEvent, SessionState,
};
use unihub_shared::protocol::{GatewayCommand, GatewayEvent};
use unihub_shared::{ChannelUid, RequestId, RoomCode, RosterEntry, UserId};
use unihub_store::{ChannelKey, Database};

struct Rig {
    handle: ControllerHandle,
    backend: mpsc::UnboundedSender<GatewayEvent>,
    commands: mpsc::UnboundedReceiver<GatewayCommand>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

fn rig() -> Rig {
    let (gateway, commands) = ChannelGateway::new();
    let (events_tx, events) = mpsc::unbounded_channel();
    let identity = IdentityStore::open(Database::open_in_memory().unwrap()).unwrap();
    let controller = RoomController::from_config(
        identity,
        Box::new(gateway),
        events_tx,
        &ClientConfig::default(),
    );
    let (backend, gateway_events) = mpsc::unbounded_channel();
    Rig {
        handle: spawn_controller(controller, gateway_events),
        backend,
        commands,
        events,
    }
}

fn alpha() -> HostIntent {
    HostIntent {
        name: "Alpha".into(),
        port: Some(25565),
        password: String::new(),
        address: None,
    }
}

fn beta() -> JoinIntent {
    JoinIntent {
        address: "10.0.0.5".into(),
        port: Some(25565),
        password: "secret".into(),
    }
}

fn assert_elapsed(started: Instant, expected: Duration) {
    let elapsed = started.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(1),
        "elapsed {elapsed:?}, expected {expected:?}"
    );
}

impl Rig {
    async fn intent(&self, intent: Intent) {
        self.handle.send(intent).await.unwrap();
    }

    fn push(&self, event: GatewayEvent) {
        self.backend.send(event).unwrap();
    }

    async fn next_command(&mut self) -> GatewayCommand {
        self.commands.recv().await.unwrap()
    }

    /// Wait for the first event matching `wanted`, returning everything
    /// seen up to and including it.
    async fn wait_for(&mut self, wanted: impl Fn(&SessionEvent) -> bool) -> Vec<SessionEvent> {
        let mut seen = Vec::new();
        loop {
            let event = self.events.recv().await.unwrap();
            let done = wanted(&event);
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    async fn enter_hosted(&mut self) -> ChannelUid {
        self.intent(Intent::Host(alpha())).await;
        let (request, uid) = match self.next_command().await {
            GatewayCommand::StartHost { request, params } => (request, params.channel_uid.unwrap()),
            other => panic!("unexpected command {other:?}"),
        };
        self.push(GatewayEvent::HostStarted {
            request,
            room_code: RoomCode::from("ABC123"),
        });
        self.wait_for(|e| matches!(e, SessionEvent::RoomEntered { .. }))
            .await;
        uid
    }

    async fn enter_joined(&mut self) -> RequestId {
        self.intent(Intent::Join(beta())).await;
        let request = match self.next_command().await {
            GatewayCommand::StartClient { request, .. } => request,
            other => panic!("unexpected command {other:?}"),
        };
        self.push(GatewayEvent::RoomAccepted {
            request,
            code: RoomCode::from("555"),
            name: "Beta".into(),
        });
        self.wait_for(|e| matches!(e, SessionEvent::RoomEntered { .. }))
            .await;
        request
    }

    fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::iter::from_fn(|| self.events.try_recv().ok()).collect()
    }
}

#[tokio::test(start_paused = true)]
async fn join_times_out_after_five_seconds() {
    let mut rig = rig();
    rig.intent(Intent::Join(beta())).await;
    match rig.next_command().await {
        GatewayCommand::StartClient { params, .. } => {
            assert_eq!(params.address, "10.0.0.5");
            assert_eq!(params.password, "secret");
        }
        other => panic!("unexpected command {other:?}"),
    }
    let started = Instant::now();

    rig.wait_for(|e| *e == SessionEvent::ConnectionTimedOut).await;
    assert_elapsed(started, Duration::from_millis(5_000));
    assert_eq!(
        rig.next_command().await,
        GatewayCommand::Disconnect { terminal: true }
    );

    let controller = rig.handle.shutdown().await.unwrap();
    assert_eq!(controller.state(), SessionState::Idle);
    assert!(controller.identity().channels().is_empty());
}

#[tokio::test(start_paused = true)]
async fn late_room_accepted_after_timeout_is_ignored() {
    let mut rig = rig();
    rig.intent(Intent::Join(beta())).await;
    let request = match rig.next_command().await {
        GatewayCommand::StartClient { request, .. } => request,
        other => panic!("unexpected command {other:?}"),
    };
    rig.wait_for(|e| *e == SessionEvent::ConnectionTimedOut).await;

    rig.push(GatewayEvent::RoomAccepted {
        request,
        code: RoomCode::from("555"),
        name: "Beta".into(),
    });
    let controller = rig.handle.shutdown().await.unwrap();

    assert_eq!(controller.state(), SessionState::Idle);
    assert!(controller.identity().channels().is_empty());
    let events: Vec<_> = std::iter::from_fn(|| rig.events.try_recv().ok()).collect();
    assert!(!events
        .iter()
        .any(|e| matches!(e, SessionEvent::RoomEntered { .. })));
    assert!(!events.contains(&SessionEvent::ConnectionTimedOut));
}

#[tokio::test(start_paused = true)]
async fn accepted_join_never_times_out() {
    let mut rig = rig();
    rig.enter_joined().await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(rig.handle.snapshot().state, SessionState::Joined);
    assert!(!rig.drain_events().contains(&SessionEvent::ConnectionTimedOut));
    let controller = rig.handle.shutdown().await.unwrap();
    assert!(controller
        .identity()
        .channel(&ChannelKey::Join(RoomCode::from("555")))
        .is_some());
}

#[tokio::test(start_paused = true)]
async fn accept_secondary_waits_for_the_settle_delay() {
    let mut rig = rig();
    rig.enter_joined().await;

    rig.push(GatewayEvent::PromotionOffered);
    rig.wait_for(|e| *e == SessionEvent::PromotionOffered).await;
    assert_eq!(
        rig.handle.snapshot().state,
        SessionState::AwaitingSecondaryDecision
    );

    rig.intent(Intent::AcceptPromotion).await;
    let started = Instant::now();
    match rig.next_command().await {
        GatewayCommand::AcceptSecondary { .. } => {}
        other => panic!("unexpected command {other:?}"),
    }
    assert_elapsed(started, Duration::from_millis(1_500));
}

#[tokio::test(start_paused = true)]
async fn second_offer_supersedes_pending_acceptance() {
    let mut rig = rig();
    rig.enter_joined().await;

    rig.push(GatewayEvent::PromotionOffered);
    rig.wait_for(|e| *e == SessionEvent::PromotionOffered).await;
    rig.intent(Intent::AcceptPromotion).await;
    rig.wait_for(|e| *e == SessionEvent::PromotionDismissed { accepted: true })
        .await;

    tokio::time::advance(Duration::from_millis(1_000)).await;
    rig.push(GatewayEvent::PromotionOffered);
    rig.wait_for(|e| *e == SessionEvent::PromotionOffered).await;
    assert!(rig.handle.snapshot().promotion_offered);

    // The first acceptance's timer was cancelled.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(rig.commands.try_recv().is_err());

    rig.intent(Intent::AcceptPromotion).await;
    let started = Instant::now();
    match rig.next_command().await {
        GatewayCommand::AcceptSecondary { .. } => {}
        other => panic!("unexpected command {other:?}"),
    }
    assert_elapsed(started, Duration::from_millis(1_500));
    assert!(rig.commands.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn relaunching_a_remembered_host_channel_reuses_its_identity() {
    let mut rig = rig();
    let uid = rig.enter_hosted().await;

    rig.intent(Intent::ChooseExit(HostExit::Shutdown)).await;
    assert_eq!(
        rig.next_command().await,
        GatewayCommand::Disconnect { terminal: true }
    );
    rig.wait_for(|e| *e == SessionEvent::ServerShutdown).await;

    rig.intent(Intent::Relaunch(ChannelKey::Host(uid.clone())))
        .await;
    match rig.next_command().await {
        GatewayCommand::StartHost { params, .. } => {
            assert_eq!(params.name, "Alpha");
            assert_eq!(params.port, 25565);
            assert_eq!(params.previous_code, Some(RoomCode::from("ABC123")));
            assert_eq!(params.channel_uid, Some(uid.clone()));
        }
        other => panic!("unexpected command {other:?}"),
    }

    let controller = rig.handle.shutdown().await.unwrap();
    let record = controller
        .identity()
        .channel(&ChannelKey::Host(uid.clone()))
        .unwrap();
    assert_eq!(record.name, "Alpha");
    assert_eq!(record.code, RoomCode::from("ABC123"));
    assert_eq!(record.channel_uid, Some(uid));
}

#[tokio::test(start_paused = true)]
async fn migration_outcomes() {
    let mut rig = rig();
    rig.enter_hosted().await;

    rig.intent(Intent::ChooseExit(HostExit::Migrate)).await;
    let request = match rig.next_command().await {
        GatewayCommand::MigrateHost { request } => request,
        other => panic!("unexpected command {other:?}"),
    };
    rig.push(GatewayEvent::MigrateResult {
        request,
        accepted: false,
    });
    rig.wait_for(|e| matches!(e, SessionEvent::MigrationFailed { .. }))
        .await;
    assert_eq!(rig.handle.snapshot().state, SessionState::Hosted);

    rig.push(GatewayEvent::RosterUpdate {
        entries: vec![RosterEntry {
            uid: UserId("bob".into()),
            nick: "Bob".into(),
            avatar: None,
            is_host: false,
            is_live: false,
        }],
    });
    rig.wait_for(|e| matches!(e, SessionEvent::RosterUpdated { .. }))
        .await;
    rig.intent(Intent::DesignateSecondary(UserId("bob".into())))
        .await;
    assert_eq!(
        rig.next_command().await,
        GatewayCommand::RequestSecondary {
            target: UserId("bob".into())
        }
    );
    rig.push(GatewayEvent::SecondaryAssigned {
        uid: UserId("bob".into()),
    });

    rig.intent(Intent::ChooseExit(HostExit::Migrate)).await;
    let request = match rig.next_command().await {
        GatewayCommand::MigrateHost { request } => request,
        other => panic!("unexpected command {other:?}"),
    };
    rig.push(GatewayEvent::MigrateResult {
        request,
        accepted: true,
    });
    rig.wait_for(|e| *e == SessionEvent::Migrated).await;
    assert_eq!(rig.handle.snapshot().state, SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn reentering_an_expired_room_collapses_to_idle() {
    let mut rig = rig();
    rig.enter_hosted().await;

    rig.intent(Intent::ChooseExit(HostExit::Background)).await;
    assert_eq!(
        rig.next_command().await,
        GatewayCommand::Disconnect { terminal: false }
    );
    rig.wait_for(|e| *e == SessionEvent::BackgroundBanner { visible: true })
        .await;
    assert!(rig.handle.snapshot().background_banner);

    rig.intent(Intent::Reenter).await;
    let request = match rig.next_command().await {
        GatewayCommand::Reenter { request } => request,
        other => panic!("unexpected command {other:?}"),
    };
    rig.push(GatewayEvent::ReenterResult {
        request,
        room: None,
    });
    let events = rig.wait_for(|e| *e == SessionEvent::RoomExpired).await;

    assert_eq!(rig.handle.snapshot().state, SessionState::Idle);
    assert!(!events.iter().any(|e| matches!(
        e,
        SessionEvent::IntentFailed { .. } | SessionEvent::ConnectionRejected { .. }
    )));
}

#[tokio::test(start_paused = true)]
async fn invalid_intents_are_reported_not_applied() {
    let mut rig = rig();
    rig.intent(Intent::Leave).await;
    let events = rig
        .wait_for(|e| matches!(e, SessionEvent::IntentFailed { .. }))
        .await;
    assert_eq!(events.len(), 1);
    assert_eq!(rig.handle.snapshot().state, SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn snapshots_follow_the_session() {
    let mut rig = rig();
    let mut snapshots = rig.handle.subscribe();
    assert_eq!(snapshots.borrow().state, SessionState::Idle);

    rig.enter_joined().await;
    let snapshot = snapshots
        .wait_for(|s| s.state == SessionState::Joined)
        .await
        .unwrap()
        .clone();
    assert_eq!(snapshot.room_name.as_deref(), Some("Beta"));
    assert_eq!(snapshot.room_code, Some(RoomCode::from("555")));
    assert!(!snapshot.is_host);

    rig.push(GatewayEvent::RoomClosed);
    snapshots
        .wait_for(|s| s.state == SessionState::Idle)
        .await
        .unwrap();
    assert!(rig.handle.snapshot().room_name.is_none());
}
