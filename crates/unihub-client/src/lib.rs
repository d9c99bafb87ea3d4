//! # unihub-client
//!
//! Room session lifecycle for Unified Hub: hosting and joining rooms,
//! remembering channels across sessions, and handing a room over when its
//! host leaves. Transport lives behind [`gateway::SessionGateway`].

pub mod config;
pub mod controller;
pub mod driver;
pub mod error;
pub mod events;
pub mod gateway;
pub mod handoff;
pub mod identity;
pub mod profile;
pub mod registry;
pub mod state;
pub mod timers;

#[cfg(test)]
mod testing;

use tracing_subscriber::{fmt, EnvFilter};

pub use config::{ClientConfig, SessionTimings};
pub use controller::{HostIntent, JoinIntent, LeaveOutcome, RoomController};
pub use driver::{spawn_controller, ControllerHandle, Intent};
pub use error::SessionError;
pub use events::SessionEvent;
pub use gateway::{ChannelGateway, SessionGateway};
pub use handoff::HostExit;
pub use identity::IdentityStore;
pub use state::{SessionSnapshot, SessionState};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("unihub_client=debug,unihub_store=info,warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
