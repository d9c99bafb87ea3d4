//! # unihub-store
//!
//! Durable storage for the local user's Identity record: the profile and the
//! remembered channels, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection`. Every write helper commits one logical edit
//! atomically, so a crash never leaves a half-written record behind.

pub mod channels;
pub mod database;
pub mod identity;
pub mod migrations;
pub mod models;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
