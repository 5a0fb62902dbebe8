//! # gallan-store
//!
//! Persistence and delivery-state tracking for Gallan chats, backed by
//! SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection`. Typed helpers for every collection are
//! implemented directly on it:
//!
//! - [`messages`]: the append-only message log of each chat
//! - [`statuses`]: per-recipient delivered/read markers and the aggregate
//!   status of a message
//! - [`projection`]: the per-viewer chat summary (last message, unread count,
//!   presence)
//! - [`delivery`]: the coordinator that keeps the three consistent when
//!   messages are sent and chats are opened
//!
//! Users, contacts and chat membership live alongside them.

pub mod chats;
pub mod contacts;
pub mod database;
pub mod delivery;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod projection;
pub mod statuses;
pub mod users;

mod error;
mod sql;
#[cfg(test)]
mod testing;

pub use database::Database;
pub use delivery::DeliveryCoordinator;
pub use error::{Result, StoreError};
pub use models::*;
