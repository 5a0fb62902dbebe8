//! # gallan-server
//!
//! HTTP API for the Gallan messenger.
//!
//! - **REST API** (axum) for accounts, contacts, chats and messages
//! - **Delivery receipts**: sending a message fans out `delivered` markers and
//!   fetching a chat marks it `read` for the caller
//! - **Sessions**: bearer tokens kept in memory, argon2 password hashes
//! - **Conversation starters** from an optional OpenAI-compatible endpoint

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod starters;

pub use api::{build_router, serve, AppState};
pub use config::{DatabaseLocation, ServerConfig};
pub use error::ServerError;
