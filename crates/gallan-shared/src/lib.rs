//! # gallan-shared
//!
//! Types shared by the Gallan store and server: typed identities, the
//! delivery status lattice, REST wire formats and display-time formatting.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod time;
pub mod types;

pub use error::ParseStatusError;
pub use types::{ChatId, DeliveryStatus, MessageId, ReceiptStatus, UserId};
