//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` so it can be handed directly to the HTTP
//! layer. Field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use gallan_shared::{ChatId, DeliveryStatus, MessageId, ReceiptStatus, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered account.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    /// Unique, compared case-insensitively.
    pub username: String,
    /// Argon2 PHC string. Never leaves the server.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: String,
    pub status: Option<String>,
    pub avatar: Option<String>,
    /// Stamped when the user goes offline.
    pub last_seen: DateTime<Utc>,
    pub is_online: bool,
}

/// Fields required to register a user.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub display_name: &'a str,
    pub status: Option<&'a str>,
    pub avatar: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Contact
// ---------------------------------------------------------------------------

/// An entry in a user's address book, joined with the addressed user.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: i64,
    /// Owner of the address book.
    pub user_id: UserId,
    /// The user being addressed.
    pub contact_id: UserId,
    /// Owner-chosen name, falling back to the user's display name.
    pub display_name: String,
    pub status: Option<String>,
    pub avatar: Option<String>,
    pub user: User,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// The stored chat record. Summary fields are never kept here; see
/// [`ChatView`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: ChatId,
    pub name: Option<String>,
    pub is_group: bool,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewChat<'a> {
    pub name: Option<&'a str>,
    pub is_group: bool,
    pub avatar: Option<&'a str>,
}

/// Membership row. The participant set of a chat is the fan-out set for
/// delivery receipts.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatParticipant {
    pub id: i64,
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub joined_at: DateTime<Utc>,
    pub is_admin: bool,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single chat message. Immutable once appended, except for `status`,
/// which only moves forward as recipients acknowledge it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender_id: UserId,
    pub text: Option<String>,
    pub media_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: DeliveryStatus,
}

/// Delivery marker for one (message, recipient) pair.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageStatus {
    pub id: i64,
    pub message_id: MessageId,
    pub user_id: UserId,
    pub status: ReceiptStatus,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Chat projection
// ---------------------------------------------------------------------------

/// A chat as seen by one viewer. Computed on every read from the message,
/// status and participant tables.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    pub id: ChatId,
    pub name: Option<String>,
    pub is_group: bool,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Text of the latest message, `"Media"` for media-only, `""` if none.
    pub last_message: String,
    /// Display time of the latest message, `""` if none.
    pub last_message_time: String,
    pub last_message_at: Option<DateTime<Utc>>,
    /// Whether the viewer authored the latest message.
    pub last_message_sent: bool,
    /// Aggregate status of the latest message, `""` if none.
    #[serde(serialize_with = "status_or_empty")]
    pub last_message_status: Option<DeliveryStatus>,
    /// Messages from others the viewer has not read.
    pub unread_count: u32,
    pub is_online: bool,
    pub last_seen: Option<String>,
}

impl ChatView {
    /// Sort key for chat lists: latest activity first.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_message_at.unwrap_or(self.created_at)
    }
}

fn status_or_empty<S: Serializer>(
    status: &Option<DeliveryStatus>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(status.map(|s| s.as_str()).unwrap_or(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_json_hides_password_hash() {
        let user = User {
            id: UserId(1),
            username: "amina".into(),
            password_hash: "$argon2id$secret".into(),
            display_name: "Amina".into(),
            status: None,
            avatar: None,
            last_seen: Utc::now(),
            is_online: true,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["displayName"], "Amina");
        assert_eq!(json["isOnline"], true);
    }

    #[test]
    fn empty_chat_view_serializes_blank_status() {
        let view = ChatView {
            id: ChatId(1),
            name: Some("Bilal".into()),
            is_group: false,
            avatar: None,
            created_at: Utc::now(),
            last_message: String::new(),
            last_message_time: String::new(),
            last_message_at: None,
            last_message_sent: false,
            last_message_status: None,
            unread_count: 0,
            is_online: false,
            last_seen: None,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["lastMessageStatus"], "");
        assert_eq!(json["unreadCount"], 0);
    }
}
