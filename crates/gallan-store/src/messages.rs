//! The message log: an append-only, ordered sequence of messages per chat.
//!
//! Ordering is by `created_at`, with the id breaking ties between messages
//! stamped in the same instant.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use gallan_shared::constants::{MAX_MEDIA_URL_LEN, MAX_MESSAGE_TEXT_LEN};
use gallan_shared::{ChatId, DeliveryStatus, MessageId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Message;
use crate::sql::{parsed_column, ts_column, ts_to_sql};

const MESSAGE_COLUMNS: &str = "id, chat_id, sender_id, text, media_url, created_at, status";

impl Database {
    /// Append a message to `chat`. The message starts out `sent`.
    ///
    /// Blank text counts as absent; a message needs text or a media URL.
    /// This does not fan out delivery receipts; use
    /// [`DeliveryCoordinator::send_message`](crate::DeliveryCoordinator::send_message)
    /// for the full send path.
    pub fn append(
        &self,
        chat: ChatId,
        sender: UserId,
        text: Option<&str>,
        media_url: Option<&str>,
    ) -> Result<Message> {
        let text = text.filter(|t| !t.trim().is_empty());
        let media_url = media_url.map(str::trim).filter(|u| !u.is_empty());

        if text.is_none() && media_url.is_none() {
            return Err(StoreError::Validation(
                "message needs text or media".into(),
            ));
        }
        if text.is_some_and(|t| t.chars().count() > MAX_MESSAGE_TEXT_LEN) {
            return Err(StoreError::Validation(format!(
                "message text longer than {MAX_MESSAGE_TEXT_LEN} characters"
            )));
        }
        if media_url.is_some_and(|u| u.len() > MAX_MEDIA_URL_LEN) {
            return Err(StoreError::Validation(format!(
                "media URL longer than {MAX_MEDIA_URL_LEN} bytes"
            )));
        }

        self.get_chat(chat)?;

        self.conn().execute(
            "INSERT INTO messages (chat_id, sender_id, text, media_url, created_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                chat.0,
                sender.0,
                text,
                media_url,
                ts_to_sql(Utc::now()),
                DeliveryStatus::Sent.as_str(),
            ],
        )?;

        let id = MessageId(self.conn().last_insert_rowid());
        self.get_message(id)
    }

    pub fn get_message(&self, id: MessageId) -> Result<Message> {
        self.conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id.0],
                row_to_message,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found(format!("message {id}")))
    }

    /// The full thread of `chat`, oldest first.
    pub fn list_by_chat(&self, chat: ChatId) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE chat_id = ?1
             ORDER BY created_at ASC, id ASC"
        ))?;

        let rows = stmt.query_map(params![chat.0], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// The most recent message of `chat`, if any.
    pub fn latest(&self, chat: ChatId) -> Result<Option<Message>> {
        let message = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE chat_id = ?1
                     ORDER BY created_at DESC, id DESC
                     LIMIT 1"
                ),
                params![chat.0],
                row_to_message,
            )
            .optional()?;
        Ok(message)
    }

    /// Raise the stored aggregate of a message. Lower values are ignored.
    pub(crate) fn raise_message_status(
        &self,
        id: MessageId,
        status: DeliveryStatus,
    ) -> Result<DeliveryStatus> {
        let current = self.get_message(id)?.status;
        let next = current.advance(status);
        if next != current {
            self.conn().execute(
                "UPDATE messages SET status = ?2 WHERE id = ?1",
                params![id.0, next.as_str()],
            )?;
            tracing::debug!(message_id = %id, from = %current, to = %next, "message status advanced");
        }
        Ok(next)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: MessageId(row.get(0)?),
        chat_id: ChatId(row.get(1)?),
        sender_id: UserId(row.get(2)?),
        text: row.get(3)?,
        media_url: row.get(4)?,
        created_at: ts_column(row, 5)?,
        status: parsed_column(row, 6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{chat_with, fresh_db, user};

    #[test]
    fn append_starts_as_sent() {
        let db = fresh_db();
        let amina = user(&db, "amina");
        let chat = chat_with(&db, &[amina]);

        let msg = db.append(chat, amina, Some("hi"), None).unwrap();
        assert_eq!(msg.status, DeliveryStatus::Sent);
        assert_eq!(msg.text.as_deref(), Some("hi"));
        assert_eq!(msg.media_url, None);
        assert_eq!(msg.chat_id, chat);
    }

    #[test]
    fn rejects_empty_messages() {
        let db = fresh_db();
        let amina = user(&db, "amina");
        let chat = chat_with(&db, &[amina]);

        for (text, media) in [(None, None), (Some("   "), None), (None, Some(" "))] {
            assert!(matches!(
                db.append(chat, amina, text, media),
                Err(StoreError::Validation(_))
            ));
        }
        assert!(db.list_by_chat(chat).unwrap().is_empty());
    }

    #[test]
    fn media_only_message_is_accepted() {
        let db = fresh_db();
        let amina = user(&db, "amina");
        let chat = chat_with(&db, &[amina]);

        let msg = db
            .append(chat, amina, Some(""), Some("https://cdn.example/cat.jpg"))
            .unwrap();
        assert_eq!(msg.text, None);
        assert_eq!(msg.media_url.as_deref(), Some("https://cdn.example/cat.jpg"));
    }

    #[test]
    fn rejects_oversized_text() {
        let db = fresh_db();
        let amina = user(&db, "amina");
        let chat = chat_with(&db, &[amina]);

        let long = "a".repeat(MAX_MESSAGE_TEXT_LEN + 1);
        assert!(matches!(
            db.append(chat, amina, Some(&long), None),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn append_to_unknown_chat_fails() {
        let db = fresh_db();
        let amina = user(&db, "amina");
        assert!(matches!(
            db.append(ChatId(5), amina, Some("hi"), None),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn thread_order_and_latest() {
        let db = fresh_db();
        let amina = user(&db, "amina");
        let bilal = user(&db, "bilal");
        let chat = chat_with(&db, &[amina, bilal]);
        let other = chat_with(&db, &[amina, bilal]);

        assert!(db.latest(chat).unwrap().is_none());

        let first = db.append(chat, amina, Some("one"), None).unwrap();
        let second = db.append(chat, bilal, Some("two"), None).unwrap();
        let third = db.append(chat, amina, Some("three"), None).unwrap();
        db.append(other, amina, Some("elsewhere"), None).unwrap();

        let ids: Vec<_> = db.list_by_chat(chat).unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![first.id, second.id, third.id]);
        assert_eq!(db.latest(chat).unwrap().unwrap().id, third.id);
    }

    #[test]
    fn identical_timestamps_fall_back_to_id_order() {
        let db = fresh_db();
        let amina = user(&db, "amina");
        let chat = chat_with(&db, &[amina]);

        let a = db.append(chat, amina, Some("a"), None).unwrap();
        let b = db.append(chat, amina, Some("b"), None).unwrap();
        db.conn()
            .execute(
                "UPDATE messages SET created_at = '2024-01-01T00:00:00.000000000Z'",
                [],
            )
            .unwrap();

        let ids: Vec<_> = db.list_by_chat(chat).unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
        assert_eq!(db.latest(chat).unwrap().unwrap().id, b.id);
    }

    #[test]
    fn stored_status_never_lowers() {
        let db = fresh_db();
        let amina = user(&db, "amina");
        let chat = chat_with(&db, &[amina]);
        let msg = db.append(chat, amina, Some("hi"), None).unwrap();

        assert_eq!(
            db.raise_message_status(msg.id, DeliveryStatus::Read).unwrap(),
            DeliveryStatus::Read
        );
        assert_eq!(
            db.raise_message_status(msg.id, DeliveryStatus::Delivered).unwrap(),
            DeliveryStatus::Read
        );
        assert_eq!(db.get_message(msg.id).unwrap().status, DeliveryStatus::Read);
    }
}
