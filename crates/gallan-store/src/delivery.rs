//! The delivery coordinator: the only writer of receipts.
//!
//! Sending a message appends it and fans out `delivered` receipts to every
//! other participant. Opening a chat marks everything the viewer received as
//! `read`. Each entry point runs in a single transaction, so readers never see
//! a message without its receipts.

use gallan_shared::{ChatId, UserId};

use crate::database::Database;
use crate::error::Result;
use crate::models::Message;

/// Borrowed handle that drives receipts for one [`Database`].
#[derive(Clone, Copy)]
pub struct DeliveryCoordinator<'a> {
    db: &'a Database,
}

impl Database {
    pub fn delivery(&self) -> DeliveryCoordinator<'_> {
        DeliveryCoordinator { db: self }
    }
}

impl<'a> DeliveryCoordinator<'a> {
    /// Create the `delivered` receipt for every recipient of `message`.
    ///
    /// Returns the number of receipts created. Recipients that already have a
    /// row (possibly already `read`) are left alone.
    pub fn on_message_created(&self, message: &Message) -> Result<usize> {
        self.db.transaction(|db| {
            let recipients = db.recipients(message)?;
            let mut created = 0;
            for recipient in &recipients {
                if db.ensure_delivered(message.id, *recipient)?.changed {
                    created += 1;
                }
            }

            // A chat with nobody else in it still needs its aggregate settled.
            if recipients.is_empty() {
                let status = db.aggregate_status(message.id)?;
                db.raise_message_status(message.id, status)?;
            }

            tracing::debug!(
                message_id = %message.id,
                chat_id = %message.chat_id,
                recipients = recipients.len(),
                created,
                "receipts fanned out"
            );
            Ok(created)
        })
    }

    /// Mark every message in `chat` not authored by `viewer` as read.
    ///
    /// Returns how many receipts actually changed.
    pub fn on_chat_opened(&self, chat: ChatId, viewer: UserId) -> Result<usize> {
        self.db.transaction(|db| {
            let mut changed = 0;
            for message in db.unread_ids(chat, viewer)? {
                if db.mark_read(message, viewer)?.changed {
                    changed += 1;
                }
            }

            if changed > 0 {
                tracing::debug!(chat_id = %chat, viewer = %viewer, changed, "messages marked read");
            }
            Ok(changed)
        })
    }

    /// Append a message and fan out its receipts atomically.
    ///
    /// The returned message carries the aggregate status after fan-out.
    pub fn send_message(
        &self,
        chat: ChatId,
        sender: UserId,
        text: Option<&str>,
        media_url: Option<&str>,
    ) -> Result<Message> {
        self.db.transaction(|db| {
            let message = db.append(chat, sender, text, media_url)?;
            db.delivery().on_message_created(&message)?;
            let message = db.get_message(message.id)?;

            tracing::info!(
                message_id = %message.id,
                chat_id = %chat,
                sender = %sender,
                status = %message.status,
                "message sent"
            );
            Ok(message)
        })
    }

    /// Mark `chat` read for `viewer` and return its full thread.
    pub fn open_chat(&self, chat: ChatId, viewer: UserId) -> Result<Vec<Message>> {
        self.db.transaction(|db| {
            db.delivery().on_chat_opened(chat, viewer)?;
            db.list_by_chat(chat)
        })
    }
}
