//! Per-viewer chat summaries.
//!
//! A [`ChatView`] is computed from the message log, the status rows and the
//! participant list on every call. Nothing here writes to the database.

use rusqlite::params;

use gallan_shared::constants::MEDIA_PLACEHOLDER;
use gallan_shared::time::{format_last_seen, format_message_time};
use gallan_shared::{ChatId, MessageId, ReceiptStatus, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Chat, ChatView, User};

/// Messages of `?1` sent by others that `?2` has no `?3` receipt for.
const UNREAD_FROM: &str = "FROM messages m
     LEFT JOIN message_statuses s
        ON s.message_id = m.id AND s.user_id = ?2
     WHERE m.chat_id = ?1
       AND m.sender_id <> ?2
       AND (s.status IS NULL OR s.status <> ?3)";

impl Database {
    /// Summarize `chat` for `viewer`.
    ///
    /// Fails with `NotFound` when the chat does not exist or `viewer` is not
    /// one of its participants.
    pub fn project(&self, chat: ChatId, viewer: UserId) -> Result<ChatView> {
        let record = self.get_chat(chat)?;
        if !self.is_participant(chat, viewer)? {
            return Err(StoreError::not_found(format!("chat {chat}")));
        }
        self.project_record(record, viewer)
    }

    /// Every chat `viewer` participates in, most recently active first.
    pub fn project_all(&self, viewer: UserId) -> Result<Vec<ChatView>> {
        let mut views = Vec::new();
        for chat in self.chat_ids_for_user(viewer)? {
            let record = self.get_chat(chat)?;
            views.push(self.project_record(record, viewer)?);
        }
        views.sort_by(|a, b| {
            b.last_activity()
                .cmp(&a.last_activity())
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(views)
    }

    /// Messages in `chat` from others that `viewer` has not read.
    pub fn unread_count(&self, chat: ChatId, viewer: UserId) -> Result<u32> {
        let count: u32 = self.conn().query_row(
            &format!("SELECT COUNT(*) {UNREAD_FROM}"),
            params![chat.0, viewer.0, ReceiptStatus::Read.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Ids of the messages [`Database::unread_count`] counts, oldest first.
    pub(crate) fn unread_ids(&self, chat: ChatId, viewer: UserId) -> Result<Vec<MessageId>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT m.id {UNREAD_FROM} ORDER BY m.created_at ASC, m.id ASC"
        ))?;

        let rows = stmt.query_map(
            params![chat.0, viewer.0, ReceiptStatus::Read.as_str()],
            |row| row.get(0).map(MessageId),
        )?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    fn project_record(&self, chat: Chat, viewer: UserId) -> Result<ChatView> {
        // A self chat has no counterpart; it shows the viewer's own profile.
        let counterpart = if chat.is_group {
            None
        } else {
            match self.counterpart(chat.id, viewer)? {
                Some(other) => Some(other),
                None => self.find_user(viewer)?,
            }
        };
        let is_self_chat = counterpart.as_ref().is_some_and(|u| u.id == viewer);

        let mut view = ChatView {
            id: chat.id,
            name: chat
                .name
                .or_else(|| counterpart.as_ref().map(|u| u.display_name.clone())),
            is_group: chat.is_group,
            avatar: chat
                .avatar
                .or_else(|| counterpart.as_ref().and_then(|u| u.avatar.clone())),
            created_at: chat.created_at,
            last_message: String::new(),
            last_message_time: String::new(),
            last_message_at: None,
            last_message_sent: false,
            last_message_status: None,
            unread_count: self.unread_count(chat.id, viewer)?,
            is_online: !is_self_chat && counterpart.as_ref().is_some_and(|u| u.is_online),
            last_seen: counterpart
                .as_ref()
                .filter(|_| !is_self_chat)
                .map(|u| format_last_seen(u.last_seen)),
        };

        if let Some(latest) = self.latest(chat.id)? {
            view.last_message = latest
                .text
                .clone()
                .unwrap_or_else(|| MEDIA_PLACEHOLDER.to_string());
            view.last_message_time = format_message_time(latest.created_at);
            view.last_message_at = Some(latest.created_at);
            view.last_message_sent = latest.sender_id == viewer;
            view.last_message_status = Some(self.aggregate_status(latest.id)?);
        }

        Ok(view)
    }

    /// The other member of a direct chat. `None` for a self chat.
    fn counterpart(&self, chat: ChatId, viewer: UserId) -> Result<Option<User>> {
        match self.participant_ids(chat)?.into_iter().find(|u| *u != viewer) {
            Some(other) => self.find_user(other),
            None => Ok(None),
        }
    }
}
