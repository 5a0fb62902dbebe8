//! CRUD operations for [`Chat`] records and their participants.

use std::collections::BTreeSet;

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use gallan_shared::{ChatId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Chat, ChatParticipant, NewChat};
use crate::sql::{ts_column, ts_to_sql};

impl Database {
    // ------------------------------------------------------------------
    // Chats
    // ------------------------------------------------------------------

    /// Insert a new chat with no participants.
    pub fn create_chat(&self, new: &NewChat<'_>) -> Result<Chat> {
        self.conn().execute(
            "INSERT INTO chats (name, is_group, avatar, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![new.name, new.is_group, new.avatar, ts_to_sql(Utc::now())],
        )?;
        let id = ChatId(self.conn().last_insert_rowid());
        self.get_chat(id)
    }

    pub fn get_chat(&self, id: ChatId) -> Result<Chat> {
        self.conn()
            .query_row(
                "SELECT id, name, is_group, avatar, created_at FROM chats WHERE id = ?1",
                params![id.0],
                row_to_chat,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found(format!("chat {id}")))
    }

    /// Ids of every chat `user` participates in, oldest membership first.
    pub fn chat_ids_for_user(&self, user: UserId) -> Result<Vec<ChatId>> {
        let mut stmt = self.conn().prepare(
            "SELECT chat_id FROM chat_participants WHERE user_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![user.0], |row| Ok(ChatId(row.get(0)?)))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// The non-group chat whose participant set is exactly `participants`.
    pub fn find_direct_chat(&self, participants: &[UserId]) -> Result<Option<Chat>> {
        let wanted: BTreeSet<UserId> = participants.iter().copied().collect();
        let Some(first) = wanted.iter().next().copied() else {
            return Ok(None);
        };

        for chat_id in self.chat_ids_for_user(first)? {
            let chat = self.get_chat(chat_id)?;
            if chat.is_group {
                continue;
            }
            let members: BTreeSet<UserId> = self.participant_ids(chat_id)?.into_iter().collect();
            if members == wanted {
                return Ok(Some(chat));
            }
        }
        Ok(None)
    }

    /// Return the direct chat between `me` and `other`, creating it if needed.
    ///
    /// Without an explicit `name` the chat stays unnamed, so each member sees
    /// the other one's name in their projection. When `me == other` the
    /// result is a chat with a single participant. The boolean is `true` when
    /// the chat was created.
    pub fn open_direct_chat(
        &self,
        me: UserId,
        other: UserId,
        name: Option<&str>,
    ) -> Result<(Chat, bool)> {
        self.transaction(|db| {
            if let Some(existing) = db.find_direct_chat(&[me, other])? {
                return Ok((existing, false));
            }

            db.get_user(other)?;

            let chat = db.create_chat(&NewChat {
                name: name.map(str::trim).filter(|n| !n.is_empty()),
                is_group: false,
                avatar: None,
            })?;
            db.add_participant(chat.id, me, false)?;
            db.add_participant(chat.id, other, false)?;

            tracing::info!(chat_id = %chat.id, %me, %other, "direct chat created");
            Ok((chat, true))
        })
    }

    // ------------------------------------------------------------------
    // Participants
    // ------------------------------------------------------------------

    /// Add `user` to `chat`. Adding an existing member returns the existing row.
    pub fn add_participant(
        &self,
        chat: ChatId,
        user: UserId,
        is_admin: bool,
    ) -> Result<ChatParticipant> {
        self.get_chat(chat)?;
        self.get_user(user)?;

        self.conn().execute(
            "INSERT OR IGNORE INTO chat_participants (chat_id, user_id, joined_at, is_admin)
             VALUES (?1, ?2, ?3, ?4)",
            params![chat.0, user.0, ts_to_sql(Utc::now()), is_admin],
        )?;

        self.conn()
            .query_row(
                "SELECT id, chat_id, user_id, joined_at, is_admin
                 FROM chat_participants WHERE chat_id = ?1 AND user_id = ?2",
                params![chat.0, user.0],
                row_to_participant,
            )
            .map_err(StoreError::Sqlite)
    }

    pub fn list_participants(&self, chat: ChatId) -> Result<Vec<ChatParticipant>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, chat_id, user_id, joined_at, is_admin
             FROM chat_participants WHERE chat_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![chat.0], row_to_participant)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn participant_ids(&self, chat: ChatId) -> Result<Vec<UserId>> {
        Ok(self
            .list_participants(chat)?
            .into_iter()
            .map(|p| p.user_id)
            .collect())
    }

    pub fn is_participant(&self, chat: ChatId, user: UserId) -> Result<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM chat_participants WHERE chat_id = ?1 AND user_id = ?2",
                params![chat.0, user.0],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chat> {
    Ok(Chat {
        id: ChatId(row.get(0)?),
        name: row.get(1)?,
        is_group: row.get(2)?,
        avatar: row.get(3)?,
        created_at: ts_column(row, 4)?,
    })
}

fn row_to_participant(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatParticipant> {
    Ok(ChatParticipant {
        id: row.get(0)?,
        chat_id: ChatId(row.get(1)?),
        user_id: UserId(row.get(2)?),
        joined_at: ts_column(row, 3)?,
        is_admin: row.get(4)?,
    })
}
