//! CRUD operations for [`User`] records and presence.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use gallan_shared::constants::{DEFAULT_USER_STATUS, MAX_USERNAME_LEN};
use gallan_shared::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{NewUser, User};
use crate::sql::{is_unique_violation, ts_column, ts_to_sql};

const USER_COLUMNS: &str =
    "id, username, password_hash, display_name, status, avatar, last_seen, is_online";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Register a new user. Usernames are unique regardless of case.
    pub fn create_user(&self, new: &NewUser<'_>) -> Result<User> {
        let username = new.username.trim();
        if username.is_empty() {
            return Err(StoreError::Validation("username must not be empty".into()));
        }
        if username.chars().count() > MAX_USERNAME_LEN {
            return Err(StoreError::Validation(format!(
                "username longer than {MAX_USERNAME_LEN} characters"
            )));
        }
        let display_name = new.display_name.trim();
        if display_name.is_empty() {
            return Err(StoreError::Validation(
                "display name must not be empty".into(),
            ));
        }

        let now = Utc::now();
        let status = new.status.unwrap_or(DEFAULT_USER_STATUS);

        self.conn()
            .execute(
                "INSERT INTO users (username, password_hash, display_name, status, avatar, last_seen, is_online)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
                params![
                    username,
                    new.password_hash,
                    display_name,
                    status,
                    new.avatar,
                    ts_to_sql(now),
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict(format!("username {username:?}"))
                } else {
                    StoreError::Sqlite(e)
                }
            })?;

        let id = UserId(self.conn().last_insert_rowid());
        tracing::debug!(user_id = %id, username, "user created");
        self.get_user(id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_user(&self, id: UserId) -> Result<User> {
        self.find_user(id)?
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))
    }

    pub fn find_user(&self, id: UserId) -> Result<Option<User>> {
        let user = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.0],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Case-insensitive lookup.
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1 COLLATE NOCASE"),
                params![username.trim()],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Change display name and/or status line. `None` leaves a field as is.
    pub fn update_profile(
        &self,
        id: UserId,
        display_name: Option<&str>,
        status: Option<&str>,
    ) -> Result<User> {
        if let Some(name) = display_name {
            if name.trim().is_empty() {
                return Err(StoreError::Validation(
                    "display name must not be empty".into(),
                ));
            }
        }

        let affected = self.conn().execute(
            "UPDATE users
             SET display_name = COALESCE(?2, display_name),
                 status = COALESCE(?3, status)
             WHERE id = ?1",
            params![id.0, display_name.map(str::trim), status],
        )?;
        if affected == 0 {
            return Err(StoreError::not_found(format!("user {id}")));
        }
        self.get_user(id)
    }

    /// Mark a user online or offline. Going offline stamps `last_seen`.
    pub fn set_presence(&self, id: UserId, online: bool) -> Result<User> {
        let affected = if online {
            self.conn().execute(
                "UPDATE users SET is_online = 1 WHERE id = ?1",
                params![id.0],
            )?
        } else {
            self.conn().execute(
                "UPDATE users SET is_online = 0, last_seen = ?2 WHERE id = ?1",
                params![id.0, ts_to_sql(Utc::now())],
            )?
        };
        if affected == 0 {
            return Err(StoreError::not_found(format!("user {id}")));
        }
        tracing::debug!(user_id = %id, online, "presence updated");
        self.get_user(id)
    }
}

pub(crate) fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    user_from_row(row, 0)
}

/// Map a user whose columns start at `base` (for joins).
pub(crate) fn user_from_row(row: &rusqlite::Row<'_>, base: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(base)?),
        username: row.get(base + 1)?,
        password_hash: row.get(base + 2)?,
        display_name: row.get(base + 3)?,
        status: row.get(base + 4)?,
        avatar: row.get(base + 5)?,
        last_seen: ts_column(row, base + 6)?,
        is_online: row.get(base + 7)?,
    })
}
