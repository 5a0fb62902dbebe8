//! Address book entries: which users a user may start chats with.

use rusqlite::{params, OptionalExtension};

use gallan_shared::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Contact;
use crate::sql::is_unique_violation;
use crate::users::user_from_row;

const CONTACT_SELECT: &str = "
    SELECT c.id, c.user_id, c.contact_id, c.display_name,
           u.id, u.username, u.password_hash, u.display_name, u.status, u.avatar,
           u.last_seen, u.is_online
    FROM contacts c
    JOIN users u ON u.id = c.contact_id";

impl Database {
    /// Add `contact` to `owner`'s address book.
    pub fn create_contact(
        &self,
        owner: UserId,
        contact: UserId,
        display_name: Option<&str>,
    ) -> Result<Contact> {
        if owner == contact {
            return Err(StoreError::Validation(
                "cannot add yourself as a contact".into(),
            ));
        }
        // Both ends must exist; report the missing contact explicitly.
        self.get_user(owner)?;
        self.get_user(contact)?;

        let display_name = display_name.map(str::trim).filter(|n| !n.is_empty());

        self.conn()
            .execute(
                "INSERT INTO contacts (user_id, contact_id, display_name) VALUES (?1, ?2, ?3)",
                params![owner.0, contact.0, display_name],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict(format!("contact {contact}"))
                } else {
                    StoreError::Sqlite(e)
                }
            })?;

        tracing::debug!(owner = %owner, contact = %contact, "contact added");

        self.get_contact(owner, contact)?
            .ok_or_else(|| StoreError::not_found(format!("contact {contact}")))
    }

    pub fn get_contact(&self, owner: UserId, contact: UserId) -> Result<Option<Contact>> {
        let found = self
            .conn()
            .query_row(
                &format!("{CONTACT_SELECT} WHERE c.user_id = ?1 AND c.contact_id = ?2"),
                params![owner.0, contact.0],
                row_to_contact,
            )
            .optional()?;
        Ok(found)
    }

    /// All contacts of `owner`, in the order they were added.
    pub fn list_contacts(&self, owner: UserId) -> Result<Vec<Contact>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("{CONTACT_SELECT} WHERE c.user_id = ?1 ORDER BY c.id ASC"))?;
        let rows = stmt.query_map(params![owner.0], row_to_contact)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}

fn row_to_contact(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contact> {
    let nickname: Option<String> = row.get(3)?;
    // The joined user occupies columns 4.. in USER_COLUMNS order.
    let user = user_from_row(row, 4)?;

    Ok(Contact {
        id: row.get(0)?,
        user_id: UserId(row.get(1)?),
        contact_id: UserId(row.get(2)?),
        display_name: nickname.unwrap_or_else(|| user.display_name.clone()),
        status: user.status.clone(),
        avatar: user.avatar.clone(),
        user,
    })
}
