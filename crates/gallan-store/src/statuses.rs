//! Per-recipient delivery receipts and the aggregate status of a message.
//!
//! Every recipient (a chat participant other than the sender) gets at most
//! one [`MessageStatus`] row per message. A row is created `delivered` and may
//! be promoted to `read`; it is never demoted.
//!
//! The writers here are crate-private: the only way to move a receipt is
//! through the [`DeliveryCoordinator`](crate::DeliveryCoordinator). Each write
//! refreshes the aggregate stored on the message row in the same transaction.

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use gallan_shared::{DeliveryStatus, MessageId, ReceiptStatus, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Message, MessageStatus};
use crate::sql::{parsed_column, ts_column, ts_to_sql};

/// Outcome of a receipt write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptUpdate {
    pub row: MessageStatus,
    /// `false` when the call was an idempotent no-op.
    pub changed: bool,
}

/// Fold recipients' receipts into a single status.
///
/// - no recipients at all (sender-only chat): `read`, since every recipient
///   has vacuously read it
/// - every recipient has a `read` row: `read`
/// - every recipient has a row: `delivered`
/// - otherwise (no rows, or fan-out incomplete): `sent`
///
/// Rows from users outside `recipients` are ignored.
pub fn compute_aggregate(recipients: &[UserId], rows: &[MessageStatus]) -> DeliveryStatus {
    if recipients.is_empty() {
        return DeliveryStatus::Read;
    }

    let by_user: HashMap<UserId, ReceiptStatus> =
        rows.iter().map(|r| (r.user_id, r.status)).collect();

    let mut all_read = true;
    for recipient in recipients {
        match by_user.get(recipient) {
            None => return DeliveryStatus::Sent,
            Some(ReceiptStatus::Delivered) => all_read = false,
            Some(ReceiptStatus::Read) => {}
        }
    }

    if all_read {
        DeliveryStatus::Read
    } else {
        DeliveryStatus::Delivered
    }
}

impl Database {
    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_status(&self, message: MessageId, user: UserId) -> Result<Option<MessageStatus>> {
        let row = self
            .conn()
            .query_row(
                "SELECT id, message_id, user_id, status, updated_at
                 FROM message_statuses WHERE message_id = ?1 AND user_id = ?2",
                params![message.0, user.0],
                row_to_status,
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_statuses(&self, message: MessageId) -> Result<Vec<MessageStatus>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, message_id, user_id, status, updated_at
             FROM message_statuses WHERE message_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![message.0], row_to_status)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Participants of the message's chat other than its sender.
    pub fn recipients(&self, message: &Message) -> Result<Vec<UserId>> {
        Ok(self
            .participant_ids(message.chat_id)?
            .into_iter()
            .filter(|u| *u != message.sender_id)
            .collect())
    }

    /// Aggregate status of a message across all of its recipients.
    ///
    /// Combines the stored value with a fresh computation so the result never
    /// goes backwards, even if someone joins the chat after the message was
    /// read by everyone else.
    pub fn aggregate_status(&self, message: MessageId) -> Result<DeliveryStatus> {
        let message = self.get_message(message)?;
        let computed = compute_aggregate(
            &self.recipients(&message)?,
            &self.list_statuses(message.id)?,
        );
        Ok(message.status.advance(computed))
    }

    // ------------------------------------------------------------------
    // Write (coordinator only)
    // ------------------------------------------------------------------

    /// Create the `delivered` receipt for `recipient` if it does not exist.
    pub(crate) fn ensure_delivered(
        &self,
        message: MessageId,
        recipient: UserId,
    ) -> Result<ReceiptUpdate> {
        self.transaction(|db| {
            let msg = db.get_message(message)?;
            let inserted = db.conn().execute(
                "INSERT OR IGNORE INTO message_statuses (message_id, user_id, status, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    message.0,
                    recipient.0,
                    ReceiptStatus::Delivered.as_str(),
                    ts_to_sql(Utc::now()),
                ],
            )?;
            db.refresh_aggregate(&msg)?;
            Ok(ReceiptUpdate {
                row: db.receipt(message, recipient)?,
                changed: inserted > 0,
            })
        })
    }

    /// Record that `recipient` has read the message.
    ///
    /// Creates the row directly at `read` when the delivered receipt has not
    /// been written yet, promotes a `delivered` row, and leaves a `read` row
    /// untouched.
    pub(crate) fn mark_read(&self, message: MessageId, recipient: UserId) -> Result<ReceiptUpdate> {
        self.transaction(|db| {
            let msg = db.get_message(message)?;
            if msg.sender_id == recipient {
                return Err(StoreError::Validation(
                    "a sender cannot acknowledge their own message".into(),
                ));
            }

            let changed = db.conn().execute(
                "INSERT INTO message_statuses (message_id, user_id, status, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (message_id, user_id) DO UPDATE
                    SET status = excluded.status, updated_at = excluded.updated_at
                    WHERE message_statuses.status <> excluded.status",
                params![
                    message.0,
                    recipient.0,
                    ReceiptStatus::Read.as_str(),
                    ts_to_sql(Utc::now()),
                ],
            )?;
            db.refresh_aggregate(&msg)?;
            Ok(ReceiptUpdate {
                row: db.receipt(message, recipient)?,
                changed: changed > 0,
            })
        })
    }

    fn receipt(&self, message: MessageId, recipient: UserId) -> Result<MessageStatus> {
        self.get_status(message, recipient)?.ok_or_else(|| {
            StoreError::not_found(format!("receipt for message {message} and user {recipient}"))
        })
    }

    /// Recompute the aggregate and store it if it moved forward.
    fn refresh_aggregate(&self, message: &Message) -> Result<DeliveryStatus> {
        let computed = compute_aggregate(
            &self.recipients(message)?,
            &self.list_statuses(message.id)?,
        );
        self.raise_message_status(message.id, computed)
    }
}

fn row_to_status(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageStatus> {
    Ok(MessageStatus {
        id: row.get(0)?,
        message_id: MessageId(row.get(1)?),
        user_id: UserId(row.get(2)?),
        status: parsed_column(row, 3)?,
        updated_at: ts_column(row, 4)?,
    })
}
