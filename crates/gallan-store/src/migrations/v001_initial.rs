//! v001 -- Initial schema creation.
//!
//! Creates the six tables: `users`, `contacts`, `chats`,
//! `chat_participants`, `messages` and `message_statuses`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password_hash TEXT NOT NULL,                -- argon2 PHC string
    display_name  TEXT NOT NULL,
    status        TEXT,
    avatar        TEXT,
    last_seen     TEXT NOT NULL,                -- RFC-3339
    is_online     INTEGER NOT NULL DEFAULT 0    -- boolean 0/1
);

-- ----------------------------------------------------------------
-- Contacts (directed: user_id may address contact_id)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS contacts (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id      INTEGER NOT NULL,
    contact_id   INTEGER NOT NULL,
    display_name TEXT,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (contact_id) REFERENCES users(id) ON DELETE CASCADE,
    UNIQUE (user_id, contact_id)
);

-- ----------------------------------------------------------------
-- Chats
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chats (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT,
    is_group   INTEGER NOT NULL DEFAULT 0,
    avatar     TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_participants (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id   INTEGER NOT NULL,
    user_id   INTEGER NOT NULL,
    joined_at TEXT NOT NULL,
    is_admin  INTEGER NOT NULL DEFAULT 0,

    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
    UNIQUE (chat_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_chat_participants_user ON chat_participants(user_id);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id    INTEGER NOT NULL,
    sender_id  INTEGER NOT NULL,
    text       TEXT,
    media_url  TEXT,
    created_at TEXT NOT NULL,
    status     TEXT NOT NULL DEFAULT 'sent'
               CHECK (status IN ('sent', 'delivered', 'read')),

    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE,
    FOREIGN KEY (sender_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_messages_chat_ts
    ON messages(chat_id, created_at, id);

-- ----------------------------------------------------------------
-- Message statuses (one row per message and recipient)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS message_statuses (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id INTEGER NOT NULL,
    user_id    INTEGER NOT NULL,
    status     TEXT NOT NULL CHECK (status IN ('delivered', 'read')),
    updated_at TEXT NOT NULL,

    FOREIGN KEY (message_id) REFERENCES messages(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
    UNIQUE (message_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_message_statuses_user ON message_statuses(user_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
