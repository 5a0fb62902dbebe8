//! Fixtures shared by the unit tests of this crate.

use gallan_shared::{ChatId, UserId};

use crate::database::Database;
use crate::models::{NewChat, NewUser};

pub(crate) fn fresh_db() -> Database {
    Database::open_in_memory().expect("in-memory database")
}

pub(crate) fn new_user(username: &str) -> NewUser<'_> {
    NewUser {
        username,
        password_hash: "$argon2id$test",
        display_name: username,
        status: None,
        avatar: None,
    }
}

pub(crate) fn user(db: &Database, username: &str) -> UserId {
    db.create_user(&new_user(username)).expect("create user").id
}

/// A chat whose participants are exactly `members`.
pub(crate) fn chat_with(db: &Database, members: &[UserId]) -> ChatId {
    let chat = db
        .create_chat(&NewChat {
            is_group: members.len() > 2,
            ..NewChat::default()
        })
        .expect("create chat");
    for member in members {
        db.add_participant(chat.id, *member, false)
            .expect("add participant");
    }
    chat.id
}
