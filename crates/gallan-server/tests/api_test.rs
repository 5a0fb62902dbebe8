//! End-to-end tests of the REST API against an in-memory database.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use gallan_server::{build_router, AppState, DatabaseLocation, ServerConfig};
use gallan_store::Database;

fn app() -> Router {
    let db = Database::open_in_memory().unwrap();
    build_router(AppState::new(db, ServerConfig::default()))
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Register `username` and return `(user id, token)`.
async fn register(app: &Router, username: &str) -> (i64, String) {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "username": username, "password": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (
        body["user"]["id"].as_i64().unwrap(),
        body["token"].as_str().unwrap().to_string(),
    )
}

async fn open_chat(app: &Router, token: &str, contact_id: i64) -> i64 {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/chats",
        Some(token),
        Some(json!({ "contactId": contact_id })),
    )
    .await;
    assert!(status.is_success(), "{body}");
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_register_login_and_logout() {
    let app = app();
    let (id, token) = register(&app, "amina").await;

    let (status, me) = call(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], id);
    assert_eq!(me["displayName"], "amina");
    assert!(me.get("passwordHash").is_none());

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "AMINA", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "AMINA", "password": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["isOnline"], true);

    let (status, _) = call(&app, Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_duplicate_username_conflicts() {
    let app = app();
    register(&app, "amina").await;
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "username": "Amina", "password": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let app = app();
    for uri in ["/api/chats", "/api/contacts", "/api/auth/me"] {
        let (status, _) = call(&app, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }
    let (status, _) = call(&app, Method::GET, "/api/chats", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_update_is_limited_to_self() {
    let app = app();
    let (amina, token) = register(&app, "amina").await;
    let (bilal, _) = register(&app, "bilal").await;

    let (status, body) = call(
        &app,
        Method::PATCH,
        &format!("/api/users/{amina}"),
        Some(&token),
        Some(json!({ "status": "At work" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "At work");

    let (status, _) = call(
        &app,
        Method::PATCH,
        &format!("/api/users/{bilal}"),
        Some(&token),
        Some(json!({ "status": "hacked" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_contacts_and_starters() {
    let app = app();
    let (_, token) = register(&app, "amina").await;
    let (bilal, _) = register(&app, "bilal").await;

    let (status, contact) = call(
        &app,
        Method::POST,
        "/api/contacts",
        Some(&token),
        Some(json!({ "username": "bilal", "displayName": "Bil" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(contact["displayName"], "Bil");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/contacts",
        Some(&token),
        Some(json!({ "username": "nobody" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = call(&app, Method::GET, "/api/contacts", Some(&token), None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    // No API key configured: the static list comes back.
    let (status, starters) = call(
        &app,
        Method::GET,
        &format!("/api/contacts/{bilal}/conversation-starters"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(starters.as_array().unwrap().len(), 5);
    assert_eq!(starters[0]["category"], "greeting");

    let (status, _) = call(
        &app,
        Method::GET,
        "/api/contacts/999/conversation-starters",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_direct_chat_is_reused_and_groups_unsupported() {
    let app = app();
    let (_, token) = register(&app, "amina").await;
    let (bilal, bilal_token) = register(&app, "bilal").await;
    let amina_id = call(&app, Method::GET, "/api/auth/me", Some(&token), None)
        .await
        .1["id"]
        .as_i64()
        .unwrap();

    let (status, first) = call(
        &app,
        Method::POST,
        "/api/chats",
        Some(&token),
        Some(json!({ "contactId": bilal })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["name"], "bilal");
    assert_eq!(first["lastMessage"], "");
    assert_eq!(first["lastMessageStatus"], "");

    let (status, second) = call(
        &app,
        Method::POST,
        "/api/chats",
        Some(&bilal_token),
        Some(json!({ "contactId": amina_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["id"], first["id"]);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/chats",
        Some(&token),
        Some(json!({ "isGroup": true, "name": "Family" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_message_delivery_and_read_flow() {
    let app = app();
    let (_, amina) = register(&app, "amina").await;
    let (bilal_id, bilal) = register(&app, "bilal").await;
    let chat = open_chat(&app, &amina, bilal_id).await;

    let (status, sent) = call(
        &app,
        Method::POST,
        "/api/messages",
        Some(&amina),
        Some(json!({ "chatId": chat, "text": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["status"], "delivered");

    let (_, chats) = call(&app, Method::GET, "/api/chats", Some(&bilal), None).await;
    assert_eq!(chats[0]["id"], chat);
    assert_eq!(chats[0]["unreadCount"], 1);
    assert_eq!(chats[0]["lastMessage"], "hi");
    assert_eq!(chats[0]["lastMessageSent"], false);

    let (status, thread) = call(
        &app,
        Method::GET,
        &format!("/api/messages/{chat}"),
        Some(&bilal),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thread.as_array().unwrap().len(), 1);
    assert_eq!(thread[0]["status"], "read");

    let (_, chats) = call(&app, Method::GET, "/api/chats", Some(&bilal), None).await;
    assert_eq!(chats[0]["unreadCount"], 0);

    let (_, chats) = call(&app, Method::GET, "/api/chats", Some(&amina), None).await;
    assert_eq!(chats[0]["lastMessageSent"], true);
    assert_eq!(chats[0]["lastMessageStatus"], "read");
}

#[tokio::test]
async fn test_media_only_message_shows_placeholder() {
    let app = app();
    let (_, amina) = register(&app, "amina").await;
    let (bilal_id, bilal) = register(&app, "bilal").await;
    let chat = open_chat(&app, &amina, bilal_id).await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/messages",
        Some(&amina),
        Some(json!({ "chatId": chat, "mediaUrl": "https://cdn.example/cat.jpg" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, chats) = call(&app, Method::GET, "/api/chats", Some(&bilal), None).await;
    assert_eq!(chats[0]["lastMessage"], "Media");
}

#[tokio::test]
async fn test_message_errors() {
    let app = app();
    let (_, amina) = register(&app, "amina").await;
    let (bilal_id, _) = register(&app, "bilal").await;
    let (_, chidi) = register(&app, "chidi").await;
    let chat = open_chat(&app, &amina, bilal_id).await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/messages",
        Some(&amina),
        Some(json!({ "chatId": chat })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/messages",
        Some(&amina),
        Some(json!({ "chatId": 999, "text": "hello?" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/messages",
        Some(&chidi),
        Some(json!({ "chatId": chat, "text": "let me in" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/api/messages/{chat}"),
        Some(&chidi),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&app, Method::GET, "/api/messages/999", Some(&amina), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_login_presence_is_visible_to_contacts() {
    let app = app();
    let (_, amina) = register(&app, "amina").await;
    let (bilal_id, bilal) = register(&app, "bilal").await;
    let chat = open_chat(&app, &amina, bilal_id).await;

    call(&app, Method::POST, "/api/auth/logout", Some(&bilal), None).await;
    let (_, chats) = call(&app, Method::GET, "/api/chats", Some(&amina), None).await;
    assert_eq!(chats[0]["isOnline"], false);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "bilal", "password": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let bilal = body["token"].as_str().unwrap().to_string();

    let (_, chats) = call(&app, Method::GET, "/api/chats", Some(&amina), None).await;
    assert_eq!(chats[0]["id"], chat);
    assert_eq!(chats[0]["isOnline"], true);

    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/api/messages/{chat}"),
        Some(&bilal),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_self_chat_is_named_after_the_caller() {
    let app = app();
    let (amina_id, amina) = register(&app, "amina").await;

    let (status, created) = call(
        &app,
        Method::POST,
        "/api/chats",
        Some(&amina),
        Some(json!({ "contactId": amina_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "amina");

    let (_, chats) = call(&app, Method::GET, "/api/chats", Some(&amina), None).await;
    assert_eq!(chats[0]["name"], "amina");
    assert_eq!(chats[0]["unreadCount"], 0);
}

#[tokio::test]
async fn test_on_disk_database_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let location = DatabaseLocation::Path(dir.path().join("data").join("gallan.db"));
    let config = ServerConfig {
        database: location.clone(),
        ..ServerConfig::default()
    };

    let app = build_router(AppState::new(location.open().unwrap(), config.clone()));
    let (_, amina) = register(&app, "amina").await;
    let (bilal_id, _) = register(&app, "bilal").await;
    let chat = open_chat(&app, &amina, bilal_id).await;
    call(
        &app,
        Method::POST,
        "/api/messages",
        Some(&amina),
        Some(json!({ "chatId": chat, "text": "still here?" })),
    )
    .await;
    drop(app);

    let app = build_router(AppState::new(location.open().unwrap(), config));
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "bilal", "password": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let bilal = body["token"].as_str().unwrap().to_string();

    let (_, chats) = call(&app, Method::GET, "/api/chats", Some(&bilal), None).await;
    assert_eq!(chats[0]["lastMessage"], "still here?");
    assert_eq!(chats[0]["unreadCount"], 1);
}
