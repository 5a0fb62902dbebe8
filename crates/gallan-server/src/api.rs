use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use gallan_shared::constants::STARTER_CONTEXT_MESSAGES;
use gallan_shared::protocol::{
    AddContactRequest, ConversationStarter, CreateChatRequest, LoginRequest, RegisterRequest,
    SendMessageRequest, UpdateProfileRequest,
};
use gallan_shared::{ChatId, UserId};
use gallan_store::{ChatView, Contact, Database, Message, NewUser, User};

use crate::auth::{bearer_token, hash_password, verify_password, SessionStore};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::starters::{StarterContext, StarterService};

#[derive(Clone)]
pub struct AppState {
    /// One connection for the whole server; holding the lock serializes
    /// every write.
    pub db: Arc<Mutex<Database>>,
    pub sessions: SessionStore,
    pub starters: StarterService,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Database, config: ServerConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            sessions: SessionStore::new(config.session_ttl),
            starters: StarterService::new(&config),
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = if state.config.cors_allow_any {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/auth/logout", post(logout))
        .route("/api/users/:id", patch(update_user))
        .route("/api/contacts", get(list_contacts).post(add_contact))
        .route(
            "/api/contacts/:contact_id/conversation-starters",
            get(conversation_starters),
        )
        .route("/api/chats", get(list_chats).post(create_chat))
        .route("/api/messages", post(send_message))
        .route("/api/messages/:chat_id", get(list_messages))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    name: String,
    version: &'static str,
}

#[derive(Serialize)]
struct AuthResponse {
    user: User,
    token: String,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Resolve the caller from the bearer token.
async fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<UserId, ServerError> {
    let token = bearer_token(headers)?;
    state
        .sessions
        .resolve(token)
        .await
        .ok_or(ServerError::Unauthorized)
}

/// 404 for unknown chats, 403 for chats the caller is not in.
fn ensure_member(db: &Database, chat: ChatId, user: UserId) -> Result<(), ServerError> {
    db.get_chat(chat)?;
    if !db.is_participant(chat, user)? {
        return Err(ServerError::Forbidden(format!(
            "not a participant of chat {chat}"
        )));
    }
    Ok(())
}

// ─── Auth ───

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ServerError> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(ServerError::BadRequest(
            "Missing username or password".into(),
        ));
    }

    let password_hash = hash_password(&req.password)?;
    let display_name = req
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(req.username.trim());

    let user = {
        let db = state.db.lock().await;
        let user = db.create_user(&NewUser {
            username: &req.username,
            password_hash: &password_hash,
            display_name,
            status: req.status.as_deref(),
            avatar: req.avatar.as_deref(),
        })?;
        db.set_presence(user.id, true)?
    };

    let token = state.sessions.create(user.id).await;
    info!(user_id = %user.id, username = %user.username, "User registered");

    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ServerError> {
    let user = state
        .db
        .lock()
        .await
        .get_user_by_username(&req.username)?
        .ok_or(ServerError::Unauthorized)?;

    // Argon2 is slow; other requests keep the database meanwhile.
    if !verify_password(&req.password, &user.password_hash)? {
        return Err(ServerError::Unauthorized);
    }
    let user = state.db.lock().await.set_presence(user.id, true)?;

    let token = state.sessions.create(user.id).await;
    info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse { user, token }))
}

async fn me(headers: HeaderMap, State(state): State<AppState>) -> Result<Json<User>, ServerError> {
    let me = authenticate(&headers, &state).await?;
    let user = state.db.lock().await.get_user(me)?;
    Ok(Json(user))
}

async fn logout(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let token = bearer_token(&headers)?;
    let user = state
        .sessions
        .revoke(token)
        .await
        .ok_or(ServerError::Unauthorized)?;

    state.db.lock().await.set_presence(user, false)?;
    info!(user_id = %user, "User logged out");

    Ok(Json(serde_json::json!({ "loggedOut": true })))
}

// ─── Users & contacts ───

async fn update_user(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<User>, ServerError> {
    let me = authenticate(&headers, &state).await?;
    if id != me {
        return Err(ServerError::Forbidden(
            "cannot edit another user's profile".into(),
        ));
    }

    let user = state.db.lock().await.update_profile(
        me,
        req.display_name.as_deref(),
        req.status.as_deref(),
    )?;
    Ok(Json(user))
}

async fn list_contacts(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<Contact>>, ServerError> {
    let me = authenticate(&headers, &state).await?;
    let contacts = state.db.lock().await.list_contacts(me)?;
    Ok(Json(contacts))
}

async fn add_contact(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<AddContactRequest>,
) -> Result<(StatusCode, Json<Contact>), ServerError> {
    let me = authenticate(&headers, &state).await?;

    let contact = {
        let db = state.db.lock().await;
        let target = db
            .get_user_by_username(&req.username)?
            .ok_or_else(|| ServerError::NotFound(format!("user {:?} not found", req.username)))?;
        db.create_contact(me, target.id, req.display_name.as_deref())?
    };

    info!(owner = %me, contact = %contact.contact_id, "Contact added");
    Ok((StatusCode::CREATED, Json(contact)))
}

async fn conversation_starters(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(contact_id): Path<UserId>,
) -> Result<Json<Vec<ConversationStarter>>, ServerError> {
    let me = authenticate(&headers, &state).await?;

    let (user, contact, recent) = {
        let db = state.db.lock().await;
        let user = db.get_user(me)?;
        let contact = db
            .get_contact(me, contact_id)?
            .ok_or_else(|| ServerError::NotFound(format!("contact {contact_id} not found")))?;

        let mut recent = match db.find_direct_chat(&[me, contact_id])? {
            Some(chat) => db.list_by_chat(chat.id)?,
            None => Vec::new(),
        };
        let skip = recent.len().saturating_sub(STARTER_CONTEXT_MESSAGES);
        recent.drain(..skip);

        (user, contact, recent)
    };

    let ctx = StarterContext {
        user: &user,
        contact_name: &contact.display_name,
        contact_status: contact.status.as_deref(),
        recent: &recent,
    };
    Ok(Json(state.starters.suggest(&ctx).await))
}

// ─── Chats ───

async fn list_chats(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<ChatView>>, ServerError> {
    let me = authenticate(&headers, &state).await?;
    let chats = state.db.lock().await.project_all(me)?;
    Ok(Json(chats))
}

async fn create_chat(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<CreateChatRequest>,
) -> Result<(StatusCode, Json<ChatView>), ServerError> {
    let me = authenticate(&headers, &state).await?;

    if req.is_group {
        return Err(ServerError::NotImplemented(
            "group chats are not supported yet".into(),
        ));
    }
    let other = req
        .contact_id
        .ok_or_else(|| ServerError::BadRequest("contactId is required".into()))?;

    let (view, created) = {
        let db = state.db.lock().await;
        let (chat, created) = db.open_direct_chat(me, other, req.name.as_deref())?;
        (db.project(chat.id, me)?, created)
    };

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(view)))
}

// ─── Messages ───

async fn list_messages(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(chat_id): Path<ChatId>,
) -> Result<Json<Vec<Message>>, ServerError> {
    let me = authenticate(&headers, &state).await?;

    let db = state.db.lock().await;
    ensure_member(&db, chat_id, me)?;
    let messages = db.delivery().open_chat(chat_id, me)?;
    Ok(Json(messages))
}

async fn send_message(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ServerError> {
    let me = authenticate(&headers, &state).await?;

    let db = state.db.lock().await;
    ensure_member(&db, req.chat_id, me)?;
    let message = db.delivery().send_message(
        req.chat_id,
        me,
        req.text.as_deref(),
        req.media_url.as_deref(),
    )?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
