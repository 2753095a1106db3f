//! HTTP 路由
//!
//! 请求/响应面：健康检查、注册/登录、房间列表、历史补拉，
//! 以及 WebSocket 升级入口。历史补拉是断线重连后找回错过
//! 消息的唯一途径——中继不做重放。

use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use domain::{ChatError, Identity, Message, RoomDescriptor, RoomId};

use crate::{error::ApiError, gateway, state::AppState};

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    identity: Identity,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    identity: Identity,
    token: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    time: chrono::DateTime<chrono::Utc>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .route("/ws", get(websocket_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register_user))
        .route("/auth/login", post(login_user))
        .route("/rooms", get(list_rooms))
        .route("/rooms/{room_id}/messages", get(get_history))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        time: chrono::Utc::now(),
    })
}

async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("username and password are required"));
    }

    let identity = state
        .store
        .register_user(&payload.username, &payload.password)
        .await?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { identity })))
}

async fn login_user(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<LoginResponse>, ApiError> {
    use domain::UserStore;

    let identity = state
        .store
        .authenticate(&payload.username, &payload.password)
        .await?;
    let token = state.store.issue_token(&identity).await?;

    Ok(Json(LoginResponse {
        identity,
        token: token.as_str().to_owned(),
    }))
}

async fn list_rooms(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<RoomDescriptor>>, ApiError> {
    use domain::RoomStore;

    let identity = bearer_identity(&state, &headers).await?;
    let rooms = state.store.list_rooms_for(&identity).await?;
    Ok(Json(rooms))
}

async fn get_history(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<Message>>, ApiError> {
    use domain::{MessageStore, RoomStore};

    let identity = bearer_identity(&state, &headers).await?;
    let room_id = RoomId::from(room_id);

    if !state
        .store
        .is_authorized_member(&identity, &room_id)
        .await?
    {
        return Err(ChatError::forbidden(room_id.as_str()).into());
    }

    let messages = state.store.read_messages(&room_id).await?;
    Ok(Json(messages))
}

/// 从 `Authorization: Bearer <token>` 解析身份。
async fn bearer_identity(state: &AppState, headers: &HeaderMap) -> Result<Identity, ApiError> {
    use domain::UserStore;

    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;

    Ok(state.store.resolve_token(token).await?)
}

async fn websocket_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| gateway::handle_socket(socket, state))
}
