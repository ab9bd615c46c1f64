//! REST handlers and DTOs.
//!
//! Thin layer over the stores and the reply service: decode, authorize,
//! delegate, encode. The reply error taxonomy maps onto HTTP statuses
//! here and nowhere else.

use axum::extract::{Extension, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use counsel_chat::scenario;
use counsel_core::{Chat, Document, Message, ReplyError};

use crate::auth::{self, AuthedUser};
use crate::SharedState;

// --- Error mapping ---

#[derive(Serialize)]
pub struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

fn reply_error(err: ReplyError) -> ApiError {
    let status = match &err {
        ReplyError::InvalidInput => StatusCode::BAD_REQUEST,
        ReplyError::NotFound => StatusCode::NOT_FOUND,
        ReplyError::AccessDenied => StatusCode::FORBIDDEN,
        ReplyError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ReplyError::Generation(_) => StatusCode::BAD_GATEWAY,
    };
    error(status, err.to_string())
}

fn store_error(e: counsel_core::StoreError) -> ApiError {
    error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

// --- Health ---

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// --- Auth ---

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    token: String,
    user: UserResponse,
}

#[derive(Serialize)]
pub struct UserResponse {
    id: String,
    email: String,
    name: String,
}

pub async fn login_handler(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = req.email.trim();
    if email.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "email is required"));
    }
    if req.password.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "password is required"));
    }

    let user = state
        .users
        .get_by_email(email)
        .await
        .map_err(store_error)?
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "invalid credentials"))?;

    if !user.is_active {
        return Err(error(StatusCode::FORBIDDEN, "account is disabled"));
    }

    if !auth::verify_password(&req.password, &user.password_hash) {
        return Err(error(StatusCode::UNAUTHORIZED, "invalid credentials"));
    }

    if let Err(e) = state.users.update_last_login(user.id).await {
        warn!(user_id = %user.id, error = %e, "failed to record last login");
    }

    Ok(Json(LoginResponse {
        token: state.tokens.issue(user.id),
        user: UserResponse {
            id: user.id.to_string(),
            email: user.email,
            name: user.name,
        },
    }))
}

// --- Chats ---

#[derive(Serialize)]
pub struct ChatResponse {
    id: String,
    title: Option<String>,
    status: &'static str,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_message_at: DateTime<Utc>,
}

impl From<&Chat> for ChatResponse {
    fn from(chat: &Chat) -> Self {
        Self {
            id: chat.id.to_string(),
            title: chat.title.clone(),
            status: chat.status.as_str(),
            created_at: chat.created_at,
            updated_at: chat.updated_at,
            last_message_at: chat.last_message_at,
        }
    }
}

#[derive(Serialize)]
pub struct ChatsListResponse {
    chats: Vec<ChatResponse>,
}

pub async fn list_chats_handler(
    State(state): State<SharedState>,
    Extension(AuthedUser(user_id)): Extension<AuthedUser>,
) -> Result<Json<ChatsListResponse>, ApiError> {
    let chats = state
        .chats
        .list_by_user(user_id)
        .await
        .map_err(store_error)?;

    Ok(Json(ChatsListResponse {
        chats: chats.iter().map(ChatResponse::from).collect(),
    }))
}

#[derive(Deserialize)]
pub struct CreateChatRequest {
    #[serde(default)]
    title: Option<String>,
}

pub async fn create_chat_handler(
    State(state): State<SharedState>,
    Extension(AuthedUser(user_id)): Extension<AuthedUser>,
    Json(req): Json<CreateChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), ApiError> {
    let chat = Chat::new(user_id, req.title);
    state.chats.create(&chat).await.map_err(store_error)?;

    Ok((StatusCode::CREATED, Json(ChatResponse::from(&chat))))
}

// --- Messages ---

#[derive(Serialize)]
pub struct MessageResponse {
    id: String,
    role: &'static str,
    content: String,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<i64>,
}

impl From<&Message> for MessageResponse {
    fn from(msg: &Message) -> Self {
        Self {
            id: msg.id.to_string(),
            role: msg.role.as_str(),
            content: msg.content.clone(),
            created_at: msg.created_at,
            latency_ms: msg.latency_ms,
        }
    }
}

#[derive(Serialize)]
pub struct MessagesListResponse {
    messages: Vec<MessageResponse>,
}

pub async fn list_messages_handler(
    State(state): State<SharedState>,
    Extension(AuthedUser(user_id)): Extension<AuthedUser>,
    Path(chat_id): Path<String>,
) -> Result<Json<MessagesListResponse>, ApiError> {
    let chat_id = parse_id(&chat_id, "chat_id")?;

    let chat = state
        .chats
        .get(chat_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "chat not found"))?;
    if !chat.is_owned_by(user_id) {
        return Err(error(StatusCode::FORBIDDEN, "access denied"));
    }

    let messages = state
        .messages
        .list(chat_id, 100, 0)
        .await
        .map_err(store_error)?;

    Ok(Json(MessagesListResponse {
        messages: messages.iter().map(MessageResponse::from).collect(),
    }))
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    content: String,
    #[serde(default)]
    document_ids: Vec<String>,
    #[serde(default)]
    scenario_code: Option<String>,
}

#[derive(Serialize)]
pub struct SendMessageResponse {
    message: MessageResponse,
}

pub async fn send_message_handler(
    State(state): State<SharedState>,
    Extension(AuthedUser(user_id)): Extension<AuthedUser>,
    Path(chat_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let chat_id = parse_id(&chat_id, "chat_id")?;

    // Unparseable document IDs are skipped, consistent with document
    // failures being best-effort further down.
    let document_ids: Vec<Uuid> = req
        .document_ids
        .iter()
        .filter_map(|id| Uuid::parse_str(id).ok())
        .collect();

    let assistant_turn = state
        .reply
        .reply(
            chat_id,
            user_id,
            &req.content,
            &document_ids,
            req.scenario_code.as_deref(),
        )
        .await
        .map_err(reply_error)?;

    Ok(Json(SendMessageResponse {
        message: MessageResponse::from(&assistant_turn),
    }))
}

// --- Documents ---

#[derive(Serialize)]
pub struct DocumentResponse {
    id: String,
    file_name: String,
    mime_type: String,
    size_bytes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    chat_id: Option<String>,
}

impl From<&Document> for DocumentResponse {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.to_string(),
            file_name: doc.name.clone(),
            mime_type: doc.mime_type.clone(),
            size_bytes: doc.size_bytes,
            chat_id: doc.chat_id.map(|id| id.to_string()),
        }
    }
}

#[derive(Serialize)]
pub struct DocumentsListResponse {
    documents: Vec<DocumentResponse>,
}

#[derive(Serialize)]
pub struct DocumentDetailResponse {
    #[serde(flatten)]
    document: DocumentResponse,
    text_excerpt: String,
}

pub async fn upload_document_handler(
    State(state): State<SharedState>,
    Extension(AuthedUser(user_id)): Extension<AuthedUser>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentResponse>), ApiError> {
    let mut file: Option<(String, String, Vec<u8>)> = None;
    let mut chat_id: Option<Uuid> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| error(StatusCode::BAD_REQUEST, format!("bad multipart body: {e}")))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let mime = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    error(StatusCode::BAD_REQUEST, format!("failed to read file: {e}"))
                })?;
                file = Some((name, mime, bytes.to_vec()));
            }
            Some("chat_id") => {
                let value = field.text().await.unwrap_or_default();
                chat_id = Uuid::parse_str(&value).ok();
            }
            _ => {}
        }
    }

    let Some((name, mime, bytes)) = file else {
        return Err(error(StatusCode::BAD_REQUEST, "file is required"));
    };

    if bytes.len() > state.limits.max_file_size_bytes {
        return Err(error(
            StatusCode::BAD_REQUEST,
            format!(
                "file too large, max size: {} bytes",
                state.limits.max_file_size_bytes
            ),
        ));
    }

    let extracted_text = extract_text(&mime, &name, &bytes, state.limits.max_file_text_chars);
    let document = Document::new(
        user_id,
        chat_id,
        name,
        mime,
        bytes.len() as i64,
        extracted_text,
    );
    state
        .documents
        .create(&document)
        .await
        .map_err(store_error)?;

    Ok((StatusCode::CREATED, Json(DocumentResponse::from(&document))))
}

/// Pull plain text out of an uploaded file, capped in characters.
///
/// Only text-like uploads are extracted; anything else is stored as
/// metadata only and contributes no prompt context.
fn extract_text(mime: &str, name: &str, bytes: &[u8], max_chars: usize) -> String {
    let text_like = mime.starts_with("text/")
        || mime == "application/json"
        || [".txt", ".md", ".csv", ".json"]
            .iter()
            .any(|ext| name.ends_with(ext));

    if !text_like {
        return String::new();
    }

    String::from_utf8_lossy(bytes).chars().take(max_chars).collect()
}

pub async fn list_documents_handler(
    State(state): State<SharedState>,
    Extension(AuthedUser(user_id)): Extension<AuthedUser>,
) -> Result<Json<DocumentsListResponse>, ApiError> {
    let documents = state
        .documents
        .list_by_user(user_id)
        .await
        .map_err(store_error)?;

    Ok(Json(DocumentsListResponse {
        documents: documents.iter().map(DocumentResponse::from).collect(),
    }))
}

pub async fn get_document_handler(
    State(state): State<SharedState>,
    Extension(AuthedUser(user_id)): Extension<AuthedUser>,
    Path(id): Path<String>,
) -> Result<Json<DocumentDetailResponse>, ApiError> {
    let document_id = parse_id(&id, "document id")?;

    let document = state
        .documents
        .get(document_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "document not found"))?;

    if document.user_id != user_id {
        return Err(error(StatusCode::FORBIDDEN, "access denied"));
    }

    Ok(Json(DocumentDetailResponse {
        text_excerpt: document.excerpt(200),
        document: DocumentResponse::from(&document),
    }))
}

// --- Scenarios & limits ---

#[derive(Serialize)]
pub struct ScenariosResponse {
    scenarios: &'static [scenario::Scenario],
}

pub async fn scenarios_handler() -> Json<ScenariosResponse> {
    Json(ScenariosResponse {
        scenarios: scenario::catalog(),
    })
}

#[derive(Serialize)]
pub struct LimitsResponse {
    max_file_size_bytes: usize,
    max_file_text_chars: usize,
    max_history_chars: usize,
    max_prompt_chars: usize,
    max_request_chars: usize,
}

pub async fn limits_handler(State(state): State<SharedState>) -> Json<LimitsResponse> {
    Json(LimitsResponse {
        max_file_size_bytes: state.limits.max_file_size_bytes,
        max_file_text_chars: state.limits.max_file_text_chars,
        max_history_chars: state.limits.max_history_chars,
        max_prompt_chars: state.limits.max_prompt_chars,
        max_request_chars: state.limits.max_request_chars,
    })
}

fn parse_id(value: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(value).map_err(|_| error(StatusCode::BAD_REQUEST, format!("invalid {what}")))
}
