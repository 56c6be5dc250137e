use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{
        HeaderValue, Request, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::{
        chat::ChatService,
        error::AppError,
        export::ExportService,
        sessions::SessionService,
    },
    domain::chat::{Attachment, ChatMessage, Role},
    domain::error::DomainError,
    domain::school::SchoolProfile,
    infra::store::SessionStore,
    presentation::views::{
        ChatPageTemplate, ChatPageView, LoginTemplate, LoginView, MessageTemplate, MessageView,
        render_template, render_template_response,
    },
};

use super::{
    auth::{STAFF_COOKIE, StaffGate},
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub sessions: Arc<SessionService>,
    pub chat: Arc<ChatService>,
    pub export: Arc<ExportService>,
    pub store: Arc<SessionStore>,
    pub profile: Arc<SchoolProfile>,
    pub gate: Arc<StaffGate>,
}

pub fn build_router(state: HttpState) -> Router {
    let gated = Router::new()
        .route("/", get(index))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(session_page))
        .route("/sessions/{id}/messages", post(send_message))
        .route("/sessions/{id}/messages/{index}/word", get(word_export))
        .route("/sessions/{id}/messages/{index}/print", get(print_export))
        .route("/settings/api-key", post(save_api_key))
        .layer(middleware::from_fn_with_state(state.clone(), require_staff));

    let open = Router::new()
        .route("/login", get(login_page).post(login_submit))
        .route("/healthz", get(health))
        .route("/static/{*path}", get(crate::infra::assets::serve));

    gated
        .merge(open)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn require_staff(
    State(state): State<HttpState>,
    jar: CookieJar,
    request: Request<Body>,
    next: Next,
) -> Response {
    let cookie = jar.get(STAFF_COOKIE).map(|cookie| cookie.value());
    if state.gate.accepts(cookie) {
        next.run(request).await
    } else {
        Redirect::to("/login").into_response()
    }
}

async fn index(State(state): State<HttpState>) -> Result<Response, AppError> {
    let active = state.sessions.current_or_create().await?;
    chat_page(&state, active.id).await
}

async fn session_page(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    chat_page(&state, id).await
}

async fn chat_page(state: &HttpState, active_id: Uuid) -> Result<Response, AppError> {
    let active = state.sessions.get(active_id).await?;
    let sessions = state.sessions.list().await;
    let api_key_saved = state.store.api_key().await.is_some();

    let view = ChatPageView::new(&state.profile, &sessions, &active, api_key_saved);
    Ok(render_template_response(
        ChatPageTemplate { view },
        StatusCode::OK,
    ))
}

async fn create_session(State(state): State<HttpState>) -> Result<Response, AppError> {
    let session = state.sessions.create().await?;
    Ok(Redirect::to(&format!("/sessions/{}", session.id)).into_response())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SendMessageRequest {
    text: String,
    attachments: Vec<AttachmentPayload>,
}

#[derive(Debug, Deserialize)]
struct AttachmentPayload {
    name: String,
    media_type: String,
    data: String,
}

async fn send_message(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
    axum::Json(request): axum::Json<SendMessageRequest>,
) -> Result<Response, AppError> {
    let attachments = request
        .attachments
        .into_iter()
        .map(|payload| Attachment {
            name: payload.name,
            media_type: payload.media_type,
            data: payload.data,
        })
        .collect();

    state.chat.send(id, request.text, attachments).await?;

    // Render the two freshly appended turns as bubbles.
    let session = state.sessions.get(id).await?;
    let total = session.messages.len();
    let mut html = String::new();
    for index in total.saturating_sub(2)..total {
        let message = MessageView::new(session.id, index, &session.messages[index]);
        html.push_str(&render_template(MessageTemplate { message })?.0);
    }
    Ok(Html(html).into_response())
}

async fn word_export(
    State(state): State<HttpState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Response, AppError> {
    let session = state.sessions.get(id).await?;
    let message = exportable_message(&session.messages, index)?;

    let export = state.export.word_document(
        &message.text,
        &state.profile.letterhead(),
        &state.profile.tag,
        OffsetDateTime::now_utc(),
    );

    let disposition = format!("attachment; filename=\"{}\"", export.filename);
    let mut response = export.bytes.into_response();
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static(export.media_type),
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response.headers_mut().insert(CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

async fn print_export(
    State(state): State<HttpState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Response, AppError> {
    let session = state.sessions.get(id).await?;
    let message = exportable_message(&session.messages, index)?;

    let html = state
        .export
        .print_document(&message.text, &state.profile.letterhead());
    Ok(Html(html).into_response())
}

/// Only assistant turns are exportable documents.
fn exportable_message(messages: &[ChatMessage], index: usize) -> Result<&ChatMessage, AppError> {
    messages
        .get(index)
        .filter(|message| message.role == Role::Model)
        .ok_or_else(|| DomainError::not_found("message").into())
}

#[derive(Debug, Deserialize)]
struct ApiKeyForm {
    api_key: String,
}

async fn save_api_key(
    State(state): State<HttpState>,
    axum::Form(form): axum::Form<ApiKeyForm>,
) -> Result<Response, AppError> {
    state.store.set_api_key(Some(form.api_key)).await?;
    Ok(Redirect::to("/").into_response())
}

async fn login_page(State(state): State<HttpState>) -> Response {
    if !state.gate.enabled() {
        return Redirect::to("/").into_response();
    }
    let view = LoginView {
        school_name: state.profile.name.clone(),
        failed: false,
    };
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    passphrase: String,
}

async fn login_submit(
    State(state): State<HttpState>,
    jar: CookieJar,
    axum::Form(form): axum::Form<LoginForm>,
) -> Response {
    if !state.gate.enabled() {
        return Redirect::to("/").into_response();
    }

    match state.gate.exchange(&form.passphrase) {
        Some(token) => {
            let cookie = Cookie::build((STAFF_COOKIE, token))
                .path("/")
                .http_only(true)
                .build();
            (jar.add(cookie), Redirect::to("/")).into_response()
        }
        None => {
            let view = LoginView {
                school_name: state.profile.name.clone(),
                failed: true,
            };
            render_template_response(LoginTemplate { view }, StatusCode::UNAUTHORIZED)
        }
    }
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
