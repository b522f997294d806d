use axum::extract::{Path, Query, State};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::pages;
use super::AppState;
use crate::bridge::{MessageFilter, MessageKind, MessageRecord, LOCAL_USER_LABEL};
use crate::channels::whatsapp::{self, history};
use crate::config::normalize_number;
use crate::error::{BridgeError, Result};
use crate::webhook;

pub async fn index(State(app): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "wabridge",
        "version": crate::VERSION,
        "endpoints": {
            "GET /health": "liveness and counters",
            "GET /status": "connection and webhook state",
            "GET /qr": "pairing QR code (HTML)",
            "GET /messages": "message log (?phone, ?fromMe, ?received, ?limit, ?format=html)",
            "GET /conversations": "messages grouped by counterparty",
            "GET /contacts": "per-contact summaries",
            "GET /history/{phone}": "on-demand chat history (?limit)",
            "POST /send-message": "{ number, message }",
            "POST /webhook": "{ action: 'send_message', number, message }",
            "POST /test-webhook": "push a synthetic record to the webhook",
        },
        "connected": app.conn.is_connected().await,
    }))
}

pub async fn health(State(app): State<AppState>) -> Json<Value> {
    let (messages, contacts) = app.bridge.counts().await;
    Json(json!({
        "status": "ok",
        "connected": app.conn.is_connected().await,
        "uptime": app.started_at.elapsed().as_secs(),
        "totalMessages": messages,
        "totalContacts": contacts,
        "timestamp": Utc::now(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    limit: Option<usize>,
}

pub async fn status(
    State(app): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Json<Value> {
    let (messages, contacts) = app.bridge.counts().await;
    let last = app
        .bridge
        .messages(&MessageFilter {
            limit: Some(query.limit.unwrap_or(10)),
            ..Default::default()
        })
        .await;
    Json(json!({
        "connected": app.conn.is_connected().await,
        "hasQrCode": app.conn.qr_code().await.is_some(),
        "webhookConfigured": app.webhook.is_configured(),
        "webhookUrl": app.webhook.display_url(),
        "uptimeSeconds": app.started_at.elapsed().as_secs(),
        "totalMessages": messages,
        "totalContacts": contacts,
        "lastMessages": last,
    }))
}

pub async fn qr_page(State(app): State<AppState>) -> Html<String> {
    if app.conn.is_connected().await {
        return Html(pages::qr_connected());
    }
    match app.conn.qr_code().await {
        Some(code) => Html(pages::qr_pairing(&code)),
        None => Html(pages::qr_waiting()),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesQuery {
    phone: Option<String>,
    #[serde(default)]
    from_me: bool,
    #[serde(default)]
    received: bool,
    limit: Option<usize>,
    format: Option<String>,
}

pub async fn messages(
    State(app): State<AppState>,
    Query(query): Query<MessagesQuery>,
) -> Response {
    let filter = MessageFilter {
        phone: query.phone.as_deref().map(normalize_number),
        from_me: query.from_me,
        received: query.received,
        limit: query.limit,
    };
    let records = app.bridge.messages(&filter).await;

    if query.format.as_deref() == Some("html") {
        return Html(pages::messages_table(&records)).into_response();
    }
    Json(json!({
        "total": records.len(),
        "messages": records,
    }))
    .into_response()
}

pub async fn conversations(State(app): State<AppState>) -> Json<Value> {
    let conversations = app.bridge.conversations().await;
    Json(json!({
        "total": conversations.len(),
        "conversations": conversations,
    }))
}

pub async fn contacts(State(app): State<AppState>) -> Json<Value> {
    let contacts = app.bridge.contacts().await;
    Json(json!({
        "total": contacts.len(),
        "contacts": contacts,
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    limit: Option<usize>,
}

pub async fn history(
    State(app): State<AppState>,
    Path(phone): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Value>> {
    // No source means history can never be served, connected or not.
    let source = app.history.as_ref().ok_or_else(|| {
        BridgeError::HistoryUnavailable("no history source available".into())
    })?;
    if !app.conn.is_connected().await {
        return Err(BridgeError::NotConnected);
    }

    let jid = whatsapp::to_user_jid(&phone)?.to_string();
    let own_id = app.conn.own_id().await;
    let records = history::fetch_normalized(
        source.as_ref(),
        &jid,
        query.limit.unwrap_or(20),
        own_id.as_deref(),
    )
    .await?;

    Ok(Json(json!({
        "phone": normalize_number(&phone),
        "totalMessages": records.len(),
        "history": records,
        "timestamp": Utc::now(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    number: Option<String>,
    message: Option<String>,
}

pub async fn send_message(
    State(app): State<AppState>,
    Json(request): Json<SendRequest>,
) -> Result<Json<Value>> {
    let number = request
        .number
        .as_deref()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| BridgeError::InvalidRequest("'number' is required".into()))?;
    let message = request
        .message
        .as_deref()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| BridgeError::InvalidRequest("'message' is required".into()))?;

    perform_send(&app, number, message).await
}

/// Send a message and record it as sent. Shared by `/send-message` and the
/// webhook relay.
async fn perform_send(app: &AppState, number: &str, message: &str) -> Result<Json<Value>> {
    let message_id = whatsapp::send_text(&app.conn, number, message).await?;

    let record = MessageRecord {
        id: message_id.clone(),
        from_number: normalize_number(number),
        text: message.to_string(),
        timestamp: Utc::now(),
        push_name: LOCAL_USER_LABEL.to_string(),
        from_me: true,
        kind: MessageKind::Text,
        is_historic: false,
        saved_at: None,
    };
    // Sent via the API, so the record is authoritative: accept unconditionally.
    if let Some(accepted) = app.bridge.record(record, true).await {
        webhook::deliver_detached(&app.webhook, accepted);
    }

    tracing::info!("message sent to {}", normalize_number(number));
    Ok(Json(json!({
        "success": true,
        "messageId": message_id,
    })))
}

#[derive(Debug, Deserialize)]
pub struct WebhookCommand {
    action: Option<String>,
    number: Option<String>,
    message: Option<String>,
}

/// Inbound command relay for automations that can only call one URL.
pub async fn webhook_relay(
    State(app): State<AppState>,
    Json(command): Json<WebhookCommand>,
) -> Result<Json<Value>> {
    match command.action.as_deref() {
        Some("send_message") => {
            let number = command
                .number
                .as_deref()
                .filter(|n| !n.is_empty())
                .ok_or_else(|| BridgeError::InvalidRequest("'number' is required".into()))?;
            let message = command
                .message
                .as_deref()
                .filter(|m| !m.is_empty())
                .ok_or_else(|| BridgeError::InvalidRequest("'message' is required".into()))?;
            perform_send(&app, number, message).await
        }
        Some(other) => Err(BridgeError::InvalidRequest(format!(
            "unknown action '{other}'"
        ))),
        None => Err(BridgeError::InvalidRequest("'action' is required".into())),
    }
}

pub async fn test_webhook(State(app): State<AppState>) -> Json<Value> {
    let record = MessageRecord {
        id: uuid::Uuid::new_v4().to_string(),
        from_number: "5511999999999".into(),
        text: "Mensagem de teste do webhook".into(),
        timestamp: Utc::now(),
        push_name: "Teste".into(),
        from_me: false,
        kind: MessageKind::Text,
        is_historic: false,
        saved_at: Some(Utc::now()),
    };
    app.webhook.deliver_raw(&record, "test").await;
    Json(json!({
        "success": true,
        "webhookConfigured": app.webhook.is_configured(),
    }))
}
