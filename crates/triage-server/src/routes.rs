//! HTTP routes and handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::service::AppState;
use crate::store::{TicketRecord, TicketStats};
use triage_core::{Category, Classification, TicketDraft};

const MAX_SUBJECT_CHARS: usize = 500;
const MIN_BODY_CHARS: usize = 10;
const MAX_BODY_CHARS: usize = 10_000;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/v1/tickets", post(create_ticket).get(list_tickets))
        .route("/v1/tickets/:id", get(get_ticket))
        .route("/v1/stats", get(stats))
        .fallback(fallback)
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn metrics(State(state): State<AppState>) -> String {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

async fn fallback() -> Response {
    AppError::NotFound("no such route".to_string()).into_response()
}

/// Ticket creation request; accepts either a single `text` field or a
/// `subject` + `body` pair, `text` taking precedence
#[derive(Debug, Deserialize)]
struct CreateTicketRequest {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

impl CreateTicketRequest {
    /// Resolve the request into a validated draft.
    ///
    /// For `text` input, a first line followed by more content becomes the
    /// subject; single-line text is all body.
    fn into_draft(self) -> Result<TicketDraft, AppError> {
        let (subject, body) = match self.text {
            Some(text) => {
                let text = text.trim();
                match text.split_once('\n') {
                    Some((first, rest)) if !rest.trim().is_empty() => {
                        let subject: String = first.trim().chars().take(MAX_SUBJECT_CHARS).collect();
                        (Some(subject), rest.trim().to_string())
                    }
                    _ => (None, text.to_string()),
                }
            }
            None => {
                let subject = match self.subject {
                    Some(subject) => {
                        let subject = subject.trim().to_string();
                        if subject.chars().count() > MAX_SUBJECT_CHARS {
                            return Err(AppError::Validation(format!(
                                "subject must be at most {MAX_SUBJECT_CHARS} characters"
                            )));
                        }
                        (!subject.is_empty()).then_some(subject)
                    }
                    None => None,
                };
                let body = self
                    .body
                    .map(|body| body.trim().to_string())
                    .unwrap_or_default();
                (subject, body)
            }
        };

        if body.chars().count() < MIN_BODY_CHARS {
            return Err(AppError::Validation(format!(
                "either 'text' or 'body' must be provided with at least {MIN_BODY_CHARS} characters"
            )));
        }
        if body.chars().count() > MAX_BODY_CHARS {
            return Err(AppError::Validation(format!(
                "body must be at most {MAX_BODY_CHARS} characters"
            )));
        }

        Ok(TicketDraft::new(subject, body))
    }
}

/// Query parameters for ticket listing
#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
}

/// Query parameters for statistics
#[derive(Debug, Deserialize)]
struct StatsParams {
    #[serde(default)]
    days: Option<i64>,
}

#[derive(Debug, Serialize)]
struct TicketResponse {
    id: i64,
    subject: Option<String>,
    body: String,
    created_at: DateTime<Utc>,
    classification: Option<Classification>,
}

impl From<TicketRecord> for TicketResponse {
    fn from(record: TicketRecord) -> Self {
        Self {
            id: record.ticket.id,
            subject: record.ticket.subject,
            body: record.ticket.body,
            created_at: record.ticket.created_at,
            classification: record.classification,
        }
    }
}

#[derive(Debug, Serialize)]
struct TicketListResponse {
    items: Vec<TicketResponse>,
    total: i64,
    limit: i64,
    offset: i64,
}

async fn create_ticket(
    State(state): State<AppState>,
    Json(request): Json<CreateTicketRequest>,
) -> Result<Response, AppError> {
    metrics::counter!("triage_requests_total", "endpoint" => "create_ticket").increment(1);

    let draft = request.into_draft()?;
    let record = state.create_ticket(draft).await?;
    info!(ticket_id = record.ticket.id, "ticket created");

    Ok((StatusCode::CREATED, Json(TicketResponse::from(record))).into_response())
}

async fn get_ticket(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TicketResponse>, AppError> {
    let record = state
        .get_ticket(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ticket {id} not found")))?;

    Ok(Json(record.into()))
}

async fn list_tickets(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<TicketListResponse>, AppError> {
    let category = params.category.as_deref().map(parse_category).transpose()?;

    let limit = params.limit.unwrap_or(100);
    if !(1..=1000).contains(&limit) {
        return Err(AppError::Validation(
            "limit must be between 1 and 1000".to_string(),
        ));
    }

    let offset = params.offset.unwrap_or(0);
    if offset < 0 {
        return Err(AppError::Validation("offset must not be negative".to_string()));
    }

    let (records, total) = state.list_tickets(category, limit, offset).await?;

    Ok(Json(TicketListResponse {
        items: records.into_iter().map(TicketResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}

async fn stats(
    State(state): State<AppState>,
    Query(params): Query<StatsParams>,
) -> Result<Json<TicketStats>, AppError> {
    let days = params.days.unwrap_or(7);
    if !(1..=365).contains(&days) {
        return Err(AppError::Validation(
            "days must be between 1 and 365".to_string(),
        ));
    }

    Ok(Json(state.stats(days).await?))
}

/// Strict category parsing for filters.
///
/// Unlike `Category::normalize`, an unknown filter value is a client error,
/// not a default: filtering by "banana" should not silently mean "general".
fn parse_category(raw: &str) -> Result<Category, AppError> {
    match raw.to_lowercase().as_str() {
        "technical" => Ok(Category::Technical),
        "billing" => Ok(Category::Billing),
        "general" => Ok(Category::General),
        _ => Err(AppError::Validation(format!(
            "category must be one of technical, billing, general (got {raw:?})"
        ))),
    }
}

/// Error handling
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    NotFound(String),
    Internal(String),
}

impl From<triage_core::Error> for AppError {
    fn from(err: triage_core::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };

        let body = json!({
            "error": {
                "message": message,
                "type": error_type,
            }
        });

        (status, Json(body)).into_response()
    }
}
