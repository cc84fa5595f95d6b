#![deny(unsafe_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use lodgeops_adapters::{AllowAllAuthorizer, StaticDirectoryAuthorizer};
use lodgeops_core::{
    Authorizer, Capability, CashRegister, Decision, DueCursor, Expense, FundRequest,
    FundRequestLine, FundsEngine, FundsError, NullCashRegister, PartialPayment, PaymentDraft,
    PaymentMode, PaymentReminder, PaymentStatus, ReminderStatus, RequestKind, RequestStatus,
    StorageConfig, SubmitFundRequest,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Header carrying the acting principal. Authenticating it is the identity
/// collaborator's job upstream of this service.
pub const ACTOR_HEADER: &str = "x-actor-id";

#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub storage: StorageConfig,
    /// Actors granted the supervisory capability.
    pub supervisors: Vec<String>,
    /// Actors granted the finance-operator capability.
    pub operators: Vec<String>,
}

#[derive(Clone)]
pub struct ServiceState {
    pub engine: Arc<FundsEngine>,
    storage_backend: &'static str,
}

impl ServiceState {
    /// Bootstrap with the configured storage, a directory authorizer built
    /// from the config lists, and no till integration.
    pub async fn bootstrap(config: ServiceConfig) -> Result<Self, FundsError> {
        let authorizer: Arc<dyn Authorizer> =
            if config.supervisors.is_empty() && config.operators.is_empty() {
                warn!("no capability grants configured; every actor is allowed everything");
                Arc::new(AllowAllAuthorizer)
            } else {
                Arc::new(
                    StaticDirectoryAuthorizer::new()
                        .grant_all(&config.supervisors, Capability::Supervisory)
                        .grant_all(&config.operators, Capability::FinanceOperator),
                )
            };

        Self::with_collaborators(config, authorizer, Arc::new(NullCashRegister)).await
    }

    /// Bootstrap with explicit collaborators (used by tests and embedders).
    pub async fn with_collaborators(
        config: ServiceConfig,
        authorizer: Arc<dyn Authorizer>,
        cash_register: Arc<dyn CashRegister>,
    ) -> Result<Self, FundsError> {
        let storage_backend = config.storage.label();
        let store = config.storage.connect().await?;
        Ok(Self {
            engine: Arc::new(FundsEngine::new(store, authorizer, cash_register)),
            storage_backend,
        })
    }
}

pub fn build_router(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/fund-requests", post(create_fund_request).get(list_fund_requests))
        .route("/v1/fund-requests/:id", get(get_fund_request).delete(delete_fund_request))
        .route("/v1/fund-requests/:id/lines", put(edit_fund_request_lines))
        .route("/v1/fund-requests/:id/status", put(decide_fund_request))
        .route("/v1/expenses/:id", get(get_expense))
        .route("/v1/expenses/:id/partial-payments", post(record_partial_payment))
        .route("/v1/partial-payments/:id", delete(reverse_partial_payment))
        .route("/v1/expenses/:id/reminders", post(schedule_reminder))
        .route("/v1/reminders/:id/mark-sent", post(mark_reminder_sent))
        .route("/v1/reminders/:id/mark-read", post(mark_reminder_read))
        .route("/v1/reminders/:id/mark-processed", post(mark_reminder_processed))
        .route("/v1/reminders/due", get(list_due_reminders))
        .with_state(state)
}

/// HTTP-facing error: a stable reason code plus a human-readable message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code,
            message: message.into(),
        }
    }
}

impl From<FundsError> for ApiError {
    fn from(err: FundsError) -> Self {
        let code = err.code();
        match err {
            FundsError::Validation { message, .. } => Self {
                status: StatusCode::BAD_REQUEST,
                code,
                message,
            },
            FundsError::State { message, .. } => Self {
                status: StatusCode::CONFLICT,
                code,
                message,
            },
            FundsError::NotFound { .. } => Self {
                status: StatusCode::NOT_FOUND,
                code,
                message: err.to_string(),
            },
            FundsError::Authorization { .. } => Self {
                status: StatusCode::FORBIDDEN,
                code,
                message: err.to_string(),
            },
            // Datastore detail stays in the logs, not on the wire.
            FundsError::Persistence(detail) | FundsError::Inconsistency(detail) => {
                warn!(detail = %detail, "internal error surfaced to client generically");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code,
                    message: "internal error".to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": { "code": self.code, "message": self.message }
        });
        (self.status, Json(body)).into_response()
    }
}

fn actor_from_headers(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| {
            ApiError::bad_request(
                "missing_actor",
                format!("the '{ACTOR_HEADER}' header is required"),
            )
        })
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    storage_backend: &'static str,
}

async fn health(State(state): State<ServiceState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "lodgeops-service",
        storage_backend: state.storage_backend,
    })
}

#[derive(Debug, Clone, Deserialize)]
struct CreateFundRequestBody {
    kind: RequestKind,
    lines: Vec<FundRequestLine>,
    currency: String,
    motive: String,
    comment: Option<String>,
}

async fn create_fund_request(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(body): Json<CreateFundRequestBody>,
) -> Result<(StatusCode, Json<FundRequest>), ApiError> {
    let requester = actor_from_headers(&headers)?;
    let request = state
        .engine
        .submit_fund_request(SubmitFundRequest {
            requester,
            kind: body.kind,
            lines: body.lines,
            currency: body.currency,
            motive: body.motive,
            comment: body.comment,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

#[derive(Debug, Clone, Deserialize)]
struct ListFundRequestsQuery {
    status: Option<RequestStatus>,
}

#[derive(Debug, Clone, Serialize)]
struct FundRequestListResponse {
    items: Vec<FundRequest>,
}

async fn list_fund_requests(
    State(state): State<ServiceState>,
    Query(query): Query<ListFundRequestsQuery>,
) -> Result<Json<FundRequestListResponse>, ApiError> {
    let items = state.engine.list_fund_requests(query.status).await?;
    Ok(Json(FundRequestListResponse { items }))
}

async fn get_fund_request(
    State(state): State<ServiceState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FundRequest>, ApiError> {
    Ok(Json(state.engine.fund_request(id).await?))
}

#[derive(Debug, Clone, Deserialize)]
struct EditLinesBody {
    lines: Vec<FundRequestLine>,
}

async fn edit_fund_request_lines(
    State(state): State<ServiceState>,
    Path(id): Path<Uuid>,
    Json(body): Json<EditLinesBody>,
) -> Result<Json<FundRequest>, ApiError> {
    Ok(Json(state.engine.edit_fund_request(id, body.lines).await?))
}

async fn delete_fund_request(
    State(state): State<ServiceState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.engine.delete_fund_request(id).await?;
    Ok(Json(serde_json::json!({})))
}

#[derive(Debug, Clone, Deserialize)]
struct DecideBody {
    decision: Decision,
    comment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct DecisionResponse {
    request: FundRequest,
    expense: Option<Expense>,
}

async fn decide_fund_request(
    State(state): State<ServiceState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<DecideBody>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let decider = actor_from_headers(&headers)?;
    let outcome = state
        .engine
        .decide_fund_request(id, body.decision, &decider, body.comment)
        .await?;
    Ok(Json(DecisionResponse {
        request: outcome.request,
        expense: outcome.expense,
    }))
}

async fn get_expense(
    State(state): State<ServiceState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Expense>, ApiError> {
    Ok(Json(state.engine.expense(id).await?))
}

#[derive(Debug, Clone, Deserialize)]
struct RecordPaymentBody {
    amount_minor: u64,
    mode: PaymentMode,
    reference: Option<String>,
    request_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct PaymentResponse {
    payment: PartialPayment,
    paid_minor: u64,
    remaining_minor: u64,
    payment_status: PaymentStatus,
    replayed: bool,
    warning: Option<String>,
}

async fn record_partial_payment(
    State(state): State<ServiceState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<RecordPaymentBody>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    let actor = actor_from_headers(&headers)?;
    let recorded = state
        .engine
        .record_payment(
            id,
            PaymentDraft {
                amount_minor: body.amount_minor,
                mode: body.mode,
                reference: body.reference,
                recorded_by: actor,
                request_key: body.request_key,
            },
        )
        .await?;

    let status = if recorded.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((
        status,
        Json(PaymentResponse {
            paid_minor: recorded.expense.paid_minor,
            remaining_minor: recorded.expense.remaining_minor(),
            payment_status: recorded.expense.payment_status,
            payment: recorded.payment,
            replayed: recorded.replayed,
            warning: recorded.warning,
        }),
    ))
}

#[derive(Debug, Clone, Serialize)]
struct ReversalResponse {
    payment: PartialPayment,
    expense: Expense,
}

async fn reverse_partial_payment(
    State(state): State<ServiceState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<ReversalResponse>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let outcome = state.engine.reverse_payment(id, &actor).await?;
    Ok(Json(ReversalResponse {
        payment: outcome.payment,
        expense: outcome.expense,
    }))
}

#[derive(Debug, Clone, Deserialize)]
struct ScheduleReminderBody {
    due_at: DateTime<Utc>,
    kind: String,
    message: String,
}

async fn schedule_reminder(
    State(state): State<ServiceState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ScheduleReminderBody>,
) -> Result<(StatusCode, Json<PaymentReminder>), ApiError> {
    let reminder = state
        .engine
        .schedule_reminder(id, body.due_at, body.kind, body.message)
        .await?;
    Ok((StatusCode::CREATED, Json(reminder)))
}

async fn mark_reminder_sent(
    State(state): State<ServiceState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentReminder>, ApiError> {
    Ok(Json(
        state
            .engine
            .transition_reminder(id, ReminderStatus::Sent)
            .await?,
    ))
}

async fn mark_reminder_read(
    State(state): State<ServiceState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentReminder>, ApiError> {
    Ok(Json(
        state
            .engine
            .transition_reminder(id, ReminderStatus::Read)
            .await?,
    ))
}

async fn mark_reminder_processed(
    State(state): State<ServiceState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentReminder>, ApiError> {
    Ok(Json(
        state
            .engine
            .transition_reminder(id, ReminderStatus::Processed)
            .await?,
    ))
}

#[derive(Debug, Clone, Deserialize)]
struct DueRemindersQuery {
    as_of: Option<DateTime<Utc>>,
    limit: Option<usize>,
    cursor_due_at: Option<DateTime<Utc>>,
    cursor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
struct DueRemindersResponse {
    items: Vec<PaymentReminder>,
    next_cursor: Option<DueCursor>,
}

async fn list_due_reminders(
    State(state): State<ServiceState>,
    Query(query): Query<DueRemindersQuery>,
) -> Result<Json<DueRemindersResponse>, ApiError> {
    let cursor = match (query.cursor_due_at, query.cursor_id) {
        (Some(due_at), Some(id)) => Some(DueCursor { due_at, id }),
        (None, None) => None,
        _ => {
            return Err(ApiError::bad_request(
                "incomplete_cursor",
                "cursor_due_at and cursor_id must be supplied together",
            ))
        }
    };

    let page = state
        .engine
        .due_reminders(
            query.as_of.unwrap_or_else(Utc::now),
            cursor,
            query.limit.unwrap_or(100).min(1000),
        )
        .await?;
    Ok(Json(DueRemindersResponse {
        items: page.items,
        next_cursor: page.next_cursor,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::Duration;
    use tower::ServiceExt;

    async fn app() -> Router {
        let state = ServiceState::bootstrap(ServiceConfig::default()).await.unwrap();
        build_router(state)
    }

    async fn app_with_directory() -> Router {
        let state = ServiceState::bootstrap(ServiceConfig {
            storage: StorageConfig::Memory,
            supervisors: vec!["gm".to_string()],
            operators: vec!["accountant".to_string()],
        })
        .await
        .unwrap();
        build_router(state)
    }

    fn post_json(uri: &str, actor: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header(ACTOR_HEADER, actor)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn put_json(uri: &str, actor: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri(uri)
            .header("content-type", "application/json")
            .header(ACTOR_HEADER, actor)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn purchase_order_body() -> serde_json::Value {
        serde_json::json!({
            "kind": "purchase_order",
            "lines": [
                {"type": "article", "article_ref": "A", "quantity": 2, "unit_price_minor": 50, "currency": "USD"},
                {"type": "article", "article_ref": "B", "quantity": 1, "unit_price_minor": 100, "currency": "USD"}
            ],
            "currency": "USD",
            "motive": "supplies",
            "comment": null
        })
    }

    /// Create and approve a request; returns the expense id.
    async fn approved_expense(app: &Router) -> Uuid {
        let response = app
            .clone()
            .oneshot(post_json("/v1/fund-requests", "requester", purchase_order_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let request = json_body(response).await;
        let request_id = request["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(put_json(
                &format!("/v1/fund-requests/{request_id}/status"),
                "gm",
                serde_json::json!({"decision": "approved", "comment": null}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let decision = json_body(response).await;
        decision["expense"]["id"].as_str().unwrap().parse().unwrap()
    }

    #[tokio::test]
    async fn health_reports_storage_backend() {
        let response = app()
            .await
            .oneshot(Request::builder().uri("/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["storage_backend"], "memory");
    }

    #[tokio::test]
    async fn create_requires_actor_header() {
        let request = Request::builder()
            .method("POST")
            .uri("/v1/fund-requests")
            .header("content-type", "application/json")
            .body(Body::from(purchase_order_body().to_string()))
            .unwrap();
        let response = app().await.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "missing_actor");
    }

    #[tokio::test]
    async fn submit_computes_total_server_side() {
        let response = app()
            .await
            .oneshot(post_json("/v1/fund-requests", "requester", purchase_order_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["total_minor"], 200);
        assert_eq!(body["status"], "pending");
    }

    #[tokio::test]
    async fn mixed_currency_lines_are_rejected() {
        let mut body = purchase_order_body();
        body["lines"][1]["currency"] = serde_json::json!("EUR");
        let response = app()
            .await
            .oneshot(post_json("/v1/fund-requests", "requester", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "currency_mismatch");
    }

    #[tokio::test]
    async fn payment_flow_settles_expense_over_http() {
        let app = app().await;
        let expense_id = approved_expense(&app).await;

        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/v1/expenses/{expense_id}/partial-payments"),
                "accountant",
                serde_json::json!({"amount_minor": 120, "mode": "bank_transfer", "reference": null, "request_key": null}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["paid_minor"], 120);
        assert_eq!(body["remaining_minor"], 80);
        assert_eq!(body["payment_status"], "partial");

        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/v1/expenses/{expense_id}/partial-payments"),
                "accountant",
                serde_json::json!({"amount_minor": 80, "mode": "cash", "reference": "till-7", "request_key": null}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["remaining_minor"], 0);
        assert_eq!(body["payment_status"], "paid");

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/expenses/{expense_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["status"], "settled");
    }

    #[tokio::test]
    async fn overpayment_maps_to_conflict() {
        let app = app().await;
        let expense_id = approved_expense(&app).await;

        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/v1/expenses/{expense_id}/partial-payments"),
                "accountant",
                serde_json::json!({"amount_minor": 600, "mode": "bank_transfer", "reference": null, "request_key": null}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(post_json(
                &format!("/v1/expenses/{expense_id}/partial-payments"),
                "accountant",
                serde_json::json!({"amount_minor": 500, "mode": "bank_transfer", "reference": null, "request_key": null}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "overpayment");
    }

    #[tokio::test]
    async fn double_decide_maps_to_conflict() {
        let app = app().await;
        let response = app
            .clone()
            .oneshot(post_json("/v1/fund-requests", "requester", purchase_order_body()))
            .await
            .unwrap();
        let request_id = json_body(response).await["id"].as_str().unwrap().to_string();

        let decide = |decision: &str| {
            put_json(
                &format!("/v1/fund-requests/{request_id}/status"),
                "gm",
                serde_json::json!({"decision": decision, "comment": null}),
            )
        };

        let response = app.clone().oneshot(decide("rejected")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(decide("approved")).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "request_already_decided");
    }

    #[tokio::test]
    async fn capability_checks_are_enforced_over_http() {
        let app = app_with_directory().await;

        // Not a supervisor.
        let response = app
            .clone()
            .oneshot(post_json("/v1/fund-requests", "requester", purchase_order_body()))
            .await
            .unwrap();
        let request_id = json_body(response).await["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(put_json(
                &format!("/v1/fund-requests/{request_id}/status"),
                "accountant",
                serde_json::json!({"decision": "approved", "comment": null}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        // A proper supervisor approves; a non-operator cannot pay.
        let response = app
            .clone()
            .oneshot(put_json(
                &format!("/v1/fund-requests/{request_id}/status"),
                "gm",
                serde_json::json!({"decision": "approved", "comment": null}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let expense_id = json_body(response).await["expense"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .oneshot(post_json(
                &format!("/v1/expenses/{expense_id}/partial-payments"),
                "gm",
                serde_json::json!({"amount_minor": 50, "mode": "cash", "reference": null, "request_key": null}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn reminder_lifecycle_over_http() {
        let app = app().await;
        let expense_id = approved_expense(&app).await;

        let past = (Utc::now() - Duration::days(1)).to_rfc3339();
        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/v1/expenses/{expense_id}/reminders"),
                "clerk",
                serde_json::json!({"due_at": past, "kind": "invoice", "message": "overdue"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let future = (Utc::now() + Duration::days(1)).to_rfc3339();
        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/v1/expenses/{expense_id}/reminders"),
                "clerk",
                serde_json::json!({"due_at": future, "kind": "invoice", "message": "due soon"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let reminder_id = json_body(response).await["id"].as_str().unwrap().to_string();

        // Skipping straight to processed is rejected.
        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/v1/reminders/{reminder_id}/mark-processed"),
                "clerk",
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        for step in ["mark-sent", "mark-read", "mark-processed"] {
            let response = app
                .clone()
                .oneshot(post_json(
                    &format!("/v1/reminders/{reminder_id}/{step}"),
                    "clerk",
                    serde_json::json!({}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn due_reminders_page_over_http() {
        let app = app().await;
        let expense_id = approved_expense(&app).await;

        for hours in 1..=3 {
            let due = (Utc::now() + Duration::hours(hours)).to_rfc3339();
            let response = app
                .clone()
                .oneshot(post_json(
                    &format!("/v1/expenses/{expense_id}/reminders"),
                    "clerk",
                    serde_json::json!({"due_at": due, "kind": "invoice", "message": "due"}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        // `+00:00` offsets do not survive query-string decoding; use `Z`.
        let as_of = (Utc::now() + Duration::hours(12))
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/reminders/due?as_of={as_of}&limit=2"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["items"].as_array().unwrap().len(), 2);
        let cursor = &body["next_cursor"];
        assert!(!cursor.is_null());

        let uri = format!(
            "/v1/reminders/due?as_of={as_of}&limit=2&cursor_due_at={}&cursor_id={}",
            cursor["due_at"].as_str().unwrap(),
            cursor["id"].as_str().unwrap()
        );
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
        assert!(body["next_cursor"].is_null());
    }

    #[tokio::test]
    async fn due_query_with_zero_limit_still_returns_items() {
        let app = app().await;
        let expense_id = approved_expense(&app).await;

        let due = (Utc::now() + Duration::hours(1)).to_rfc3339();
        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/v1/expenses/{expense_id}/reminders"),
                "clerk",
                serde_json::json!({"due_at": due, "kind": "invoice", "message": "due"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let as_of = (Utc::now() + Duration::hours(2))
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/reminders/due?as_of={as_of}&limit=0"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_ids_map_to_not_found() {
        let app = app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/expenses/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn reversal_restores_balance_over_http() {
        let app = app().await;
        let expense_id = approved_expense(&app).await;

        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/v1/expenses/{expense_id}/partial-payments"),
                "accountant",
                serde_json::json!({"amount_minor": 200, "mode": "bank_transfer", "reference": null, "request_key": null}),
            ))
            .await
            .unwrap();
        let payment_id = json_body(response).await["payment"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/v1/partial-payments/{payment_id}"))
                    .header(ACTOR_HEADER, "accountant")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["expense"]["paid_minor"], 0);
        assert_eq!(body["expense"]["payment_status"], "pending");
    }
}
