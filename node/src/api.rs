// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # REST + WebSocket API
//!
//! The axum router in front of the quorum ledger. Handlers are thin: parse,
//! call one [`QuorumLedger`] operation with the caller's session, map the
//! result.
//!
//! ## Endpoints
//!
//! | Method | Path                                | Description                        |
//! |--------|-------------------------------------|------------------------------------|
//! | GET    | `/health`                           | Liveness check                     |
//! | GET    | `/ws`                               | Live ledger events                 |
//! | POST   | `/api/auth/session`                 | Issue a session (development)      |
//! | DELETE | `/api/auth/session`                 | Invalidate the caller's session    |
//! | GET    | `/api/principals`                   | Registered principals              |
//! | POST   | `/api/principals`                   | Register a principal (admin)       |
//! | POST   | `/api/transactions/create`          | Propose a transfer                 |
//! | GET    | `/api/transactions/pending/list`    | Pending transactions               |
//! | GET    | `/api/transactions/approved/list`   | Approved transactions              |
//! | GET    | `/api/transactions/approvals/list`  | Pending, not yet signed by caller  |
//! | GET    | `/api/transactions/:id`             | One transaction                    |
//! | GET    | `/api/transactions/:id/digest`      | Digest to sign                     |
//! | POST   | `/api/transactions/approve/:id`     | Submit a signature                 |
//! | POST   | `/api/transactions/execute/:id`     | Settle an approved transaction     |
//! | POST   | `/api/transactions/reject/:id`      | Reject with a reason               |
//! | GET    | `/api/audit/logs`                   | Recent audit entries (admin)       |
//! | GET    | `/api/dashboard/stats`              | Counts per status                  |
//!
//! Everything under `/api` except session issuance takes
//! `Authorization: Bearer <token>`. Errors are `{ "error", "retryable" }`.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        FromRequestParts, Path, Query, State,
    },
    http::{header::AUTHORIZATION, request::Parts, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use quorum_protocol::audit::{AuditAction, AuditEntry, AuditEvent, AuditOutcome, AuditSink};
use quorum_protocol::crypto::SignerPublicKey;
use quorum_protocol::identity::{Principal, Role, Session, SessionRegistry};
use quorum_protocol::transaction::{Amount, Currency, NewTransaction, TransactionView};
use quorum_protocol::{
    ExecutionResult, LedgerError, LedgerStats, MemoryAuditLog, QuorumLedger, SignatureReceipt,
};

/// Default and maximum page size for `/api/audit/logs`.
const AUDIT_PAGE_DEFAULT: usize = 100;
const AUDIT_PAGE_MAX: usize = 1000;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared by all handlers. Everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub version: String,
    pub ledger: Arc<QuorumLedger>,
    pub sessions: Arc<SessionRegistry>,
    /// The same log the ledger appends to; read here for the viewer.
    pub audit: Arc<MemoryAuditLog>,
}

impl AppState {
    fn audit(&self, event: AuditEvent) {
        if let Err(e) = self.audit.append(event) {
            tracing::warn!(error = %e, "audit sink rejected event");
        }
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/api/auth/session", post(create_session).delete(end_session))
        .route("/api/principals", get(list_principals).post(register_principal))
        .route("/api/transactions/create", post(create_transaction))
        .route("/api/transactions/pending/list", get(list_pending))
        .route("/api/transactions/approved/list", get(list_approved))
        .route("/api/transactions/approvals/list", get(list_awaiting))
        .route("/api/transactions/approve/:id", post(approve_transaction))
        .route("/api/transactions/execute/:id", post(execute_transaction))
        .route("/api/transactions/reject/:id", post(reject_transaction))
        .route("/api/transactions/:id", get(get_transaction))
        .route("/api/transactions/:id/digest", get(get_digest))
        .route("/api/audit/logs", get(audit_logs))
        .route("/api/dashboard/stats", get(dashboard_stats))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error body returned by every `/api` endpoint on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub retryable: bool,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    retryable: bool,
}

impl ApiError {
    fn unauthenticated(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
            retryable: false,
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            retryable: false,
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let status = match &err {
            LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
            LedgerError::Unauthorized(_) => StatusCode::FORBIDDEN,
            LedgerError::InvalidSignature { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::InvalidState { .. } => StatusCode::CONFLICT,
            LedgerError::SettlementFailure { retryable: true, .. } => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::SettlementFailure { .. } => StatusCode::BAD_GATEWAY,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            LedgerError::Contention { .. } => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "request failed");
            "internal storage error".to_string()
        } else {
            err.to_string()
        };
        Self {
            status,
            message,
            retryable: err.is_retryable(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            retryable: self.retryable,
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ---------------------------------------------------------------------------
// Caller extraction
// ---------------------------------------------------------------------------

/// The session behind the request's bearer token.
pub struct Caller(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or_else(|| ApiError::unauthenticated("missing bearer token"))?;

        state
            .sessions
            .resolve(token)
            .map(Caller)
            .map_err(|e| ApiError::unauthenticated(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub principal_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub token: String,
    pub principal_id: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterPrincipalRequest {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    pub role: String,
    /// Hex Ed25519 public key.
    pub public_key: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    /// Smallest currency unit.
    pub amount: u64,
    pub currency: String,
    pub recipient: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    /// Hex signature over the transaction digest.
    pub signature: String,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DigestResponse {
    pub id: String,
    pub digest: String,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
    /// Only entries about this transaction or principal.
    pub target: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`. Liveness only.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "version": state.version })),
    )
}

/// `POST /api/auth/session`. Development stand-in for the login flow:
/// anyone may open a session for any registered principal.
async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    let principal = match state.ledger.principal(&req.principal_id).await {
        Ok(p) => p,
        Err(_) => {
            state.audit(AuditEvent::new(
                &req.principal_id,
                AuditAction::IssueSession,
                &req.principal_id,
                AuditOutcome::Denied,
            ));
            return Err(ApiError::unauthenticated("unknown principal"));
        }
    };

    let session = state.sessions.issue(&principal.id);
    tracing::info!(principal = %principal.id, "session issued");
    state.audit(AuditEvent::new(
        &principal.id,
        AuditAction::IssueSession,
        &principal.id,
        AuditOutcome::Success,
    ));

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token: session.token,
            principal_id: principal.id,
            role: principal.role,
            expires_at: session.expires_at,
        }),
    ))
}

/// `DELETE /api/auth/session`. Logout.
async fn end_session(State(state): State<AppState>, Caller(session): Caller) -> StatusCode {
    state.sessions.invalidate(&session.token);
    state.audit(AuditEvent::new(
        &session.principal_id,
        AuditAction::InvalidateSession,
        &session.principal_id,
        AuditOutcome::Success,
    ));
    StatusCode::NO_CONTENT
}

async fn list_principals(
    State(state): State<AppState>,
    Caller(_): Caller,
) -> Json<Vec<Principal>> {
    Json(state.ledger.principals().await)
}

async fn register_principal(
    State(state): State<AppState>,
    Caller(session): Caller,
    Json(req): Json<RegisterPrincipalRequest>,
) -> ApiResult<(StatusCode, Json<Principal>)> {
    let role: Role = req
        .role
        .parse()
        .map_err(|e: String| ApiError::bad_request(e))?;
    let public_key = SignerPublicKey::from_hex(&req.public_key)
        .map_err(|e| ApiError::bad_request(format!("public_key: {e}")))?;
    let username = req.username.unwrap_or_else(|| req.id.clone());

    let principal = state
        .ledger
        .register_principal(&session, Principal::new(req.id, username, role, public_key))
        .await?;
    Ok((StatusCode::CREATED, Json(principal)))
}

async fn create_transaction(
    State(state): State<AppState>,
    Caller(session): Caller,
    Json(req): Json<CreateTransactionRequest>,
) -> ApiResult<(StatusCode, Json<TransactionView>)> {
    let request = NewTransaction::new(
        Amount::new(req.amount, Currency::from_code(&req.currency)),
        req.recipient,
        req.description,
    );
    let view = state.ledger.create_transaction(&session, request).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_pending(
    State(state): State<AppState>,
    Caller(_): Caller,
) -> ApiResult<Json<Vec<TransactionView>>> {
    Ok(Json(state.ledger.list_pending()?))
}

async fn list_approved(
    State(state): State<AppState>,
    Caller(_): Caller,
) -> ApiResult<Json<Vec<TransactionView>>> {
    Ok(Json(state.ledger.list_approved()?))
}

/// `GET /api/transactions/approvals/list`. What the caller still has to sign.
async fn list_awaiting(
    State(state): State<AppState>,
    Caller(session): Caller,
) -> ApiResult<Json<Vec<TransactionView>>> {
    Ok(Json(state.ledger.list_awaiting_signature(&session).await?))
}

async fn get_transaction(
    State(state): State<AppState>,
    Caller(_): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<TransactionView>> {
    Ok(Json(state.ledger.get_transaction(&id)?))
}

async fn get_digest(
    State(state): State<AppState>,
    Caller(_): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<DigestResponse>> {
    let digest = state.ledger.transaction_digest(&id)?;
    Ok(Json(DigestResponse { id, digest }))
}

async fn approve_transaction(
    State(state): State<AppState>,
    Caller(session): Caller,
    Path(id): Path<String>,
    Json(req): Json<ApproveRequest>,
) -> ApiResult<Json<SignatureReceipt>> {
    let signature = hex::decode(req.signature.trim())
        .map_err(|_| ApiError::bad_request("signature must be hex"))?;
    Ok(Json(state.ledger.sign_transaction(&session, &id, &signature).await?))
}

async fn execute_transaction(
    State(state): State<AppState>,
    Caller(session): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<ExecutionResult>> {
    Ok(Json(state.ledger.execute_transaction(&session, &id).await?))
}

async fn reject_transaction(
    State(state): State<AppState>,
    Caller(session): Caller,
    Path(id): Path<String>,
    Json(req): Json<RejectRequest>,
) -> ApiResult<Json<TransactionView>> {
    Ok(Json(
        state
            .ledger
            .reject_transaction(&session, &id, &req.reason)
            .await?,
    ))
}

/// `GET /api/audit/logs?limit=&target=`. Newest first. Admins only.
async fn audit_logs(
    State(state): State<AppState>,
    Caller(session): Caller,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Vec<AuditEntry>>> {
    let caller = state.ledger.principal(&session.principal_id).await?;
    if caller.role != Role::Admin {
        return Err(LedgerError::Unauthorized(format!("{} may not read the audit log", caller.id)).into());
    }

    let limit = query.limit.unwrap_or(AUDIT_PAGE_DEFAULT).min(AUDIT_PAGE_MAX);
    let entries = match query.target {
        Some(target) => {
            let mut entries = state.audit.for_target(&target);
            entries.reverse();
            entries.truncate(limit);
            entries
        }
        None => state.audit.recent(limit),
    };
    Ok(Json(entries))
}

async fn dashboard_stats(
    State(state): State<AppState>,
    Caller(_): Caller,
) -> ApiResult<Json<LedgerStats>> {
    Ok(Json(state.ledger.stats()?))
}

/// `GET /ws`. Pushes every [`quorum_protocol::LedgerEvent`] as JSON.
/// Read-only; client messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.ledger.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let payload = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!(error = %e, "failed to serialize ws event");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(missed = n, "ws subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use quorum_protocol::config::LedgerConfig;
    use quorum_protocol::crypto::SignerKeypair;
    use std::collections::HashMap;
    use std::time::Duration;
    use tower::ServiceExt;

    /// Ledger with admin `root`, initiator `alice` and approvers `bob` and
    /// `carol`, 2-of-5.
    async fn test_app() -> (Router, AppState, HashMap<&'static str, SignerKeypair>) {
        let audit = Arc::new(MemoryAuditLog::new());
        let config = LedgerConfig {
            required_signatures: 2,
            ..LedgerConfig::default()
        };
        let ledger = Arc::new(
            QuorumLedger::builder(config)
                .audit(audit.clone())
                .build()
                .unwrap(),
        );

        let mut keys = HashMap::new();
        for (i, id) in ["root", "alice", "bob", "carol"].into_iter().enumerate() {
            keys.insert(id, SignerKeypair::from_seed(&[i as u8 + 1; 32]));
        }
        ledger
            .bootstrap_admin(Principal::new("root", "root", Role::Admin, keys["root"].public_key()))
            .await
            .unwrap();
        let root = Session::ephemeral("root", Duration::from_secs(60));
        for (id, role) in [("alice", Role::Initiator), ("bob", Role::Approval), ("carol", Role::Approval)] {
            ledger
                .register_principal(&root, Principal::new(id, id, role, keys[id].public_key()))
                .await
                .unwrap();
        }

        let state = AppState {
            version: "0.1.0-test".into(),
            ledger,
            sessions: Arc::new(SessionRegistry::default()),
            audit,
        };
        (create_router(state.clone()), state, keys)
    }

    /// Sends a request and returns (status, JSON body or `Null`).
    async fn send(
        router: &Router,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut req = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {token}"));
        }
        let req = match body {
            Some(json) => req
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn token(state: &AppState, principal: &str) -> String {
        state.sessions.issue(principal).token
    }

    async fn create(router: &Router, state: &AppState) -> String {
        let (status, body) = send(
            router,
            "POST",
            "/api/transactions/create",
            Some(&token(state, "alice")),
            Some(serde_json::json!({
                "amount": 1_500_000,
                "currency": "usd",
                "recipient": "US-ACME-001",
                "description": "equipment lease"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    async fn approve(
        router: &Router,
        state: &AppState,
        keys: &HashMap<&'static str, SignerKeypair>,
        who: &'static str,
        tx_id: &str,
    ) -> (StatusCode, serde_json::Value) {
        let t = token(state, who);
        let (_, digest) = send(router, "GET", &format!("/api/transactions/{tx_id}/digest"), Some(&t), None).await;
        let digest = hex::decode(digest["digest"].as_str().unwrap()).unwrap();
        let signature = hex::encode(keys[who].sign(&digest));
        send(
            router,
            "POST",
            &format!("/api/transactions/approve/{tx_id}"),
            Some(&t),
            Some(serde_json::json!({ "signature": signature })),
        )
        .await
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let (router, _, _) = test_app().await;
        let (status, body) = send(&router, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn api_requires_a_bearer_token() {
        let (router, _, _) = test_app().await;
        let (status, body) = send(&router, "GET", "/api/transactions/pending/list", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["retryable"], false);

        let (status, _) =
            send(&router, "GET", "/api/dashboard/stats", Some("not-a-token"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn session_login_and_logout() {
        let (router, _, _) = test_app().await;

        let (status, _) = send(
            &router,
            "POST",
            "/api/auth/session",
            None,
            Some(serde_json::json!({ "principal_id": "mallory" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(
            &router,
            "POST",
            "/api/auth/session",
            None,
            Some(serde_json::json!({ "principal_id": "bob" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["role"], "approval");
        let token = body["token"].as_str().unwrap().to_string();

        let (status, _) = send(&router, "GET", "/api/dashboard/stats", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&router, "DELETE", "/api/auth/session", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&router, "GET", "/api/dashboard/stats", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn quorum_flow_over_http() {
        let (router, state, keys) = test_app().await;
        let tx_id = create(&router, &state).await;

        let (status, body) = send(
            &router,
            "GET",
            "/api/transactions/approvals/list",
            Some(&token(&state, "bob")),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = approve(&router, &state, &keys, "bob", &tx_id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "accepted");
        assert_eq!(body["approved_now"], false);

        let (status, body) = approve(&router, &state, &keys, "bob", &tx_id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "already_signed");

        let (_, body) = approve(&router, &state, &keys, "carol", &tx_id).await;
        assert_eq!(body["approved_now"], true);
        assert_eq!(body["transaction"]["status"], "approved");

        let (status, body) = send(
            &router,
            "POST",
            &format!("/api/transactions/execute/{tx_id}"),
            Some(&token(&state, "root")),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transaction"]["status"], "executed");
        assert!(body["receipt"]["reference"].is_string());

        let (_, stats) = send(&router, "GET", "/api/dashboard/stats", Some(&token(&state, "bob")), None).await;
        assert_eq!(stats["executed"], 1);
        assert_eq!(stats["pending"], 0);
    }

    #[tokio::test]
    async fn executing_pending_is_a_conflict() {
        let (router, state, _) = test_app().await;
        let tx_id = create(&router, &state).await;
        let (status, body) = send(
            &router,
            "POST",
            &format!("/api/transactions/execute/{tx_id}"),
            Some(&token(&state, "root")),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["retryable"], false);
        assert!(body["error"].as_str().unwrap().contains("pending"));
    }

    #[tokio::test]
    async fn bad_signatures_are_rejected() {
        let (router, state, keys) = test_app().await;
        let tx_id = create(&router, &state).await;
        let bob = token(&state, "bob");

        let (status, _) = send(
            &router,
            "POST",
            &format!("/api/transactions/approve/{tx_id}"),
            Some(&bob),
            Some(serde_json::json!({ "signature": "zz-not-hex" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let wrong = hex::encode(keys["bob"].sign(b"some other payload"));
        let (status, _) = send(
            &router,
            "POST",
            &format!("/api/transactions/approve/{tx_id}"),
            Some(&bob),
            Some(serde_json::json!({ "signature": wrong })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn unknown_transaction_is_404() {
        let (router, state, _) = test_app().await;
        let (status, body) = send(
            &router,
            "GET",
            "/api/transactions/does-not-exist",
            Some(&token(&state, "bob")),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }

    #[test]
    fn declined_settlement_is_a_bad_gateway() {
        let declined = ApiError::from(LedgerError::SettlementFailure {
            tx_id: "tx-1".into(),
            reason: "settlement declined: insufficient funds".into(),
            retryable: false,
        });
        assert_eq!(declined.status, StatusCode::BAD_GATEWAY);
        assert!(!declined.retryable);

        let unavailable = ApiError::from(LedgerError::SettlementFailure {
            tx_id: "tx-1".into(),
            reason: "settlement timed out after 30000ms".into(),
            retryable: true,
        });
        assert_eq!(unavailable.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(unavailable.retryable);
    }

    #[tokio::test]
    async fn reject_over_http() {
        let (router, state, _) = test_app().await;
        let tx_id = create(&router, &state).await;
        let (status, body) = send(
            &router,
            "POST",
            &format!("/api/transactions/reject/{tx_id}"),
            Some(&token(&state, "root")),
            Some(serde_json::json!({ "reason": "vendor not onboarded" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "rejected");
        assert_eq!(body["rejection_reason"], "vendor not onboarded");

        let (_, pending) = send(
            &router,
            "GET",
            "/api/transactions/pending/list",
            Some(&token(&state, "root")),
            None,
        )
        .await;
        assert!(pending.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn audit_log_is_admin_only() {
        let (router, state, _) = test_app().await;
        let tx_id = create(&router, &state).await;

        let (status, _) = send(&router, "GET", "/api/audit/logs", Some(&token(&state, "bob")), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &router,
            "GET",
            &format!("/api/audit/logs?target={tx_id}"),
            Some(&token(&state, "root")),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["action"], "create_transaction");
        assert_eq!(entries[0]["actor"], "alice");
    }

    #[tokio::test]
    async fn principal_registration() {
        let (router, state, _) = test_app().await;
        let root = token(&state, "root");
        let dave = SignerKeypair::generate().public_key().to_hex();

        let (status, _) = send(
            &router,
            "POST",
            "/api/principals",
            Some(&root),
            Some(serde_json::json!({ "id": "dave", "role": "auditor", "public_key": dave })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &router,
            "POST",
            "/api/principals",
            Some(&root),
            Some(serde_json::json!({ "id": "dave", "role": "approver", "public_key": dave })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["role"], "approval");

        let (status, _) = send(
            &router,
            "POST",
            "/api/principals",
            Some(&token(&state, "alice")),
            Some(serde_json::json!({ "id": "erin", "role": "admin", "public_key": dave })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
