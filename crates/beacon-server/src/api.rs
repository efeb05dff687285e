use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{Query, State},
    http::{HeaderMap, Method},
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use beacon_shared::payment::PaymentPayload;
use beacon_shared::types::{EmergencyInfo, Location, Message, WalletAddress};
use beacon_shared::wallet::{verify_auth, AuthPayload};
use beacon_shared::{protocol::ChangeEvent, ValidationError};
use beacon_store::Database;

use crate::auth::{NonceStore, SessionStore};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::payments::PaymentLedger;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::realtime::ChangeHub;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub nonces: NonceStore,
    pub sessions: SessionStore,
    pub payments: PaymentLedger,
    pub hub: ChangeHub,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig, db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            nonces: NonceStore::new(config.nonce_ttl),
            sessions: SessionStore::new(config.session_ttl),
            payments: PaymentLedger::new(),
            hub: ChangeHub::new(),
            rate_limiter: RateLimiter::new(config.rate_limit_per_sec, config.rate_limit_burst),
            config: Arc::new(config),
        }
    }

    fn lock_db(&self) -> Result<MutexGuard<'_, Database>, ServerError> {
        self.db
            .lock()
            .map_err(|e| ServerError::Internal(format!("Database lock poisoned: {e}")))
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/api/nonce", get(issue_nonce))
        .route("/api/complete-siwe", post(complete_siwe))
        .route("/api/locations", get(list_locations))
        .route("/api/locations", post(add_location))
        .route("/api/locations", delete(clear_locations))
        .route("/api/messages", get(list_messages))
        .route("/api/messages", post(send_message))
        .route("/api/initiate-payment", post(initiate_payment))
        .route("/api/confirm-payment", post(confirm_payment))
        .route("/ws", get(crate::realtime::ws_handler))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
}

#[derive(Serialize)]
struct NonceResponse {
    nonce: String,
}

#[derive(Deserialize)]
struct CompleteSiweRequest {
    payload: AuthPayload,
    nonce: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteSiweResponse {
    is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<WalletAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_token: Option<String>,
}

#[derive(Deserialize)]
struct AddLocationRequest {
    lat: f64,
    lng: f64,
    emergency_info: Option<EmergencyInfo>,
}

#[derive(Serialize)]
struct ClearLocationsResponse {
    deleted: usize,
}

#[derive(Deserialize)]
struct MessagesQuery {
    scope: Option<String>,
    peer: Option<String>,
}

#[derive(Deserialize)]
struct SendMessageRequest {
    content: String,
    receiver_address: Option<WalletAddress>,
    is_global: bool,
}

#[derive(Serialize)]
struct InitiatePaymentResponse {
    id: Uuid,
}

#[derive(Deserialize)]
struct ConfirmPaymentRequest {
    payload: PaymentPayload,
}

#[derive(Serialize)]
struct ConfirmPaymentResponse {
    success: bool,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Resolve the bearer token on a request to its authenticated address.
async fn require_session(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<WalletAddress, ServerError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);

    if token.is_empty() {
        return Err(ServerError::NotAuthenticated);
    }

    state
        .sessions
        .resolve(token)
        .await
        .ok_or(ServerError::NotAuthenticated)
}

async fn issue_nonce(State(state): State<AppState>) -> Json<NonceResponse> {
    let nonce = state.nonces.issue().await;
    Json(NonceResponse { nonce })
}

/// Verify a signed sign-in payload against a previously issued nonce. Any
/// failure yields `isValid: false` with no session created -- the caller
/// simply stays unauthenticated.
async fn complete_siwe(
    State(state): State<AppState>,
    Json(req): Json<CompleteSiweRequest>,
) -> Json<CompleteSiweResponse> {
    let rejected = Json(CompleteSiweResponse {
        is_valid: false,
        address: None,
        session_token: None,
    });

    if !state.nonces.consume(&req.nonce).await {
        info!("Sign-in rejected: unknown or expired nonce");
        return rejected;
    }

    let address = match verify_auth(&req.payload, &req.nonce) {
        Ok(address) => address,
        Err(e) => {
            info!(error = %e, "Sign-in rejected: signature verification failed");
            return rejected;
        }
    };

    let token = state.sessions.issue(address.clone()).await;
    info!(address = %address.short(), "Wallet signed in");

    Json(CompleteSiweResponse {
        is_valid: true,
        address: Some(address),
        session_token: Some(token),
    })
}

async fn list_locations(
    State(state): State<AppState>,
) -> Result<Json<Vec<Location>>, ServerError> {
    let locations = state.lock_db()?.list_locations()?;
    Ok(Json(locations))
}

async fn add_location(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<AddLocationRequest>,
) -> Result<Json<Location>, ServerError> {
    let address = require_session(&headers, &state).await?;

    // The owner is always the authenticated identity, never client-supplied.
    let location = Location {
        wallet_address: address,
        lat: req.lat,
        lng: req.lng,
        emergency_info: req.emergency_info,
    };
    location.validate()?;

    state.lock_db()?.insert_location(&location)?;
    state.hub.publish(ChangeEvent::LocationInserted(location.clone()));

    info!(
        owner = %location.wallet_address.short(),
        lat = location.lat,
        lng = location.lng,
        "Location reported"
    );
    Ok(Json(location))
}

async fn clear_locations(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<ClearLocationsResponse>, ServerError> {
    let address = require_session(&headers, &state).await?;

    let deleted = state.lock_db()?.delete_locations_for(&address)?;
    info!(owner = %address.short(), deleted, "Locations cleared");
    Ok(Json(ClearLocationsResponse { deleted }))
}

async fn list_messages(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Vec<Message>>, ServerError> {
    if let Some(ref peer) = query.peer {
        // Direct history needs an authenticated viewer to pin the pair.
        let me = require_session(&headers, &state).await?;
        let peer = WalletAddress::parse(peer)?;
        let messages = state.lock_db()?.list_direct_messages(&me, &peer)?;
        return Ok(Json(messages));
    }

    match query.scope.as_deref() {
        None | Some("global") => {
            let messages = state.lock_db()?.list_global_messages()?;
            Ok(Json(messages))
        }
        Some(other) => Err(ServerError::BadRequest(format!(
            "Unknown message scope: {other}"
        ))),
    }
}

async fn send_message(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<Message>, ServerError> {
    let sender = require_session(&headers, &state).await?;

    let content = req.content.trim();
    if content.is_empty() {
        return Err(ServerError::Validation(ValidationError::BlankContent));
    }
    match (req.is_global, &req.receiver_address) {
        (true, Some(_)) => {
            return Err(ServerError::Validation(ValidationError::GlobalWithReceiver))
        }
        (false, None) => {
            return Err(ServerError::Validation(
                ValidationError::DirectWithoutReceiver,
            ))
        }
        _ => {}
    }

    let message = state.lock_db()?.insert_message(
        content,
        &sender,
        req.receiver_address.as_ref(),
        req.is_global,
    )?;
    state.hub.publish(ChangeEvent::MessageInserted(message.clone()));

    Ok(Json(message))
}

async fn initiate_payment(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<InitiatePaymentResponse>, ServerError> {
    let address = require_session(&headers, &state).await?;
    let id = state.payments.initiate(address).await;
    Ok(Json(InitiatePaymentResponse { id }))
}

async fn confirm_payment(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<ConfirmPaymentRequest>,
) -> Result<Json<ConfirmPaymentResponse>, ServerError> {
    require_session(&headers, &state).await?;
    let success = state.payments.confirm(&req.payload).await;
    Ok(Json(ConfirmPaymentResponse { success }))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
