use std::sync::Arc;
use tokio::sync::Mutex;

use axum::{
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use opguard_core::error::LeaseError;
use opguard_core::executor::RedemptionPayload;
use opguard_core::manager::{now_ms, LeaseManager};
use opguard_core::types::{Operation, ResourceRecord, ResourceRef, ResourceType};

use crate::handlers::*;

pub type AppState = Arc<Mutex<LeaseManager>>;

pub async fn run(host: &str, port: u16, storage: &str, ttl_ms: u64, sweep_secs: u64) {
    let manager = create_manager(storage).with_ttl(ttl_ms);
    let state: AppState = Arc::new(Mutex::new(manager));

    // NOTE: Rate limiting should be handled at the infrastructure level
    // (nginx, envoy, cloud load balancer) for production deployments.

    let app = Router::new()
        // Health is always open (no auth)
        .route("/health", get(health))
        // Protected routes
        .route("/resources", put(put_resource))
        .route("/resources/{rtype}/{id}", get(get_resource))
        .route("/resources/{rtype}/{id}/ledger", get(get_ledger))
        .route("/leases", post(request_lease))
        .route("/leases", get(list_leases))
        .route("/leases/active/{rtype}/{id}", get(get_active_lease))
        .route("/leases/{token}/release", post(release_lease))
        .route("/leases/{token}/cancel", post(cancel_lease))
        .route("/leases/{token}/redeem", post(redeem_lease))
        .route("/sweep", post(sweep))
        .layer(middleware::from_fn(auth_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    spawn_sweeper(state, sweep_secs);

    let addr = format!("{}:{}", host, port);

    if std::env::var("OPGUARD_API_KEY").is_ok() {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!("No OPGUARD_API_KEY set — server is open (dev mode)");
    }

    tracing::info!("opguard lease server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app).await.expect("Server error");
}

/// Periodic reclaimer: flips overdue leases to Expired even when nothing
/// touches them again. Lazy expiry in the read paths covers the rest.
fn spawn_sweeper(state: AppState, sweep_secs: u64) {
    if sweep_secs == 0 {
        tracing::info!("Periodic sweep disabled; relying on lazy expiry only");
        return;
    }
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(sweep_secs));
        loop {
            ticker.tick().await;
            let reclaimed = state.lock().await.sweep_expired(now_ms());
            if reclaimed > 0 {
                tracing::info!(reclaimed = reclaimed, "Expired leases reclaimed");
            }
        }
    });
}

// ─── Auth Middleware ────────────────────────────────────────────────────────

async fn auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // If no API key is configured, allow all requests (dev mode)
    let expected_key = match std::env::var("OPGUARD_API_KEY") {
        Ok(key) if !key.is_empty() => key,
        _ => return Ok(next.run(request).await),
    };

    // Always allow health check without auth
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    // Check the Authorization header
    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth_header.strip_prefix("Bearer ").unwrap_or("");

    if token == expected_key {
        Ok(next.run(request).await)
    } else {
        tracing::warn!("Unauthorized request to {}", request.uri().path());
        Err(StatusCode::UNAUTHORIZED)
    }
}

// ─── Error Mapping ──────────────────────────────────────────────────────────

fn error_status(err: &LeaseError) -> StatusCode {
    match err {
        LeaseError::ResourceNotFound(_) | LeaseError::LeaseNotFound => StatusCode::NOT_FOUND,
        LeaseError::Conflict { .. } => StatusCode::CONFLICT,
        LeaseError::PreconditionFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LeaseError::Forbidden => StatusCode::FORBIDDEN,
        LeaseError::Expired => StatusCode::GONE,
        LeaseError::MismatchedOperation(_) => StatusCode::CONFLICT,
        LeaseError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &LeaseError) -> (StatusCode, Json<serde_json::Value>) {
    (
        error_status(err),
        Json(serde_json::json!({
            "success": false,
            "error": err.to_string(),
        })),
    )
}

fn bad_request(msg: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "success": false,
            "error": msg.into(),
        })),
    )
}

fn parse_reference(
    rtype: &str,
    id: &str,
) -> Result<ResourceRef, (StatusCode, Json<serde_json::Value>)> {
    validate_resource_type(rtype).map_err(bad_request)?;
    let resource_type = ResourceType::parse(rtype)
        .ok_or_else(|| bad_request(format!("Invalid resource_type '{}'", rtype)))?;
    Ok(ResourceRef::new(resource_type, id))
}

// ─── Handlers ───────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let manager = state.lock().await;
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        active_leases: manager.active_leases().len(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

async fn put_resource(
    State(state): State<AppState>,
    Json(record): Json<ResourceRecord>,
) -> (StatusCode, Json<serde_json::Value>) {
    let key = record.reference().key();
    let mut manager = state.lock().await;
    match manager.put_resource(record) {
        Ok(()) => {
            tracing::info!(resource = %key, "Resource record stored");
            (
                StatusCode::OK,
                Json(serde_json::json!({ "success": true, "data": key })),
            )
        }
        Err(e) => error_response(&e),
    }
}

async fn get_resource(
    State(state): State<AppState>,
    Path((rtype, id)): Path<(String, String)>,
) -> (StatusCode, Json<serde_json::Value>) {
    let resource = match parse_reference(&rtype, &id) {
        Ok(r) => r,
        Err(e) => return e,
    };
    let manager = state.lock().await;
    match manager.get_resource(&resource) {
        Some(record) => (
            StatusCode::OK,
            Json(serde_json::json!({ "success": true, "data": record })),
        ),
        None => error_response(&LeaseError::ResourceNotFound(resource.key())),
    }
}

async fn get_ledger(
    State(state): State<AppState>,
    Path((rtype, id)): Path<(String, String)>,
) -> (StatusCode, Json<serde_json::Value>) {
    let resource = match parse_reference(&rtype, &id) {
        Ok(r) => r,
        Err(e) => return e,
    };
    let manager = state.lock().await;
    let entries = manager.ledger(&resource);
    (
        StatusCode::OK,
        Json(serde_json::json!({ "success": true, "data": entries })),
    )
}

async fn request_lease(
    State(state): State<AppState>,
    Json(req): Json<RequestLeaseBody>,
) -> (StatusCode, Json<serde_json::Value>) {
    if let Err(e) = req.validate() {
        return bad_request(e);
    }
    let resource = match parse_reference(&req.resource_type, &req.resource_id) {
        Ok(r) => r,
        Err(e) => return e,
    };
    let Some(operation) = Operation::parse(&req.operation) else {
        return bad_request(format!("Invalid operation '{}'", req.operation));
    };

    let mut manager = state.lock().await;
    match manager.request(resource, &req.holder, operation, req.details, now_ms()) {
        Ok(lease) => {
            tracing::info!(
                holder = %req.holder,
                token = %lease.token,
                resource = %lease.resource.key(),
                operation = ?lease.operation,
                "Lease granted"
            );
            (
                StatusCode::CREATED,
                Json(serde_json::json!({
                    "success": true,
                    "data": LeaseInfo::from_lease(&lease),
                })),
            )
        }
        Err(e) => {
            tracing::info!(holder = %req.holder, error = %e, "Lease denied");
            error_response(&e)
        }
    }
}

async fn list_leases(State(state): State<AppState>) -> Json<ApiResponse<Vec<LeaseInfo>>> {
    let manager = state.lock().await;
    let leases: Vec<LeaseInfo> = manager
        .active_leases()
        .iter()
        .map(LeaseInfo::from_lease)
        .collect();
    Json(ApiResponse::ok(leases))
}

async fn get_active_lease(
    State(state): State<AppState>,
    Path((rtype, id)): Path<(String, String)>,
) -> (StatusCode, Json<serde_json::Value>) {
    let resource = match parse_reference(&rtype, &id) {
        Ok(r) => r,
        Err(e) => return e,
    };
    let mut manager = state.lock().await;
    match manager.get_active(&resource, now_ms()) {
        Ok(lease) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "data": LeaseInfo::from_lease(&lease),
            })),
        ),
        Err(e) => error_response(&e),
    }
}

async fn release_lease(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<HolderBody>,
) -> (StatusCode, Json<serde_json::Value>) {
    if let Err(e) = req.validate() {
        return bad_request(e);
    }
    let mut manager = state.lock().await;
    match manager.release(&token, &req.holder, now_ms()) {
        Ok(()) => {
            tracing::info!(token = %token, holder = %req.holder, "Lease released");
            (
                StatusCode::OK,
                Json(serde_json::json!({ "success": true, "data": "released" })),
            )
        }
        Err(e) => error_response(&e),
    }
}

async fn cancel_lease(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<HolderBody>,
) -> (StatusCode, Json<serde_json::Value>) {
    if let Err(e) = req.validate() {
        return bad_request(e);
    }
    let mut manager = state.lock().await;
    match manager.cancel(&token, &req.holder, now_ms()) {
        Ok(()) => {
            tracing::info!(token = %token, holder = %req.holder, "Lease cancelled");
            (
                StatusCode::OK,
                Json(serde_json::json!({ "success": true, "data": "cancelled" })),
            )
        }
        Err(e) => error_response(&e),
    }
}

async fn redeem_lease(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<RedeemBody>,
) -> (StatusCode, Json<serde_json::Value>) {
    if let Err(e) = req.validate() {
        return bad_request(e);
    }
    let Some(operation) = Operation::parse(&req.operation) else {
        return bad_request(format!("Invalid operation '{}'", req.operation));
    };
    let payload = RedemptionPayload {
        operation,
        quantity: req.quantity,
        lines: req.lines,
    };

    let mut manager = state.lock().await;
    match manager.redeem(&token, &req.holder, &payload, now_ms()) {
        Ok(result) => {
            tracing::info!(
                token = %token,
                holder = %req.holder,
                resource = %result.resource.key(),
                new_status = %result.new_status,
                "Lease redeemed"
            );
            (
                StatusCode::OK,
                Json(serde_json::json!({ "success": true, "data": result })),
            )
        }
        Err(e) => {
            tracing::info!(token = %token, holder = %req.holder, error = %e, "Redemption failed");
            error_response(&e)
        }
    }
}

async fn sweep(State(state): State<AppState>) -> Json<ApiResponse<SweepResponse>> {
    let mut manager = state.lock().await;
    let reclaimed = manager.sweep_expired(now_ms());
    tracing::info!(reclaimed = reclaimed, "Expired leases reclaimed");
    Json(ApiResponse::ok(SweepResponse { reclaimed }))
}

// ─── Storage Backend Selection ──────────────────────────────────────────────

fn create_manager(storage: &str) -> LeaseManager {
    if storage == "memory" {
        tracing::info!("Storage backend: in-memory (leases will not persist)");
        LeaseManager::new()
    } else if let Some(path) = storage.strip_prefix("sqlite:") {
        #[cfg(feature = "sqlite")]
        {
            tracing::info!("Storage backend: SQLite ({})", path);
            match LeaseManager::with_sqlite(path) {
                Ok(manager) => manager,
                Err(e) => {
                    tracing::error!("Failed to open SQLite: {}. Falling back to in-memory.", e);
                    LeaseManager::new()
                }
            }
        }
        #[cfg(not(feature = "sqlite"))]
        {
            tracing::error!(
                "SQLite storage requested but `sqlite` feature is not enabled. \
                 Rebuild with: cargo build --features sqlite"
            );
            tracing::warn!("Falling back to in-memory storage.");
            let _ = path;
            LeaseManager::new()
        }
    } else {
        tracing::error!(
            "Unknown storage backend: '{}'. Use 'memory' or 'sqlite:<path>'",
            storage
        );
        tracing::warn!("Falling back to in-memory storage.");
        LeaseManager::new()
    }
}
