//! Simple REST API server example for the transfer engine.
//!
//! Run with: `cargo run --example server`
//!
//! ## Endpoints
//!
//! - `POST /accounts` - Create an account
//! - `GET /accounts` - List accounts (limit/offset query)
//! - `GET /accounts/:id` - Get an account by id
//! - `POST /accounts/:id/deposits` - Seed an account balance
//! - `POST /transfers` - Execute a transfer
//! - `GET /transfers/:id` - Get a committed transfer
//!
//! ## Example Usage
//!
//! ```bash
//! # Create two accounts
//! curl -X POST http://localhost:3000/accounts \
//!   -H "Content-Type: application/json" \
//!   -d '{"owner": "alice", "currency": "USD"}'
//! curl -X POST http://localhost:3000/accounts \
//!   -H "Content-Type: application/json" \
//!   -d '{"owner": "bob", "currency": "USD"}'
//!
//! # Fund alice
//! curl -X POST http://localhost:3000/accounts/1/deposits \
//!   -H "Content-Type: application/json" \
//!   -d '{"amount": "200.00"}'
//!
//! # Transfer
//! curl -X POST http://localhost:3000/transfers \
//!   -H "Content-Type: application/json" \
//!   -d '{"from_account_id": 1, "to_account_id": 2, "amount": "50.00", "currency": "USD"}'
//! ```

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bank_ledger_rs::{
    Account, AccountId, Currency, Engine, MemoryStore, Store, Transfer, TransferError,
    TransferId, TransferReceipt, TransferRequest,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

// === Request/Response DTOs ===

/// Request body for creating an account.
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub owner: String,
    pub currency: Currency,
}

/// Request body for seeding an account balance.
#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub amount: Decimal,
}

/// Pagination query parameters.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    30
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Application State ===

/// Shared application state containing the transfer engine.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine<MemoryStore>>,
}

// === Error Handling ===

/// Wrapper for converting `TransferError` into HTTP responses.
pub struct AppError(TransferError);

impl From<TransferError> for AppError {
    fn from(err: TransferError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            TransferError::InvalidRequest => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            TransferError::AccountNotFound(_) => (StatusCode::NOT_FOUND, "ACCOUNT_NOT_FOUND"),
            TransferError::TransferNotFound(_) => (StatusCode::NOT_FOUND, "TRANSFER_NOT_FOUND"),
            TransferError::CurrencyMismatch => (StatusCode::BAD_REQUEST, "CURRENCY_MISMATCH"),
            TransferError::InsufficientFunds => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_FUNDS")
            }
            TransferError::DuplicateKey => (StatusCode::CONFLICT, "DUPLICATE_KEY"),
            TransferError::Conflict => (StatusCode::CONFLICT, "CONFLICT"),
            TransferError::StoreUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE")
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

/// POST /accounts - Create a new account.
async fn create_account(
    State(state): State<AppState>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<Account>), AppError> {
    let account = state
        .engine
        .store()
        .create_account(&request.owner, request.currency)?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// GET /accounts - List accounts.
async fn list_accounts(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Account>>, AppError> {
    let accounts = state
        .engine
        .store()
        .list_accounts(params.limit, params.offset)?;
    Ok(Json(accounts))
}

/// GET /accounts/:id - Get account by id.
async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Account>, AppError> {
    let account = state.engine.store().get_account(AccountId(id))?;
    Ok(Json(account))
}

/// POST /accounts/:id/deposits - Seed an account balance.
async fn create_deposit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<DepositRequest>,
) -> Result<Json<Account>, AppError> {
    let account = state.engine.store().deposit(AccountId(id), request.amount)?;
    Ok(Json(account))
}

/// POST /transfers - Execute a transfer.
async fn create_transfer(
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> Result<(StatusCode, Json<TransferReceipt>), AppError> {
    let receipt = state.engine.execute(&request)?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /transfers/:id - Get a committed transfer.
async fn get_transfer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Transfer>, AppError> {
    let transfer = state.engine.store().get_transfer(TransferId(id))?;
    Ok(Json(transfer))
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/accounts", post(create_account).get(list_accounts))
        .route("/accounts/{id}", get(get_account))
        .route("/accounts/{id}/deposits", post(create_deposit))
        .route("/transfers", post(create_transfer))
        .route("/transfers/{id}", get(get_transfer))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let state = AppState {
        engine: Arc::new(Engine::new(MemoryStore::new())),
    };

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    println!("Bank ledger API server running on http://127.0.0.1:3000");
    println!();
    println!("Endpoints:");
    println!("  POST /accounts               - Create an account");
    println!("  GET  /accounts               - List accounts");
    println!("  GET  /accounts/:id           - Get account by id");
    println!("  POST /accounts/:id/deposits  - Seed an account balance");
    println!("  POST /transfers              - Execute a transfer");
    println!("  GET  /transfers/:id          - Get a transfer by id");

    axum::serve(listener, app).await.unwrap();
}
