// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Integration tests for the REST API example with concurrent requests.
//!
//! These tests verify that a request layer in front of the engine correctly
//! maps typed failures to HTTP statuses and that concurrent transfer
//! requests conserve funds end to end.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bank_ledger_rs::{
    Account, AccountId, Currency, Engine, MemoryStore, Store, TransferError, TransferReceipt,
    TransferRequest,
};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;

// === DTOs (duplicated from the example for test isolation) ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub owner: String,
    pub currency: Currency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRequest {
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Server Setup ===

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine<MemoryStore>>,
}

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

async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Account>, AppError> {
    let account = state.engine.store().get_account(AccountId(id))?;
    Ok(Json(account))
}

async fn list_accounts(State(state): State<AppState>) -> Result<Json<Vec<Account>>, AppError> {
    let accounts = state.engine.store().list_accounts(usize::MAX, 0)?;
    Ok(Json(accounts))
}

async fn create_deposit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<DepositRequest>,
) -> Result<Json<Account>, AppError> {
    let account = state.engine.store().deposit(AccountId(id), request.amount)?;
    Ok(Json(account))
}

async fn create_transfer(
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> Result<(StatusCode, Json<TransferReceipt>), AppError> {
    let receipt = state.engine.execute(&request)?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/accounts", post(create_account).get(list_accounts))
        .route("/accounts/{id}", get(get_account))
        .route("/accounts/{id}/deposits", post(create_deposit))
        .route("/transfers", post(create_transfer))
        .with_state(state)
}

/// Test server that binds to an ephemeral port.
struct TestServer {
    base_url: String,
    engine: Arc<Engine<MemoryStore>>,
}

impl TestServer {
    async fn new() -> Self {
        let engine = Arc::new(Engine::new(MemoryStore::new()));
        let state = AppState {
            engine: engine.clone(),
        };

        let app = create_router(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to be ready by polling with retries
        let client = Client::new();
        let health_url = format!("{}/accounts", base_url);
        for _ in 0..50 {
            match client.get(&health_url).send().await {
                Ok(_) => break,
                Err(_) => tokio::time::sleep(tokio::time::Duration::from_millis(50)).await,
            }
        }

        TestServer { base_url, engine }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Creates a USD account over HTTP and returns its id.
    async fn create_usd_account(&self, client: &Client, owner: &str) -> i64 {
        let response = client
            .post(self.url("/accounts"))
            .json(&CreateAccountRequest {
                owner: owner.to_string(),
                currency: Currency::Usd,
            })
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        let account: Account = response.json().await.unwrap();
        account.id.0
    }

    /// Funds an account over HTTP.
    async fn fund(&self, client: &Client, id: i64, amount: &str) {
        let response = client
            .post(self.url(&format!("/accounts/{id}/deposits")))
            .json(&DepositRequest {
                amount: amount.parse().unwrap(),
            })
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
    }
}

// === Tests ===
// These tests are ignored in CI due to connection issues on some platforms.
// Run manually with: cargo test --test server_test -- --ignored

/// Opposite-direction transfers fired concurrently over HTTP conserve the
/// total balance and never wedge the server.
#[tokio::test]
#[ignore = "requires running server, may fail in CI"]
async fn concurrent_transfers_conserve_funds() {
    let server = TestServer::new().await;
    let client = Client::new();

    let alice = server.create_usd_account(&client, "alice").await;
    let bob = server.create_usd_account(&client, "bob").await;
    server.fund(&client, alice, "5000.00").await;
    server.fund(&client, bob, "5000.00").await;

    const NUM_REQUESTS: usize = 400;
    const BATCH_SIZE: usize = 100; // Limit concurrent connections

    let start = Instant::now();
    let mut completed = 0usize;

    let all_requests: Vec<(i64, i64)> = (0..NUM_REQUESTS)
        .map(|i| if i % 2 == 0 { (alice, bob) } else { (bob, alice) })
        .collect();

    for batch in all_requests.chunks(BATCH_SIZE) {
        let mut handles = Vec::with_capacity(batch.len());

        for &(from, to) in batch {
            let client = client.clone();
            let url = server.url("/transfers");

            let handle = tokio::spawn(async move {
                let request =
                    TransferRequest::new(AccountId(from), AccountId(to), "1.00".parse().unwrap());
                let response = client.post(&url).json(&request).send().await.unwrap();
                response.status()
            });

            handles.push(handle);
        }

        let results: Vec<_> = futures::future::join_all(handles).await;
        completed += results
            .iter()
            .filter(|result| result.as_ref().unwrap().is_success())
            .count();
    }

    let elapsed = start.elapsed();
    println!(
        "Processed {} transfers in {:?} ({:.0} req/s), {} committed",
        NUM_REQUESTS,
        elapsed,
        NUM_REQUESTS as f64 / elapsed.as_secs_f64(),
        completed
    );

    // Every request either committed fully or failed cleanly; the total is
    // untouched either way
    let store = server.engine.store();
    let total: Decimal = store
        .list_accounts(usize::MAX, 0)
        .unwrap()
        .iter()
        .map(|account| account.balance)
        .sum();
    assert_eq!(total, "10000.00".parse::<Decimal>().unwrap());
    assert_eq!(store.list_transfers(usize::MAX, 0).unwrap().len(), completed);
}

/// Each typed failure maps to its transport status.
#[tokio::test]
#[ignore = "requires running server, may fail in CI"]
async fn typed_failures_map_to_http_statuses() {
    let server = TestServer::new().await;
    let client = Client::new();

    let alice = server.create_usd_account(&client, "alice").await;
    let bob = server.create_usd_account(&client, "bob").await;
    server.fund(&client, alice, "100.00").await;

    // Overdraft -> 422
    let response = client
        .post(server.url("/transfers"))
        .json(&TransferRequest::new(
            AccountId(alice),
            AccountId(bob),
            "5000.00".parse().unwrap(),
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
    let body: ErrorResponse = response.json().await.unwrap();
    assert_eq!(body.code, "INSUFFICIENT_FUNDS");

    // Self transfer -> 400
    let response = client
        .post(server.url("/transfers"))
        .json(&TransferRequest::new(
            AccountId(alice),
            AccountId(alice),
            "1.00".parse().unwrap(),
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    // Unknown account -> 404
    let response = client
        .post(server.url("/transfers"))
        .json(&TransferRequest::new(
            AccountId(alice),
            AccountId(999),
            "1.00".parse().unwrap(),
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    // Duplicate (owner, currency) -> 409
    let response = client
        .post(server.url("/accounts"))
        .json(&CreateAccountRequest {
            owner: "alice".to_string(),
            currency: Currency::Usd,
        })
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CONFLICT);

    // Failed attempts left balances untouched
    let account: Account = client
        .get(server.url(&format!("/accounts/{alice}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(account.balance, "100.00".parse::<Decimal>().unwrap());
}
