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

//! # Bank Ledger
//!
//! This library provides a ledger-backed funds-transfer engine: account
//! balances with a double-entry record of every balance change, and
//! all-or-nothing transfers between accounts under concurrent load.
//!
//! ## Core Components
//!
//! - [`Engine`]: Transfer executor; one call is one atomic unit of work
//! - [`Store`] / [`StoreTx`]: Injected store boundary with row locks and
//!   transactional commit/rollback
//! - [`MemoryStore`]: Thread-safe in-memory store implementation
//! - [`Account`], [`Transfer`], [`Entry`]: The three ledger entities
//! - [`TransferError`]: Typed failures, split into terminal rejections and
//!   retryable transient faults
//!
//! ## Example
//!
//! ```
//! use bank_ledger_rs::{Currency, Engine, MemoryStore, Store, TransferRequest};
//! use rust_decimal_macros::dec;
//!
//! let store = MemoryStore::new();
//! let alice = store.create_account("alice", Currency::Usd).unwrap();
//! let bob = store.create_account("bob", Currency::Usd).unwrap();
//! store.deposit(alice.id, dec!(200.00)).unwrap();
//!
//! let engine = Engine::new(store);
//! let receipt = engine
//!     .execute(&TransferRequest::new(alice.id, bob.id, dec!(50.00)))
//!     .unwrap();
//!
//! assert_eq!(receipt.from_account.balance, dec!(150.00));
//! assert_eq!(receipt.to_account.balance, dec!(50.00));
//! ```
//!
//! ## Thread Safety
//!
//! A single [`Engine`] is shared across threads; concurrent transfers over
//! disjoint account pairs run in parallel, while transfers over overlapping
//! pairs serialize on row locks acquired in a fixed global order (lower
//! account id first), which makes the engine deadlock-free by construction.

pub mod account;
mod base;
mod engine;
pub mod error;
mod memory_store;
mod store;
mod transfer;
pub mod validator;

pub use account::Account;
pub use base::{AccountId, Currency, EntryId, ParseCurrencyError, TransferId};
pub use engine::Engine;
pub use error::TransferError;
pub use memory_store::{MemoryStore, MemoryTx};
pub use store::{Store, StoreTx};
pub use transfer::{Entry, Transfer, TransferReceipt, TransferRequest};
