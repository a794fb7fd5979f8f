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

//! Error types for transfer processing and the store boundary.

use crate::base::{AccountId, TransferId};
use thiserror::Error;

/// Transfer processing and store boundary errors.
///
/// Business-rule failures (`InvalidRequest`, `AccountNotFound`,
/// `CurrencyMismatch`, `InsufficientFunds`) are terminal: retrying the same
/// request cannot succeed until external state changes. `Conflict` and
/// `StoreUnavailable` are transient store-level failures; the whole transfer
/// call can be safely re-driven because a rolled-back unit of work leaves no
/// partial state behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Request is malformed: self-referential transfer or non-positive amount
    #[error("invalid transfer request")]
    InvalidRequest,

    /// Referenced account does not exist
    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    /// Referenced transfer does not exist
    #[error("transfer {0} not found")]
    TransferNotFound(TransferId),

    /// Account currencies disagree with each other or with the request
    #[error("currency mismatch")]
    CurrencyMismatch,

    /// Source balance is below the transfer amount
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Uniqueness violation at the store boundary
    #[error("duplicate key")]
    DuplicateKey,

    /// Transient contention failure (lock wait aborted, serialization
    /// conflict); safe to retry the whole operation
    #[error("transient conflict, retry the operation")]
    Conflict,

    /// Store is unreachable; safe to retry the whole operation
    #[error("store unavailable")]
    StoreUnavailable,
}

impl TransferError {
    /// Whether the caller may retry the whole operation.
    ///
    /// Retrying is safe because a failed unit of work rolls back completely;
    /// no partial transfer state survives.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransferError::Conflict | TransferError::StoreUnavailable
        )
    }
}
