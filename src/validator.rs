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

//! Pre-flight transfer validation.
//!
//! These checks run before the unit of work begins, against unlocked store
//! reads, so obviously-invalid requests are rejected without paying for a
//! transaction. They are advisory only: under concurrency the balances read
//! here may already be stale by the time the engine holds the row locks,
//! which is why the engine re-checks sufficiency (and currency) under lock.

use crate::error::TransferError;
use crate::store::Store;
use crate::transfer::TransferRequest;
use rust_decimal::Decimal;

/// Checks a transfer request against current (unlocked) store state.
///
/// Read-only; takes no locks and never mutates anything.
///
/// # Errors
///
/// - [`TransferError::InvalidRequest`] if the request is self-referential
///   or the amount is not positive.
/// - [`TransferError::AccountNotFound`] if either account is missing.
/// - [`TransferError::CurrencyMismatch`] if either account disagrees with
///   the requested currency, or the two accounts disagree with each other.
/// - [`TransferError::InsufficientFunds`] if the source balance, as read
///   without a lock, is below the amount. Advisory: passing this check does
///   not guarantee the transfer will commit.
pub fn preflight<S: Store>(store: &S, request: &TransferRequest) -> Result<(), TransferError> {
    if request.from_account_id == request.to_account_id {
        return Err(TransferError::InvalidRequest);
    }
    if request.amount <= Decimal::ZERO {
        return Err(TransferError::InvalidRequest);
    }

    let from = store.get_account(request.from_account_id)?;
    let to = store.get_account(request.to_account_id)?;

    if let Some(currency) = request.currency {
        if from.currency != currency || to.currency != currency {
            return Err(TransferError::CurrencyMismatch);
        }
    }
    if from.currency != to.currency {
        return Err(TransferError::CurrencyMismatch);
    }

    if from.balance < request.amount {
        return Err(TransferError::InsufficientFunds);
    }

    Ok(())
}
