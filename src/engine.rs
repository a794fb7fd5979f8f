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

//! Transfer execution engine.
//!
//! The [`Engine`] is the only component that moves money. One call to
//! [`Engine::execute`] is one atomic unit of work: it locks both account
//! rows in a fixed global order, re-validates under lock, writes the
//! transfer row and its two ledger entries, applies both balances, and
//! commits. Any failure after the transaction begins rolls back with zero
//! observable side effects.
//!
//! # Lock Ordering
//!
//! Two concurrent transfers over the same pair of accounts in opposite
//! directions (A->B racing B->A) would deadlock if each locked its source
//! first. The engine therefore always acquires the row lock of the
//! **lower-valued account id first**, regardless of direction. All lock
//! acquisitions follow this one total order, so no cycle of waiting
//! transactions can form. Transfers over disjoint account pairs run fully
//! in parallel.
//!
//! # Thread Safety
//!
//! The engine holds no mutable state of its own; it is safe to share one
//! instance across any number of threads, one invocation per inbound
//! transfer request.

use crate::error::TransferError;
use crate::store::{Store, StoreTx};
use crate::transfer::{TransferReceipt, TransferRequest};
use crate::validator;
use std::time::Instant;

/// Transfer executor over an injected [`Store`].
///
/// # Invariants
///
/// - A committed transfer writes exactly one Transfer row, exactly two
///   Entry rows (-amount source, +amount destination), and both balance
///   updates, all in one unit of work.
/// - Balances are only written under the corresponding row lock.
/// - The sufficiency check that decides a transfer's fate is the one made
///   under lock, never the pre-flight read.
pub struct Engine<S: Store> {
    store: S,
}

impl<S: Store> Engine<S> {
    /// Creates an engine over the given store.
    pub fn new(store: S) -> Self {
        Engine { store }
    }

    /// The underlying store, for reads outside the transfer path.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Executes one funds transfer as an atomic unit of work.
    ///
    /// Blocks while waiting for the two account row locks and while the
    /// commit is applied.
    ///
    /// # Errors
    ///
    /// | Error | Meaning | Retryable |
    /// |-------|---------|-----------|
    /// | [`TransferError::InvalidRequest`] | self-transfer or non-positive amount | no |
    /// | [`TransferError::AccountNotFound`] | either endpoint missing | no |
    /// | [`TransferError::CurrencyMismatch`] | currencies disagree | no |
    /// | [`TransferError::InsufficientFunds`] | source balance too low under lock | no |
    /// | [`TransferError::Conflict`] | transient contention | yes |
    /// | [`TransferError::StoreUnavailable`] | store unreachable | yes |
    ///
    /// Retrying is always safe: a failed call leaves no partial state.
    pub fn execute(&self, request: &TransferRequest) -> Result<TransferReceipt, TransferError> {
        self.run(request, None)
    }

    /// Same as [`execute`](Self::execute), bounded by a deadline.
    ///
    /// The deadline caps every lock wait inside the unit of work; when it
    /// expires the transaction rolls back and the call fails with
    /// [`TransferError::Conflict`], with no observable effect.
    pub fn execute_with_deadline(
        &self,
        request: &TransferRequest,
        deadline: Instant,
    ) -> Result<TransferReceipt, TransferError> {
        self.run(request, Some(deadline))
    }

    fn run(
        &self,
        request: &TransferRequest,
        deadline: Option<Instant>,
    ) -> Result<TransferReceipt, TransferError> {
        // Cheap advisory rejection before any lock is taken.
        validator::preflight(&self.store, request)?;

        let mut tx = self.store.begin(deadline)?;

        // Lock the lower account id first, then the higher, regardless of
        // which side is the source. Every transfer in the system uses this
        // order, so opposite-direction transfers over the same pair cannot
        // wait on each other in a cycle.
        let (lo, hi) = if request.from_account_id < request.to_account_id {
            (request.from_account_id, request.to_account_id)
        } else {
            (request.to_account_id, request.from_account_id)
        };
        let lo_account = tx.lock_account(lo)?;
        let hi_account = tx.lock_account(hi)?;
        let (from, to) = if request.from_account_id == lo {
            (lo_account, hi_account)
        } else {
            (hi_account, lo_account)
        };

        // Re-validate with the locks held. The currency check is defensive;
        // the sufficiency check is the authoritative one.
        if let Some(currency) = request.currency {
            if from.currency != currency || to.currency != currency {
                return Err(TransferError::CurrencyMismatch);
            }
        }
        if from.currency != to.currency {
            return Err(TransferError::CurrencyMismatch);
        }
        let from_after = from.debited(request.amount)?;
        let to_after = to.credited(request.amount)?;

        let transfer = tx.insert_transfer(
            request.from_account_id,
            request.to_account_id,
            request.amount,
        )?;
        let from_entry = tx.insert_entry(request.from_account_id, -request.amount)?;
        let to_entry = tx.insert_entry(request.to_account_id, request.amount)?;
        let from_account = tx.update_account_balance(request.from_account_id, from_after.balance)?;
        let to_account = tx.update_account_balance(request.to_account_id, to_after.balance)?;

        tx.commit()?;

        tracing::debug!(
            transfer = %transfer.id,
            from = %transfer.from_account_id,
            to = %transfer.to_account_id,
            amount = %transfer.amount,
            "transfer committed"
        );

        Ok(TransferReceipt {
            transfer,
            from_account,
            to_account,
            from_entry,
            to_entry,
        })
    }
}
