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

//! Store boundary traits.
//!
//! The transfer engine is written against these traits rather than a
//! concrete database so the store is an explicit, injected dependency:
//! tests run against [`MemoryStore`](crate::MemoryStore), a deployment can
//! supply a relational store offering row-level locks and read-committed
//! isolation.
//!
//! [`Store`] covers unlocked point reads, listings, and account creation.
//! [`StoreTx`] is one atomic unit of work: every write staged through it
//! becomes durable on [`commit`](StoreTx::commit) or vanishes entirely when
//! the transaction is dropped.

use crate::account::Account;
use crate::base::{AccountId, Currency, TransferId};
use crate::error::TransferError;
use crate::transfer::{Entry, Transfer};
use rust_decimal::Decimal;
use std::time::Instant;

/// One atomic unit of work against the store.
///
/// Dropping a transaction without calling [`commit`](Self::commit) rolls it
/// back; none of its writes become observable.
///
/// # Lock ordering
///
/// [`lock_account`](Self::lock_account) blocks until the account's row lock
/// is granted (or the transaction deadline expires). The store imposes no
/// ordering of its own; callers locking more than one account must acquire
/// the locks in a single global order. The transfer engine always locks the
/// lower account id first.
pub trait StoreTx {
    /// Acquires the row lock for `id` and returns the current row.
    ///
    /// The lock is held until the transaction commits or rolls back.
    ///
    /// # Errors
    ///
    /// - [`TransferError::AccountNotFound`] if no such account exists.
    /// - [`TransferError::Conflict`] if the transaction deadline expired
    ///   while waiting for the lock.
    fn lock_account(&mut self, id: AccountId) -> Result<Account, TransferError>;

    /// Stages a new balance for an account locked earlier in this transaction.
    ///
    /// Returns the account as it will look after commit.
    fn update_account_balance(
        &mut self,
        id: AccountId,
        new_balance: Decimal,
    ) -> Result<Account, TransferError>;

    /// Stages one signed ledger entry for an account.
    fn insert_entry(
        &mut self,
        account_id: AccountId,
        amount: Decimal,
    ) -> Result<Entry, TransferError>;

    /// Stages one transfer record.
    fn insert_transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<Transfer, TransferError>;

    /// Makes every staged write durable and releases all row locks.
    fn commit(self) -> Result<(), TransferError>
    where
        Self: Sized;

    /// Discards every staged write and releases all row locks.
    ///
    /// Equivalent to dropping the transaction; provided for call sites that
    /// want the rollback to be explicit.
    fn rollback(self)
    where
        Self: Sized,
    {
        drop(self);
    }
}

/// The persistent store behind the transfer engine.
///
/// Reads outside a transaction are unlocked, single-row snapshots: cheap,
/// possibly stale under concurrent writers, and never authoritative for
/// balance checks.
pub trait Store: Send + Sync {
    /// The unit-of-work type produced by [`begin`](Self::begin).
    type Tx<'a>: StoreTx
    where
        Self: 'a;

    /// Opens a unit of work.
    ///
    /// `deadline`, when given, bounds every lock wait inside the
    /// transaction; an expired deadline aborts with
    /// [`TransferError::Conflict`] and the transaction rolls back.
    fn begin(&self, deadline: Option<Instant>) -> Result<Self::Tx<'_>, TransferError>;

    /// Creates an account with a zero balance.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::DuplicateKey`] if an account with the same
    /// (owner, currency) pair already exists.
    fn create_account(&self, owner: &str, currency: Currency) -> Result<Account, TransferError>;

    /// Unlocked snapshot read of one account.
    fn get_account(&self, id: AccountId) -> Result<Account, TransferError>;

    /// Lists accounts ordered by id.
    fn list_accounts(&self, limit: usize, offset: usize) -> Result<Vec<Account>, TransferError>;

    /// Fetches one committed transfer.
    fn get_transfer(&self, id: TransferId) -> Result<Transfer, TransferError>;

    /// Lists committed transfers ordered by id.
    fn list_transfers(&self, limit: usize, offset: usize) -> Result<Vec<Transfer>, TransferError>;

    /// Lists committed transfers touching `account_id` on either side.
    fn list_transfers_for_account(
        &self,
        account_id: AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transfer>, TransferError>;

    /// Lists ledger entries for one account ordered by id.
    fn list_entries(
        &self,
        account_id: AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Entry>, TransferError>;
}
