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

//! Thread-safe in-memory store.
//!
//! [`MemoryStore`] implements the [`Store`] boundary with the observable
//! semantics the engine expects from a relational store at read-committed
//! isolation: explicit row locks held for the lifetime of a unit of work,
//! all-or-nothing visibility of the writes staged through a [`MemoryTx`],
//! and unlocked reads that see the last committed row state without ever
//! waiting on a writer's lock (they may therefore be stale, exactly like a
//! read-committed `SELECT` racing an open transaction).
//!
//! Row locks live in a lock-manager table separate from the row data: a
//! transaction that locks a row holds the owning guard until it commits or
//! rolls back, so concurrent transactions serialize exactly as they would
//! on database row locks, while plain reads go straight to the committed
//! tables. Writes are staged inside the transaction and only applied on
//! commit, which makes rollback a plain drop.

use crate::account::Account;
use crate::base::{AccountId, Currency, EntryId, TransferId};
use crate::error::TransferError;
use crate::store::{Store, StoreTx};
use crate::transfer::{Entry, Transfer};
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use parking_lot::Mutex;
use parking_lot::lock_api::ArcMutexGuard;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// Owned guard over one row lock, held for the transaction lifetime.
type RowGuard = ArcMutexGuard<parking_lot::RawMutex, ()>;

/// In-memory store with database-like row locking and atomic units of work.
#[derive(Debug)]
pub struct MemoryStore {
    /// Committed account rows.
    accounts: DashMap<AccountId, Account>,
    /// Row-lock manager; one mutex per account, created with the account.
    row_locks: DashMap<AccountId, Arc<Mutex<()>>>,
    /// Committed ledger entries.
    entries: DashMap<EntryId, Entry>,
    /// Committed transfers.
    transfers: DashMap<TransferId, Transfer>,
    /// Uniqueness index over (owner, currency).
    owners: DashMap<(String, Currency), AccountId>,
    next_account_id: AtomicI64,
    next_entry_id: AtomicI64,
    next_transfer_id: AtomicI64,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            row_locks: DashMap::new(),
            entries: DashMap::new(),
            transfers: DashMap::new(),
            owners: DashMap::new(),
            next_account_id: AtomicI64::new(1),
            next_entry_id: AtomicI64::new(1),
            next_transfer_id: AtomicI64::new(1),
        }
    }

    /// Credits `amount` directly to an account, outside the transfer path.
    ///
    /// This is the seeding operation used to fund accounts: it takes the row
    /// lock, writes the balance, and appends the matching credit entry, so
    /// the sum-of-entries invariant holds for seeded balances too.
    ///
    /// # Errors
    ///
    /// - [`TransferError::AccountNotFound`] if the account does not exist.
    /// - [`TransferError::InvalidRequest`] if `amount` is not positive.
    pub fn deposit(&self, id: AccountId, amount: Decimal) -> Result<Account, TransferError> {
        let lock = self.row_lock(id)?;
        let _guard = lock.lock();

        let mut row = self
            .accounts
            .get_mut(&id)
            .ok_or(TransferError::AccountNotFound(id))?;
        let credited = row.credited(amount)?;
        *row = credited;
        let account = row.clone();
        drop(row);

        let entry = Entry {
            id: EntryId(self.next_entry_id.fetch_add(1, Ordering::SeqCst)),
            account_id: id,
            amount,
            created_at: Utc::now(),
        };
        self.entries.insert(entry.id, entry);
        Ok(account)
    }

    fn row_lock(&self, id: AccountId) -> Result<Arc<Mutex<()>>, TransferError> {
        self.row_locks
            .get(&id)
            .map(|lock| Arc::clone(lock.value()))
            .ok_or(TransferError::AccountNotFound(id))
    }

    fn sorted_ids(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self.accounts.iter().map(|row| *row.key()).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    type Tx<'a>
        = MemoryTx<'a>
    where
        Self: 'a;

    fn begin(&self, deadline: Option<Instant>) -> Result<MemoryTx<'_>, TransferError> {
        Ok(MemoryTx {
            store: self,
            deadline,
            locked: HashMap::new(),
            staged_balances: HashMap::new(),
            staged_entries: Vec::new(),
            staged_transfers: Vec::new(),
        })
    }

    fn create_account(&self, owner: &str, currency: Currency) -> Result<Account, TransferError> {
        // Entry API keeps the check-and-insert atomic under concurrent creates.
        match self.owners.entry((owner.to_string(), currency)) {
            MapEntry::Occupied(_) => Err(TransferError::DuplicateKey),
            MapEntry::Vacant(slot) => {
                let id = AccountId(self.next_account_id.fetch_add(1, Ordering::SeqCst));
                let account = Account::new(id, owner, currency, Utc::now());
                self.row_locks.insert(id, Arc::new(Mutex::new(())));
                self.accounts.insert(id, account.clone());
                slot.insert(id);
                Ok(account)
            }
        }
    }

    fn get_account(&self, id: AccountId) -> Result<Account, TransferError> {
        // Committed state only; never waits on a row lock.
        self.accounts
            .get(&id)
            .map(|row| row.clone())
            .ok_or(TransferError::AccountNotFound(id))
    }

    fn list_accounts(&self, limit: usize, offset: usize) -> Result<Vec<Account>, TransferError> {
        let accounts = self
            .sorted_ids()
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|id| self.accounts.get(&id).map(|row| row.clone()))
            .collect();
        Ok(accounts)
    }

    fn get_transfer(&self, id: TransferId) -> Result<Transfer, TransferError> {
        self.transfers
            .get(&id)
            .map(|transfer| transfer.clone())
            .ok_or(TransferError::TransferNotFound(id))
    }

    fn list_transfers(&self, limit: usize, offset: usize) -> Result<Vec<Transfer>, TransferError> {
        let mut transfers: Vec<Transfer> =
            self.transfers.iter().map(|row| row.value().clone()).collect();
        transfers.sort_unstable_by_key(|transfer| transfer.id.0);
        Ok(transfers.into_iter().skip(offset).take(limit).collect())
    }

    fn list_transfers_for_account(
        &self,
        account_id: AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transfer>, TransferError> {
        let mut transfers: Vec<Transfer> = self
            .transfers
            .iter()
            .filter(|row| row.from_account_id == account_id || row.to_account_id == account_id)
            .map(|row| row.value().clone())
            .collect();
        transfers.sort_unstable_by_key(|transfer| transfer.id.0);
        Ok(transfers.into_iter().skip(offset).take(limit).collect())
    }

    fn list_entries(
        &self,
        account_id: AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Entry>, TransferError> {
        let mut entries: Vec<Entry> = self
            .entries
            .iter()
            .filter(|row| row.account_id == account_id)
            .map(|row| row.value().clone())
            .collect();
        entries.sort_unstable_by_key(|entry| entry.id.0);
        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }
}

/// One in-flight unit of work against a [`MemoryStore`].
///
/// Holds the row locks it has acquired and stages every write locally;
/// [`commit`](StoreTx::commit) applies the staged state to the shared
/// tables while the locks are still held, then releases them. Dropping the
/// transaction releases the locks without applying anything.
pub struct MemoryTx<'a> {
    store: &'a MemoryStore,
    deadline: Option<Instant>,
    locked: HashMap<AccountId, RowGuard>,
    staged_balances: HashMap<AccountId, Decimal>,
    staged_entries: Vec<Entry>,
    staged_transfers: Vec<Transfer>,
}

impl MemoryTx<'_> {
    /// Row as seen by this transaction: committed state plus staged writes.
    fn view(&self, id: AccountId) -> Result<Account, TransferError> {
        let mut account = self.store.get_account(id)?;
        if let Some(balance) = self.staged_balances.get(&id) {
            account.balance = *balance;
        }
        Ok(account)
    }
}

impl StoreTx for MemoryTx<'_> {
    fn lock_account(&mut self, id: AccountId) -> Result<Account, TransferError> {
        // Re-locking a row this transaction already holds would self-deadlock
        // on a non-reentrant mutex; return the held view instead.
        if self.locked.contains_key(&id) {
            return self.view(id);
        }

        let lock = self.store.row_lock(id)?;
        let guard = match self.deadline {
            None => lock.lock_arc(),
            Some(deadline) => {
                tracing::trace!(account = %id, "waiting for row lock with deadline");
                lock.try_lock_arc_until(deadline)
                    .ok_or(TransferError::Conflict)?
            }
        };
        self.locked.insert(id, guard);
        self.view(id)
    }

    fn update_account_balance(
        &mut self,
        id: AccountId,
        new_balance: Decimal,
    ) -> Result<Account, TransferError> {
        if new_balance < Decimal::ZERO {
            return Err(TransferError::InvalidRequest);
        }
        // An update takes the row lock if this transaction does not hold it
        // yet, same as a relational UPDATE would.
        self.lock_account(id)?;
        self.staged_balances.insert(id, new_balance);
        self.view(id)
    }

    fn insert_entry(
        &mut self,
        account_id: AccountId,
        amount: Decimal,
    ) -> Result<Entry, TransferError> {
        if amount == Decimal::ZERO {
            return Err(TransferError::InvalidRequest);
        }
        if !self.store.accounts.contains_key(&account_id) {
            return Err(TransferError::AccountNotFound(account_id));
        }
        let entry = Entry {
            id: EntryId(self.store.next_entry_id.fetch_add(1, Ordering::SeqCst)),
            account_id,
            amount,
            created_at: Utc::now(),
        };
        self.staged_entries.push(entry.clone());
        Ok(entry)
    }

    fn insert_transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<Transfer, TransferError> {
        if from == to || amount <= Decimal::ZERO {
            return Err(TransferError::InvalidRequest);
        }
        let transfer = Transfer {
            id: TransferId(self.store.next_transfer_id.fetch_add(1, Ordering::SeqCst)),
            from_account_id: from,
            to_account_id: to,
            amount,
            created_at: Utc::now(),
        };
        self.staged_transfers.push(transfer.clone());
        Ok(transfer)
    }

    fn commit(mut self) -> Result<(), TransferError> {
        // Balances land on the committed rows first, then the append-only
        // tables; everything happens before the guards drop, so transactions
        // waiting on these rows observe the committed state.
        for (id, balance) in self.staged_balances.drain() {
            if let Some(mut row) = self.store.accounts.get_mut(&id) {
                row.balance = balance;
            }
        }
        for entry in self.staged_entries.drain(..) {
            self.store.entries.insert(entry.id, entry);
        }
        for transfer in self.staged_transfers.drain(..) {
            tracing::trace!(transfer = %transfer.id, "transfer committed");
            self.store.transfers.insert(transfer.id, transfer);
        }
        Ok(())
    }
}
