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

//! Bank account entity.
//!
//! An [`Account`] is a point-in-time snapshot of one account row: identity,
//! owner, balance, and currency. The balance may only be mutated through the
//! transfer engine (or the store's seeding deposit), always under the
//! account's row lock.
//!
//! # Example
//!
//! ```
//! use bank_ledger_rs::{Account, AccountId, Currency};
//! use rust_decimal_macros::dec;
//!
//! let account = Account::new(AccountId(1), "alice", Currency::Usd, chrono::Utc::now());
//! assert_eq!(account.balance, dec!(0));
//! ```

use crate::base::{AccountId, Currency};
use crate::error::TransferError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One bank account row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner: String,
    pub balance: Decimal,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Creates a new account with a zero balance.
    pub fn new(
        id: AccountId,
        owner: impl Into<String>,
        currency: Currency,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner: owner.into(),
            balance: Decimal::ZERO,
            currency,
            created_at,
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= Decimal::ZERO,
            "Invariant violated: balance went negative: {}",
            self.balance
        );
    }

    /// Returns a copy of this account with `amount` added to the balance.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidRequest`] if `amount` is not positive.
    pub fn credited(&self, amount: Decimal) -> Result<Account, TransferError> {
        if amount <= Decimal::ZERO {
            return Err(TransferError::InvalidRequest);
        }
        let account = Account {
            balance: self.balance + amount,
            ..self.clone()
        };
        account.assert_invariants();
        Ok(account)
    }

    /// Returns a copy of this account with `amount` removed from the balance.
    ///
    /// This is the authoritative sufficiency check: the transfer engine calls
    /// it on the snapshot read under the row lock.
    ///
    /// # Errors
    ///
    /// - [`TransferError::InvalidRequest`] if `amount` is not positive.
    /// - [`TransferError::InsufficientFunds`] if the balance is below `amount`.
    pub fn debited(&self, amount: Decimal) -> Result<Account, TransferError> {
        if amount <= Decimal::ZERO {
            return Err(TransferError::InvalidRequest);
        }
        if self.balance < amount {
            return Err(TransferError::InsufficientFunds);
        }
        let account = Account {
            balance: self.balance - amount,
            ..self.clone()
        };
        account.assert_invariants();
        Ok(account)
    }
}
