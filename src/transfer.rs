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

//! Transfer and ledger entry records.
//!
//! A committed transfer is three immutable facts written in one unit of
//! work: the [`Transfer`] row itself and two [`Entry`] rows, a debit of
//! `-amount` on the source account and a credit of `+amount` on the
//! destination account.

use crate::account::Account;
use crate::base::{AccountId, Currency, EntryId, TransferId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One completed movement of funds between two accounts.
///
/// Immutable once committed; `amount` is always positive and the direction
/// is carried by the account references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// One signed ledger line recording a single balance change on one account.
///
/// Positive amounts are credits, negative amounts are debits. Entries are
/// append-only: for every account, the sum of its entry amounts equals its
/// current balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A validated transfer request as received from the request layer.
///
/// `currency` is the currency the caller expects both accounts to hold;
/// when absent, only account-to-account consistency is enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
}

impl TransferRequest {
    pub fn new(from: AccountId, to: AccountId, amount: Decimal) -> Self {
        Self {
            from_account_id: from,
            to_account_id: to,
            amount,
            currency: None,
        }
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }
}

/// Everything a committed transfer produced: the transfer row, both ledger
/// entries, and both post-transfer account snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}
