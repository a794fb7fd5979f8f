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

//! Property-based tests for the transfer engine.
//!
//! These tests verify invariants that should hold for any sequence of
//! transfer requests: conservation of funds, ledger consistency, and
//! all-or-nothing application.

use bank_ledger_rs::{AccountId, Currency, Engine, MemoryStore, Store, TransferRequest};
use proptest::prelude::*;
use rust_decimal::Decimal;

const NUM_ACCOUNTS: usize = 4;

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// Generate a positive amount (0.01 to 10000.00 with 2 decimal places).
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..=1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Generate a seed balance (0.00 to 5000.00).
fn arb_seed() -> impl Strategy<Value = Decimal> {
    (0i64..=500_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Generate one transfer attempt: source index, destination index, amount.
/// Indices may collide, producing invalid self-transfers on purpose.
fn arb_attempt() -> impl Strategy<Value = (usize, usize, Decimal)> {
    (0..NUM_ACCOUNTS, 0..NUM_ACCOUNTS, arb_amount())
}

/// Engine over NUM_ACCOUNTS USD accounts with the given seed balances.
fn engine_with_seeds(seeds: &[Decimal]) -> Engine<MemoryStore> {
    let store = MemoryStore::new();
    for (i, seed) in seeds.iter().enumerate() {
        let account = store
            .create_account(&format!("owner{i}"), Currency::Usd)
            .unwrap();
        if *seed > Decimal::ZERO {
            store.deposit(account.id, *seed).unwrap();
        }
    }
    Engine::new(store)
}

fn account_id(index: usize) -> AccountId {
    AccountId(index as i64 + 1)
}

// =============================================================================
// Conservation and Ledger Consistency
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// No sequence of transfer attempts creates or destroys funds.
    #[test]
    fn transfers_conserve_total_balance(
        seeds in prop::collection::vec(arb_seed(), NUM_ACCOUNTS),
        attempts in prop::collection::vec(arb_attempt(), 0..40),
    ) {
        let engine = engine_with_seeds(&seeds);
        let expected_total: Decimal = seeds.iter().copied().sum();

        for (from, to, amount) in attempts {
            let request = TransferRequest::new(account_id(from), account_id(to), amount);
            let _ = engine.execute(&request);
        }

        let total: Decimal = engine
            .store()
            .list_accounts(usize::MAX, 0)
            .unwrap()
            .iter()
            .map(|account| account.balance)
            .sum();
        prop_assert_eq!(total, expected_total);
    }

    /// Every account's balance equals the sum of its ledger entries, at any
    /// quiescent point.
    #[test]
    fn balance_always_equals_entry_sum(
        seeds in prop::collection::vec(arb_seed(), NUM_ACCOUNTS),
        attempts in prop::collection::vec(arb_attempt(), 0..40),
    ) {
        let engine = engine_with_seeds(&seeds);

        for (from, to, amount) in attempts {
            let request = TransferRequest::new(account_id(from), account_id(to), amount);
            let _ = engine.execute(&request);
        }

        let store = engine.store();
        for index in 0..NUM_ACCOUNTS {
            let id = account_id(index);
            let balance = store.get_account(id).unwrap().balance;
            let entry_sum: Decimal = store
                .list_entries(id, usize::MAX, 0)
                .unwrap()
                .iter()
                .map(|entry| entry.amount)
                .sum();
            prop_assert_eq!(balance, entry_sum);
        }
    }

    /// A committed transfer writes exactly two entries; a failed one writes
    /// none.
    #[test]
    fn two_entries_per_committed_transfer(
        seeds in prop::collection::vec(arb_seed(), NUM_ACCOUNTS),
        attempts in prop::collection::vec(arb_attempt(), 0..40),
    ) {
        let engine = engine_with_seeds(&seeds);
        let seed_entries = seeds.iter().filter(|seed| **seed > Decimal::ZERO).count();

        let mut successes = 0usize;
        for (from, to, amount) in attempts {
            let request = TransferRequest::new(account_id(from), account_id(to), amount);
            if engine.execute(&request).is_ok() {
                successes += 1;
            }
        }

        let store = engine.store();
        let total_entries: usize = (0..NUM_ACCOUNTS)
            .map(|index| store.list_entries(account_id(index), usize::MAX, 0).unwrap().len())
            .sum();
        prop_assert_eq!(total_entries, seed_entries + 2 * successes);
        prop_assert_eq!(store.list_transfers(usize::MAX, 0).unwrap().len(), successes);
    }
}

// =============================================================================
// Model-Based Application
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// The engine agrees with a simple sequential model: a transfer applies
    /// exactly when the accounts differ and the source can afford it, and a
    /// rejected transfer changes nothing.
    #[test]
    fn engine_matches_sequential_model(
        seeds in prop::collection::vec(arb_seed(), NUM_ACCOUNTS),
        attempts in prop::collection::vec(arb_attempt(), 0..40),
    ) {
        let engine = engine_with_seeds(&seeds);
        let mut model = seeds.clone();

        for (from, to, amount) in attempts {
            let request = TransferRequest::new(account_id(from), account_id(to), amount);
            let result = engine.execute(&request);

            let should_apply = from != to && model[from] >= amount;
            prop_assert_eq!(result.is_ok(), should_apply);

            if should_apply {
                model[from] -= amount;
                model[to] += amount;

                let receipt = result.unwrap();
                prop_assert_eq!(receipt.from_account.balance, model[from]);
                prop_assert_eq!(receipt.to_account.balance, model[to]);
            }
        }

        // Final store state matches the model exactly
        for index in 0..NUM_ACCOUNTS {
            let balance = engine
                .store()
                .get_account(account_id(index))
                .unwrap()
                .balance;
            prop_assert_eq!(balance, model[index]);
        }
    }

    /// Receipts are internally consistent: entry amounts mirror the transfer
    /// amount with opposite signs.
    #[test]
    fn receipt_entries_mirror_transfer_amount(
        seed in arb_seed(),
        amount in arb_amount(),
    ) {
        let mut seeds = vec![Decimal::ZERO; NUM_ACCOUNTS];
        seeds[0] = seed + amount; // Always affordable
        let engine = engine_with_seeds(&seeds);

        let request = TransferRequest::new(account_id(0), account_id(1), amount);
        let receipt = engine.execute(&request).unwrap();

        prop_assert_eq!(receipt.from_entry.amount, -amount);
        prop_assert_eq!(receipt.to_entry.amount, amount);
        prop_assert_eq!(receipt.from_entry.account_id, account_id(0));
        prop_assert_eq!(receipt.to_entry.account_id, account_id(1));
        prop_assert_eq!(receipt.transfer.amount, amount);
    }
}
