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

use bank_ledger_rs::{AccountId, Currency, Engine, MemoryStore, Store, TransferRequest};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;

/// Bank Ledger - Replay account and transfer operations from a CSV file
///
/// Reads operations from a CSV file, runs them through the transfer engine,
/// and outputs final account states to stdout.
#[derive(Parser, Debug)]
#[command(name = "bank-ledger-rs")]
#[command(about = "A funds-transfer engine that replays operation CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: op,owner,currency,from,to,amount
    /// Example: cargo run -- operations.csv > accounts.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args = Args::parse();

    // Open input file
    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    // Replay operations from CSV
    let engine = match process_operations(BufReader::new(file)) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error processing operations: {}", e);
            process::exit(1);
        }
    };

    // Write results to stdout
    if let Err(e) = write_accounts(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, owner, currency, from, to, amount`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    from: Option<i64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    to: Option<i64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
}

/// One replayable operation.
#[derive(Debug)]
enum Operation {
    /// Create an account with a zero balance.
    Open { owner: String, currency: Currency },
    /// Seed an account balance with a direct deposit.
    Fund { account: AccountId, amount: Decimal },
    /// Move funds between two accounts through the engine.
    Transfer(TransferRequest),
}

impl CsvRecord {
    /// Converts the CSV record to an operation.
    ///
    /// Returns `None` for unknown operations or missing required fields.
    fn into_operation(self) -> Option<Operation> {
        match self.op.to_lowercase().as_str() {
            "open" => {
                let owner = self.owner.filter(|owner| !owner.is_empty())?;
                let currency = self.currency?.parse().ok()?;
                Some(Operation::Open { owner, currency })
            }
            "fund" => {
                let account = AccountId(self.to?);
                let amount = self.amount?;
                Some(Operation::Fund { account, amount })
            }
            "transfer" => {
                let from = AccountId(self.from?);
                let to = AccountId(self.to?);
                let amount = self.amount?;
                let mut request = TransferRequest::new(from, to, amount);
                if let Some(code) = self.currency.filter(|code| !code.is_empty()) {
                    request = request.with_currency(code.parse().ok()?);
                }
                Some(Operation::Transfer(request))
            }
            _ => None,
        }
    }
}

/// Replay operations from a CSV reader.
///
/// Uses streaming parsing to handle arbitrarily large files without loading
/// everything into memory. Malformed rows and rejected operations are
/// skipped; skips are logged at debug level and never stop the replay.
///
/// # CSV Format
///
/// Expected columns: `op, owner, currency, from, to, amount`
/// - `op`: Operation (open, fund, transfer)
/// - `owner`: Account owner name (open only)
/// - `currency`: 3-letter code (open; optional expected currency on transfer)
/// - `from`: Source account id (transfer only)
/// - `to`: Account id (fund target, transfer destination)
/// - `amount`: Decimal amount (fund, transfer)
///
/// # Example
///
/// ```csv
/// op,owner,currency,from,to,amount
/// open,alice,USD,,,
/// open,bob,USD,,,
/// fund,,,,1,200.00
/// transfer,,,1,2,50.00
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn process_operations<R: Read>(reader: R) -> Result<Engine<MemoryStore>, csv::Error> {
    let engine = Engine::new(MemoryStore::new());

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All) // Handle whitespace in fields like " transfer "
        .flexible(true) // Allow short rows
        .has_headers(true) // Skip first row as header
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                // Skip malformed rows
                tracing::debug!("skipping malformed row: {e}");
                continue;
            }
        };

        let Some(operation) = record.into_operation() else {
            tracing::debug!("skipping invalid operation record");
            continue;
        };

        let outcome = match operation {
            Operation::Open { owner, currency } => engine
                .store()
                .create_account(&owner, currency)
                .map(|_| ()),
            Operation::Fund { account, amount } => {
                engine.store().deposit(account, amount).map(|_| ())
            }
            Operation::Transfer(request) => engine.execute(&request).map(|_| ()),
        };

        if let Err(e) = outcome {
            tracing::debug!("skipping rejected operation: {e}");
        }
    }

    Ok(engine)
}

/// Write final account states to a CSV writer.
///
/// # CSV Format
///
/// Columns: `id, owner, balance, currency, created_at`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_accounts<W: Write>(
    engine: &Engine<MemoryStore>,
    writer: W,
) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    // All accounts, in id order; the in-memory listing is infallible
    let accounts = engine.store().list_accounts(usize::MAX, 0).unwrap_or_default();
    for account in accounts {
        wtr.serialize(&account)?;
    }

    // Flush to ensure all data is written
    wtr.flush()?;
    Ok(())
}
