//! Net worth snapshot built from one pair of broker statements
//!
//! Only the most recent snapshot is kept. A new import replaces it and a
//! reset clears it; there is no history.

use crate::pdf_import::trade_republic::{Holding, ParsedCashStatement, ParsedSecuritiesStatement};
use crate::pdf_import::ParseWarning;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

/// A holding as shown in the snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub name: String,
    pub isin: String,
    pub quantity: f64,
    pub market_value: f64,
}

impl From<Holding> for Position {
    fn from(holding: Holding) -> Self {
        Self {
            name: holding.name,
            isin: holding.identifier,
            quantity: holding.quantity,
            market_value: holding.market_value,
        }
    }
}

/// Cash plus securities for one import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub cash_eur: f64,
    pub securities_eur: f64,
    pub total_eur: f64,
    pub positions: Vec<Position>,
    /// False when the securities parser had to default something
    pub complete: bool,
    pub warnings: Vec<ParseWarning>,
    pub imported_at: DateTime<Utc>,
}

impl AggregateSnapshot {
    /// Combine both statements. The securities total is taken as reported,
    /// it is not reconciled against the positions.
    pub fn from_statements(
        cash: ParsedCashStatement,
        securities: ParsedSecuritiesStatement,
    ) -> Self {
        let ParsedSecuritiesStatement {
            total_value,
            holdings,
            warnings,
        } = securities;

        Self {
            cash_eur: cash.balance,
            securities_eur: total_value,
            total_eur: cash.balance + total_value,
            positions: holdings.into_iter().map(Position::from).collect(),
            complete: warnings.is_empty(),
            warnings,
            imported_at: Utc::now(),
        }
    }
}

/// Holds the current snapshot for whoever serves it
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: Mutex<Option<AggregateSnapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    // The slot is only ever written whole, so a poisoned lock is still usable.
    fn slot(&self) -> MutexGuard<'_, Option<AggregateSnapshot>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store a new snapshot and return the one it replaced
    pub fn replace(&self, snapshot: AggregateSnapshot) -> Option<AggregateSnapshot> {
        log::info!(
            "Snapshot: Stored total {:.2} EUR ({} positions)",
            snapshot.total_eur,
            snapshot.positions.len()
        );
        self.slot().replace(snapshot)
    }

    pub fn current(&self) -> Option<AggregateSnapshot> {
        self.slot().clone()
    }

    /// Drop the current snapshot. Returns whether there was one.
    pub fn clear(&self) -> bool {
        let had_snapshot = self.slot().take().is_some();
        if had_snapshot {
            log::info!("Snapshot: Cleared");
        }
        had_snapshot
    }
}
