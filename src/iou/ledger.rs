//! Signed Pairwise Balance Table
//!
//! Folds a sequence of [`TransferEvent`]s into net balances per unordered
//! address pair. Each event adds `+1` to its pair when `sender < recipient`
//! and `-1` otherwise, so the stored value is the net flow from the low
//! address toward the high one.
//!
//! # Invariants
//!
//! 1. **Antisymmetry**: `query(a, b) == -query(b, a)`
//! 2. **Order-insensitivity**: any permutation of the input yields the same table
//! 3. **Zero default**: pairs without events read as `0`
//!
//! Building a table consumes the whole input first; `query` only takes
//! `&BalanceTable`, so a table is never read while it is being written.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use super::address::Address;
use super::error::IouError;
use super::event::TransferEvent;
use super::pair::{pair_key, PairKey};

/// Net balance per canonical pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceTable {
    balances: BTreeMap<PairKey, i64>,
    event_count: u64,
}

/// One non-zero pair, oriented so that `amount` is positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairBalance {
    pub debtor: Address,
    pub creditor: Address,
    pub amount: i64,
}

impl BalanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from scratch. Equal-address events follow the raw
    /// direction rule (`-1` on a collapsed key) and are logged.
    pub fn accumulate<I>(events: I) -> Self
    where
        I: IntoIterator<Item = TransferEvent>,
    {
        let mut table = Self::new();
        table.apply(events);
        table
    }

    /// Like [`accumulate`](Self::accumulate) but rejects equal-address events.
    pub fn try_accumulate<I>(events: I) -> Result<Self, IouError>
    where
        I: IntoIterator<Item = TransferEvent>,
    {
        let mut table = Self::new();
        table.try_apply(events)?;
        Ok(table)
    }

    /// Fold another batch into an existing table.
    pub fn apply<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = TransferEvent>,
    {
        for event in events {
            if event.is_degenerate() {
                warn!(address = %event.sender, "transfer with identical sender and recipient");
            }
            self.record(&event);
        }
    }

    /// Checked batch fold. The batch is validated before anything is
    /// applied, so a rejected batch leaves the table untouched.
    pub fn try_apply<I>(&mut self, events: I) -> Result<(), IouError>
    where
        I: IntoIterator<Item = TransferEvent>,
    {
        let batch: Vec<TransferEvent> = events.into_iter().collect();
        if let Some(bad) = batch.iter().find(|e| e.is_degenerate()) {
            return Err(IouError::DegeneratePair(bad.sender));
        }
        for event in &batch {
            self.record(event);
        }
        Ok(())
    }

    fn record(&mut self, event: &TransferEvent) {
        let (key, direction) = event.keyed();
        *self.balances.entry(key).or_insert(0) += direction.sign();
        self.event_count += 1;
    }

    /// Net amount `a` owes `b`. Negative means `b` owes `a`.
    pub fn query(&self, a: &Address, b: &Address) -> i64 {
        let (key, direction) = pair_key(*a, *b);
        self.balance(&key) * direction.sign()
    }

    pub fn try_query(&self, a: &Address, b: &Address) -> Result<i64, IouError> {
        if a == b {
            return Err(IouError::DegeneratePair(*a));
        }
        Ok(self.query(a, b))
    }

    /// Raw accumulator for a key (low → high flow).
    pub fn balance(&self, key: &PairKey) -> i64 {
        self.balances.get(key).copied().unwrap_or(0)
    }

    /// Number of pairs touched by at least one event, including settled ones.
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PairKey, i64)> + '_ {
        self.balances.iter().map(|(k, v)| (k, *v))
    }

    /// Pairs with a non-zero balance, debtor first.
    pub fn open_pairs(&self) -> Vec<PairBalance> {
        self.iter()
            .filter(|(_, v)| *v != 0)
            .map(|(key, v)| {
                if v > 0 {
                    PairBalance {
                        debtor: key.low(),
                        creditor: key.high(),
                        amount: v,
                    }
                } else {
                    PairBalance {
                        debtor: key.high(),
                        creditor: key.low(),
                        amount: -v,
                    }
                }
            })
            .collect()
    }

    /// `(counterparty, query(addr, counterparty))` for every pair involving `addr`.
    pub fn exposures(&self, addr: &Address) -> Vec<(Address, i64)> {
        self.balances
            .keys()
            .filter_map(|key| key.counterparty(addr))
            .filter(|other| other != addr)
            .map(|other| (other, self.query(addr, &other)))
            .collect()
    }

    /// Total `addr` owes across all counterparties, net of what it is owed.
    pub fn net_position(&self, addr: &Address) -> i64 {
        self.exposures(addr).iter().map(|(_, v)| v).sum()
    }
}

/// Build a [`BalanceTable`] from an event sequence.
pub fn accumulate<I>(events: I) -> BalanceTable
where
    I: IntoIterator<Item = TransferEvent>,
{
    BalanceTable::accumulate(events)
}

/// Directed balance: how much `a` owes `b`.
pub fn query(table: &BalanceTable, a: &Address, b: &Address) -> i64 {
    table.query(a, b)
}
