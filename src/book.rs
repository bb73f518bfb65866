//! Balance reconstruction over an event source.
//!
//! [`reconstruct`] rehydrates a table from scratch for one range.
//! [`IouBook`] keeps a table plus the last synced block and folds in only
//! the blocks mined since, which yields the same table as a full rebuild.

use std::sync::Arc;
use tracing::{debug, info};

use crate::iou::{Address, BalanceTable, IouError};
use crate::source::{BlockRange, BlockTag, EventSource};

/// Fetch every transfer in `range` and fold it into a fresh table.
pub async fn reconstruct<S>(
    source: &S,
    contract: &Address,
    range: BlockRange,
) -> Result<BalanceTable, IouError>
where
    S: EventSource + ?Sized,
{
    let events = source.fetch_events(contract, range).await?;
    let table = BalanceTable::accumulate(events);
    debug!(
        %range,
        events = table.event_count(),
        pairs = table.len(),
        "reconstructed balance table"
    );
    Ok(table)
}

/// Incrementally maintained balances for one contract.
pub struct IouBook {
    source: Arc<dyn EventSource>,
    contract: Address,
    start_block: u64,
    table: BalanceTable,
    synced_to: Option<u64>,
}

impl IouBook {
    pub fn new(source: Arc<dyn EventSource>, contract: Address, start_block: u64) -> Self {
        Self {
            source,
            contract,
            start_block,
            table: BalanceTable::new(),
            synced_to: None,
        }
    }

    pub fn contract(&self) -> &Address {
        &self.contract
    }

    pub fn table(&self) -> &BalanceTable {
        &self.table
    }

    /// Last block folded into the table, `None` before the first sync.
    pub fn synced_to(&self) -> Option<u64> {
        self.synced_to
    }

    pub fn query(&self, a: &Address, b: &Address) -> i64 {
        self.table.query(a, b)
    }

    /// Fold in blocks mined since the last sync. Returns the number of new
    /// transfers. On error the table and sync point are left unchanged.
    pub async fn sync(&mut self) -> Result<usize, IouError> {
        let latest = self.source.latest_block().await?;
        let from = self
            .synced_to
            .map(|b| b + 1)
            .unwrap_or(self.start_block);
        if from > latest {
            return Ok(0);
        }

        let events = self
            .source
            .fetch_events(&self.contract, BlockRange::new(from, BlockTag::Number(latest)))
            .await?;
        let count = events.len();
        self.table.apply(events);
        self.synced_to = Some(latest);

        info!(from, to = latest, new_transfers = count, "IOU book synced");
        Ok(count)
    }

    /// Drop all state and rehydrate from `start_block`.
    pub async fn rebuild(&mut self) -> Result<&BalanceTable, IouError> {
        let latest = self.source.latest_block().await?;
        let table = if self.start_block > latest {
            BalanceTable::new()
        } else {
            reconstruct(
                self.source.as_ref(),
                &self.contract,
                BlockRange::between(self.start_block, latest),
            )
            .await?
        };
        self.table = table;
        self.synced_to = Some(latest);
        Ok(&self.table)
    }
}
