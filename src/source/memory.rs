//! In-memory IOU chain.
//!
//! Each [`submit_transfer`](MemoryEventSource::submit_transfer) mines one
//! block holding one transaction; [`submit_block`](MemoryEventSource::submit_block)
//! packs several transactions into a single block.

use parking_lot::RwLock;
use tracing::debug;

use super::{BlockRange, EventSource, RawTransfer};
use crate::iou::{Address, IouError, TransferEvent};

#[derive(Debug, Default)]
struct MemoryChain {
    head: u64,
    tx_seq: u64,
    logs: Vec<(Address, RawTransfer)>,
    unavailable: bool,
}

/// Event source backed by a local log, mirroring the ledger's write path.
#[derive(Debug, Default)]
pub struct MemoryEventSource {
    chain: RwLock<MemoryChain>,
}

impl MemoryEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `sender` acknowledging one unit owed to `recipient` in a new block.
    pub fn submit_transfer(
        &self,
        contract: &Address,
        sender: Address,
        recipient: Address,
    ) -> RawTransfer {
        let mut mined = self.submit_block(contract, &[(sender, recipient)]);
        mined.remove(0)
    }

    /// Mine one block containing the given transfers in order.
    pub fn submit_block(
        &self,
        contract: &Address,
        transfers: &[(Address, Address)],
    ) -> Vec<RawTransfer> {
        let mut chain = self.chain.write();
        chain.head += 1;
        let block_number = chain.head;

        let mut mined = Vec::with_capacity(transfers.len());
        for (tx_index, (sender, recipient)) in transfers.iter().enumerate() {
            chain.tx_seq += 1;
            let raw = RawTransfer {
                event: TransferEvent::new(*sender, *recipient),
                block_number,
                transaction_index: tx_index as u64,
                log_index: tx_index as u64,
                transaction_hash: format!("0x{:064x}", chain.tx_seq),
            };
            chain.logs.push((*contract, raw.clone()));
            mined.push(raw);
        }

        debug!(block = block_number, txs = mined.len(), "mined memory block");
        mined
    }

    /// Advance the head without emitting anything.
    pub fn mine_empty_block(&self) -> u64 {
        let mut chain = self.chain.write();
        chain.head += 1;
        chain.head
    }

    /// Make every retrieval call fail until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.chain.write().unavailable = unavailable;
    }
}

#[async_trait::async_trait]
impl EventSource for MemoryEventSource {
    async fn latest_block(&self) -> Result<u64, IouError> {
        let chain = self.chain.read();
        if chain.unavailable {
            return Err(IouError::retrieval("memory source unavailable"));
        }
        Ok(chain.head)
    }

    async fn fetch_transfers(
        &self,
        contract: &Address,
        range: BlockRange,
    ) -> Result<Vec<RawTransfer>, IouError> {
        let chain = self.chain.read();
        if chain.unavailable {
            return Err(IouError::retrieval("memory source unavailable"));
        }

        let Some((from, to)) = range.resolve(chain.head)? else {
            return Ok(Vec::new());
        };

        let mut transfers: Vec<RawTransfer> = chain
            .logs
            .iter()
            .filter(|(emitter, raw)| {
                emitter == contract && raw.block_number >= from && raw.block_number <= to
            })
            .map(|(_, raw)| raw.clone())
            .collect();
        transfers.sort_by_key(|t| t.position());
        Ok(transfers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::BlockTag;

    fn k(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    #[tokio::test]
    async fn test_range_and_contract_filtering() {
        let contract = k(0xc0);
        let other = k(0xc1);
        let source = MemoryEventSource::new();

        source.submit_transfer(&contract, k(1), k(2)); // block 1
        source.submit_transfer(&other, k(1), k(2)); // block 2
        source.submit_block(&contract, &[(k(2), k(3)), (k(3), k(1))]); // block 3
        source.mine_empty_block(); // block 4

        assert_eq!(source.latest_block().await.unwrap(), 4);

        let all = source
            .fetch_transfers(&contract, BlockRange::all())
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].position(), (3, 0, 0));
        assert_eq!(all[2].position(), (3, 1, 1));

        let tail = source
            .fetch_events(&contract, BlockRange::new(2, BlockTag::Number(3)))
            .await
            .unwrap();
        assert_eq!(
            tail,
            vec![TransferEvent::new(k(2), k(3)), TransferEvent::new(k(3), k(1))]
        );

        let past_head = source
            .fetch_events(&contract, BlockRange::since(5))
            .await
            .unwrap();
        assert!(past_head.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_source_errors() {
        let source = MemoryEventSource::new();
        source.set_unavailable(true);
        let err = source
            .fetch_events(&k(0xc0), BlockRange::all())
            .await
            .unwrap_err();
        assert!(err.is_retrieval());

        source.set_unavailable(false);
        assert!(source.latest_block().await.is_ok());
    }
}
