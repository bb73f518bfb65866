//! Event Source Adapters
//!
//! Retrieve `Iou(address _to)` logs for a contract and decode them into
//! ordered [`TransferEvent`]s. The sender is the originating account of the
//! emitting transaction; the recipient is the log's single argument.
//!
//! - [`RpcEventSource`]: JSON-RPC (`eth_getLogs` + `eth_getTransactionByHash`)
//! - [`MemoryEventSource`]: in-process chain for tests and demos

pub mod memory;
pub mod rpc;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::iou::{Address, IouError, TransferEvent};

pub use memory::MemoryEventSource;
pub use rpc::RpcEventSource;

/// `keccak256("Iou(address)")`
pub const IOU_EVENT_TOPIC: &str =
    "0x27addab81b9f89202f08b74b37e8e261cef6e9efdc7ecc014404d77769ea524a";

// =============================================================================
// Block range
// =============================================================================

/// Upper bound of a block range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "BlockTagRepr", into = "BlockTagRepr")]
pub enum BlockTag {
    /// Most recent block known to the source at retrieval time.
    #[default]
    Latest,
    Number(u64),
}

/// Serialized form of [`BlockTag`]: a bare number or `"latest"`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockTagRepr {
    Number(u64),
    Text(String),
}

impl TryFrom<BlockTagRepr> for BlockTag {
    type Error = IouError;

    fn try_from(repr: BlockTagRepr) -> Result<Self, Self::Error> {
        match repr {
            BlockTagRepr::Number(n) => Ok(Self::Number(n)),
            BlockTagRepr::Text(s) => s.parse(),
        }
    }
}

impl From<BlockTag> for BlockTagRepr {
    fn from(tag: BlockTag) -> Self {
        match tag {
            BlockTag::Latest => Self::Text("latest".to_string()),
            BlockTag::Number(n) => Self::Number(n),
        }
    }
}

impl FromStr for BlockTag {
    type Err = IouError;

    /// Accepts `latest`, decimal, or `0x` hex.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("latest") {
            return Ok(Self::Latest);
        }
        let parsed = match s.strip_prefix("0x") {
            Some(digits) => u64::from_str_radix(digits, 16),
            None => s.parse(),
        };
        parsed
            .map(Self::Number)
            .map_err(|_| IouError::InvalidConfig(format!("invalid block tag '{}'", s)))
    }
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Inclusive block range `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockRange {
    pub from: u64,
    pub to: BlockTag,
}

impl BlockRange {
    pub fn new(from: u64, to: BlockTag) -> Self {
        Self { from, to }
    }

    /// Everything from genesis to the latest block.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn since(from: u64) -> Self {
        Self::new(from, BlockTag::Latest)
    }

    pub fn between(from: u64, to: u64) -> Self {
        Self::new(from, BlockTag::Number(to))
    }

    /// Concrete bounds given the source's latest block.
    ///
    /// An explicit upper bound below `from` is an invalid range. An open
    /// range that starts past the head is simply empty.
    pub fn resolve(&self, latest: u64) -> Result<Option<(u64, u64)>, IouError> {
        match self.to {
            BlockTag::Number(to) if to < self.from => Err(IouError::retrieval(format!(
                "invalid block range: from {} > to {}",
                self.from, to
            ))),
            BlockTag::Number(to) => Ok(Some((self.from, to))),
            BlockTag::Latest if self.from > latest => Ok(None),
            BlockTag::Latest => Ok(Some((self.from, latest))),
        }
    }

    pub fn needs_head(&self) -> bool {
        self.to == BlockTag::Latest
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}

// =============================================================================
// Decoded transfer with provenance
// =============================================================================

/// A decoded transfer plus where it came from. Only `event` feeds the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransfer {
    pub event: TransferEvent,
    pub block_number: u64,
    pub transaction_index: u64,
    pub log_index: u64,
    pub transaction_hash: String,
}

impl RawTransfer {
    /// Chronological sort key: block, then intra-block emission order.
    pub fn position(&self) -> (u64, u64, u64) {
        (self.block_number, self.transaction_index, self.log_index)
    }
}

// =============================================================================
// Source trait
// =============================================================================

#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    /// Most recent block the source knows about.
    async fn latest_block(&self) -> Result<u64, IouError>;

    /// All transfers emitted by `contract` within `range`, in chronological
    /// order. Either the whole range is returned or an error.
    async fn fetch_transfers(
        &self,
        contract: &Address,
        range: BlockRange,
    ) -> Result<Vec<RawTransfer>, IouError>;

    async fn fetch_events(
        &self,
        contract: &Address,
        range: BlockRange,
    ) -> Result<Vec<TransferEvent>, IouError> {
        let transfers = self.fetch_transfers(contract, range).await?;
        Ok(transfers.into_iter().map(|t| t.event).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_tag_parsing() {
        assert_eq!("latest".parse::<BlockTag>().unwrap(), BlockTag::Latest);
        assert_eq!("LATEST".parse::<BlockTag>().unwrap(), BlockTag::Latest);
        assert_eq!("42".parse::<BlockTag>().unwrap(), BlockTag::Number(42));
        assert_eq!("0x2a".parse::<BlockTag>().unwrap(), BlockTag::Number(42));
        assert!("pending".parse::<BlockTag>().is_err());
    }

    #[test]
    fn test_block_tag_serde_accepts_number_or_text() {
        let tag: BlockTag = serde_json::from_str("\"latest\"").unwrap();
        assert_eq!(tag, BlockTag::Latest);
        let tag: BlockTag = serde_json::from_str("17").unwrap();
        assert_eq!(tag, BlockTag::Number(17));
        assert_eq!(serde_json::to_string(&BlockTag::Latest).unwrap(), "\"latest\"");
    }

    #[test]
    fn test_range_resolution() {
        assert_eq!(BlockRange::all().resolve(10).unwrap(), Some((0, 10)));
        assert_eq!(BlockRange::since(11).resolve(10).unwrap(), None);
        assert_eq!(BlockRange::between(3, 5).resolve(1).unwrap(), Some((3, 5)));

        let err = BlockRange::between(6, 5).resolve(10).unwrap_err();
        assert!(err.is_retrieval());
    }
}
