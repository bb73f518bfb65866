//! IOU Ledger Library
//!
//! Reconstructs pairwise net IOU balances from the `Iou(address)` event
//! log of a ledger contract.
//!
//! - [`iou`]: pure balance core (addresses, pair keys, balance table)
//! - [`source`]: event retrieval (JSON-RPC and in-memory)
//! - [`book`]: full and incremental reconstruction
//! - [`config`]: TOML/env configuration

pub mod book;
pub mod config;
pub mod iou;
pub mod source;

pub use book::{reconstruct, IouBook};
pub use config::IouConfig;
pub use iou::{accumulate, query, Address, BalanceTable, IouError, PairKey, TransferEvent};
pub use source::{BlockRange, BlockTag, EventSource, MemoryEventSource, RpcEventSource};
