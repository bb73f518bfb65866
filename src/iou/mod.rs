//! IOU Balance Core
//!
//! Pure reconstruction of pairwise net debt from transfer events:
//!
//! - **Addresses**: 20-byte identifiers ordered byte-wise
//! - **Pair keys**: canonical `(low, high)` keys with a direction sign
//! - **Balance table**: signed accumulation and directed queries
//!
//! Nothing in this module performs IO. Retrieval lives in [`crate::source`].

pub mod address;
pub mod error;
pub mod event;
pub mod ledger;
pub mod pair;

pub use address::Address;
pub use error::IouError;
pub use event::TransferEvent;
pub use ledger::{accumulate, query, BalanceTable, PairBalance};
pub use pair::{pair_key, Direction, PairKey};
