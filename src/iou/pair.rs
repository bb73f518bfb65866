//! Canonical keying of unordered address pairs.
//!
//! Both accumulation and query derive key and direction through
//! [`pair_key`], so `query(a, b) == -query(b, a)` holds by construction.

use serde::{Deserialize, Serialize};

use super::address::Address;

/// Order-independent key for a pair of addresses: `(low, high)` by byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
    low: Address,
    high: Address,
}

impl PairKey {
    pub fn new(a: Address, b: Address) -> Self {
        pair_key(a, b).0
    }

    pub fn low(&self) -> Address {
        self.low
    }

    pub fn high(&self) -> Address {
        self.high
    }

    pub fn is_degenerate(&self) -> bool {
        self.low == self.high
    }

    pub fn contains(&self, addr: &Address) -> bool {
        self.low == *addr || self.high == *addr
    }

    /// The other side of the pair, if `addr` is one of its members.
    pub fn counterparty(&self, addr: &Address) -> Option<Address> {
        if self.low == *addr {
            Some(self.high)
        } else if self.high == *addr {
            Some(self.low)
        } else {
            None
        }
    }
}

/// Which canonical ordering an `(a, b)` pair reinforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// `a < b`: flow from the low address toward the high address.
    Forward,
    /// `a >= b`.
    Reverse,
}

impl Direction {
    pub fn sign(self) -> i64 {
        match self {
            Self::Forward => 1,
            Self::Reverse => -1,
        }
    }
}

/// Normalize `(a, b)` into its pair key and the direction of `a` relative to `b`.
///
/// Equal addresses fall through to `Reverse` with a collapsed key.
pub fn pair_key(a: Address, b: Address) -> (PairKey, Direction) {
    if a < b {
        (PairKey { low: a, high: b }, Direction::Forward)
    } else {
        (PairKey { low: b, high: a }, Direction::Reverse)
    }
}
