use serde::{Deserialize, Serialize};

use super::address::Address;
use super::pair::{pair_key, Direction, PairKey};

/// "`sender` owes `recipient` one unit."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferEvent {
    pub sender: Address,
    pub recipient: Address,
}

impl TransferEvent {
    pub fn new(sender: Address, recipient: Address) -> Self {
        Self { sender, recipient }
    }

    pub fn is_degenerate(&self) -> bool {
        self.sender == self.recipient
    }

    pub fn keyed(&self) -> (PairKey, Direction) {
        pair_key(self.sender, self.recipient)
    }
}
