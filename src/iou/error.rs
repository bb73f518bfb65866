use super::address::Address;

/// Errors raised while retrieving, decoding or folding IOU events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IouError {
    /// The ledger service could not be reached, answered with an RPC error,
    /// or the requested block range is invalid.
    Retrieval(String),
    /// A transaction or log in range could not be decoded into exactly one
    /// transfer.
    MalformedEvent { tx_hash: String, reason: String },
    /// Sender and recipient (or both query sides) are the same address.
    DegeneratePair(Address),
    InvalidAddress(String),
    InvalidConfig(String),
}

impl IouError {
    pub fn retrieval(msg: impl Into<String>) -> Self {
        Self::Retrieval(msg.into())
    }

    pub fn malformed(tx_hash: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedEvent {
            tx_hash: tx_hash.into(),
            reason: reason.into(),
        }
    }

    pub fn is_retrieval(&self) -> bool {
        matches!(self, Self::Retrieval(_))
    }
}

impl std::fmt::Display for IouError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Retrieval(msg) => write!(f, "event retrieval failed: {}", msg),
            Self::MalformedEvent { tx_hash, reason } => {
                write!(f, "malformed transfer event in tx {}: {}", tx_hash, reason)
            }
            Self::DegeneratePair(addr) => {
                write!(f, "degenerate pair: {} on both sides", addr)
            }
            Self::InvalidAddress(msg) => write!(f, "invalid address: {}", msg),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for IouError {}

impl From<reqwest::Error> for IouError {
    fn from(err: reqwest::Error) -> Self {
        Self::Retrieval(err.to_string())
    }
}
