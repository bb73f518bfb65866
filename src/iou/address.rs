//! 20-byte ledger account identifier.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::error::IouError;

/// Width of an address in bytes.
pub const ADDRESS_LEN: usize = 20;

/// Width of an ABI word in bytes.
pub const WORD_LEN: usize = 32;

/// Opaque account identifier.
///
/// Ordering is plain byte-wise comparison, independent of how the address
/// was cased when parsed (checksummed input included).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Address with every byte set to `byte`. Handy for fixtures.
    pub const fn repeat_byte(byte: u8) -> Self {
        Self([byte; ADDRESS_LEN])
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, IouError> {
        let arr: [u8; ADDRESS_LEN] = bytes.try_into().map_err(|_| {
            IouError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                ADDRESS_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Extract an address from a left-padded 32-byte ABI word.
    ///
    /// The 12 padding bytes must be zero.
    pub fn from_word(word: &[u8]) -> Result<Self, IouError> {
        if word.len() != WORD_LEN {
            return Err(IouError::InvalidAddress(format!(
                "ABI word must be {} bytes, got {}",
                WORD_LEN,
                word.len()
            )));
        }
        let (padding, body) = word.split_at(WORD_LEN - ADDRESS_LEN);
        if padding.iter().any(|b| *b != 0) {
            return Err(IouError::InvalidAddress(format!(
                "non-zero padding in address word 0x{}",
                hex::encode(word)
            )));
        }
        Self::from_slice(body)
    }

    /// Lowercase hex without the `0x` prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Address {
    type Err = IouError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != ADDRESS_LEN * 2 {
            return Err(IouError::InvalidAddress(format!(
                "'{}': expected {} hex digits",
                s,
                ADDRESS_LEN * 2
            )));
        }

        let bytes =
            hex::decode(digits).map_err(|e| IouError::InvalidAddress(format!("'{}': {}", s, e)))?;
        Self::from_slice(&bytes)
    }
}

impl From<[u8; ADDRESS_LEN]> for Address {
    fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_prefix_and_mixed_case() {
        let a: Address = "0x82A978B3f5962A5b0957d9ee9eEf472EE55B42F1".parse().unwrap();
        let b: Address = "82a978b3f5962a5b0957d9ee9eef472ee55b42f1".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "0x82a978b3f5962a5b0957d9ee9eef472ee55b42f1");
    }

    #[test]
    fn test_parse_rejects_wrong_length_and_bad_digits() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("0xzz2a978b3f5962a5b0957d9ee9eef472ee55b42f1"
            .parse::<Address>()
            .is_err());
    }

    #[test]
    fn test_ordering_matches_hex_text_ordering() {
        let lo: Address = "0x0aff000000000000000000000000000000000000".parse().unwrap();
        let hi: Address = "0x0b00000000000000000000000000000000000000".parse().unwrap();
        assert!(lo < hi);
        assert!(lo.to_hex() < hi.to_hex());
    }

    #[test]
    fn test_ordering_ignores_input_case() {
        let lower = "a0".to_string() + &"00".repeat(19);
        let upper = "B0".to_string() + &"00".repeat(19);
        // Raw checksummed text would sort these the other way round.
        assert!(lower > upper);

        let a: Address = format!("0x{}", lower).parse().unwrap();
        let b: Address = format!("0x{}", upper).parse().unwrap();
        assert!(a < b);
        assert_eq!(b, format!("0x{}", upper.to_lowercase()).parse::<Address>().unwrap());
        assert_eq!(
            crate::iou::pair_key(a, b).1,
            crate::iou::Direction::Forward
        );
    }

    #[test]
    fn test_from_word_takes_low_twenty_bytes() {
        let mut word = [0u8; WORD_LEN];
        word[12..].copy_from_slice(&[0x42; ADDRESS_LEN]);
        assert_eq!(Address::from_word(&word).unwrap(), Address::repeat_byte(0x42));

        word[0] = 1;
        assert!(Address::from_word(&word).is_err());
        assert!(Address::from_word(&word[..31]).is_err());
    }

    #[test]
    fn test_serde_uses_hex_string() {
        let a = Address::repeat_byte(0xab);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(20)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }
}
