//! Serde adapters for key material in config files.

/// `#[serde(with = "hex_bytes")]` for byte vectors written as hex text.
/// Reading accepts surrounding whitespace and an optional `0x` prefix.
pub mod hex_bytes {
    use serde::de::Error as DeError;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        let trimmed = text.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        hex::decode(digits).map_err(|e| D::Error::custom(format!("invalid hex key {:?}: {}", trimmed, e)))
    }
}
