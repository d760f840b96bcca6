use serde::{Deserialize, Deserializer, Serialize};

/// A SHA-256 digest, always stored as 64 lowercase hex characters.
///
/// Deserializing validates the input so that an invalid checksum string in a
/// manifest or installed-record file is rejected at load time rather than
/// silently compared byte-for-byte later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Sha256Hex(String);

impl Sha256Hex {
    /// Build a validated digest, accepting an optional `sha256:` prefix.
    ///
    /// # Errors
    ///
    /// Returns an error string if the hex portion is not exactly 64 ASCII hex
    /// characters.
    pub fn validated(s: &str) -> Result<Self, String> {
        let hex = s.strip_prefix("sha256:").unwrap_or(s);
        if hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(hex.to_lowercase()))
        } else {
            Err(format!("invalid sha256 digest: '{s}'"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Sha256Hex {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::validated(&s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Sha256Hex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Sha256Hex {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Sha256Hex> for String {
    fn from(h: Sha256Hex) -> Self {
        h.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bare_hex() {
        let h = Sha256Hex::validated(&"a".repeat(64)).unwrap();
        assert_eq!(h.as_str(), "a".repeat(64));
    }

    #[test]
    fn accepts_prefixed_hex() {
        let h = Sha256Hex::validated(&format!("sha256:{}", "b".repeat(64))).unwrap();
        assert_eq!(h.as_str(), "b".repeat(64));
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Sha256Hex::validated("deadbeef").is_err());
    }

    #[test]
    fn rejects_non_hex() {
        assert!(Sha256Hex::validated(&"z".repeat(64)).is_err());
    }

    #[test]
    fn lowercases_on_validate() {
        let h = Sha256Hex::validated(&"A".repeat(64)).unwrap();
        assert_eq!(h.as_str(), "a".repeat(64));
    }
}
