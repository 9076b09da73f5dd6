use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable 128-bit identifier naming one asset across the registry, the cache
/// and serialized registry files.
///
/// `AssetId::NULL` means "no asset". `Default` yields `NULL`, not a fresh id;
/// use [`AssetId::new`] to mint one.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(Uuid);

impl AssetId {
    pub const NULL: AssetId = AssetId(Uuid::nil());

    /// Generates a new random (v4) identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[inline]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[inline]
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0.is_nil()
    }

    #[inline]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl std::str::FromStr for AssetId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_null() {
        assert!(AssetId::default().is_null());
        assert_eq!(AssetId::default(), AssetId::NULL);
    }

    #[test]
    fn new_ids_are_unique_and_non_null() {
        let a = AssetId::new();
        let b = AssetId::new();
        assert!(!a.is_null());
        assert_ne!(a, b);
    }

    #[test]
    fn display_parses_back() {
        let id = AssetId::new();
        let parsed: AssetId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = AssetId::from_u128(0x1234);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000001234\"");
    }
}
