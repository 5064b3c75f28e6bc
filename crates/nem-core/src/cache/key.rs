use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 of the canonical JSON form of a query's structured parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Struct fields serialize in declaration order, so equal parameters
    /// always produce equal bytes.
    pub fn from_params<T: Serialize>(params: &T) -> Result<Self, serde_json::Error> {
        let bytes = serde_json::to_vec(params)?;
        Ok(Self::from_bytes(&bytes))
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        CacheKey(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for logs.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Params<'a> {
        dataset: &'a str,
        entities: Vec<&'a str>,
    }

    #[test]
    fn test_key_is_deterministic() {
        let a = CacheKey::from_params(&Params { dataset: "price", entities: vec!["NSW1"] }).unwrap();
        let b = CacheKey::from_params(&Params { dataset: "price", entities: vec!["NSW1"] }).unwrap();
        let c = CacheKey::from_params(&Params { dataset: "price", entities: vec!["VIC1"] }).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
        assert_eq!(a.short().len(), 12);
    }
}
