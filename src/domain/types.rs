use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identifier of a prosumer's point of connection.
///
/// Request payloads may carry the id either as a JSON string or as an
/// integer; both are normalised to the same string key used by the topology.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ProsumerId(String);

impl ProsumerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ProsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProsumerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProsumerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for ProsumerId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for ProsumerId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => ProsumerId(s),
            RawId::Number(n) => ProsumerId(n.to_string()),
        })
    }
}
