use serde::{Deserialize, Serialize};

/// Tunables for the event registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Reject empty keys on the write paths and point queries.
    pub reject_empty_keys: bool,
    /// Upper bound on the number of keys in one batch-array query.
    /// `None` leaves batch queries unbounded.
    pub max_query_keys: Option<usize>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            reject_empty_keys: true,
            max_query_keys: None,
        }
    }
}

impl RegistryConfig {
    /// A configuration that accepts any key and any batch size.
    pub fn permissive() -> Self {
        Self {
            reject_empty_keys: false,
            max_query_keys: None,
        }
    }
}
