//! Lookup client configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the annotation lookup client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupConfig {
    /// REST API base URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Species path segment used by the VEP endpoint.
    #[serde(default = "default_species")]
    pub species: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_endpoint() -> String {
    std::env::var("RSANNO_LOOKUP_ENDPOINT")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "https://rest.ensembl.org".to_string())
}

fn default_species() -> String {
    "human".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("rsannotate/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            species: default_species(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl LookupConfig {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}
