use serde::{Deserialize, Serialize};

/// Where and how to load the intersection geometry at startup
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntersectionConfig {
    /// File path or http(s) URL of the geometry document
    #[serde(default = "default_source")]
    pub source: String,

    /// HTTP attempts before giving up
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Delay between HTTP attempts (ms)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_source() -> String {
    "intersection.json".to_string()
}

fn default_attempts() -> u32 {
    10
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl IntersectionConfig {
    pub fn is_remote(&self) -> bool {
        self.source.starts_with("http://") || self.source.starts_with("https://")
    }
}

impl Default for IntersectionConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            attempts: default_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}
