//! btleplug adapter configuration.

use std::time::Duration;

use serde::Deserialize;

/// Selects the host adapter and bounds device lookups.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BtleplugConfig {
    /// Index into the adapters reported by the host, in enumeration order.
    pub adapter_index: usize,
    /// How long `open_device` scans for an address the adapter has not seen
    /// yet, in seconds.
    pub lookup_timeout_secs: u16,
}

impl BtleplugConfig {
    #[must_use]
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.lookup_timeout_secs))
    }
}

impl Default for BtleplugConfig {
    fn default() -> Self {
        Self {
            adapter_index: 0,
            lookup_timeout_secs: 10,
        }
    }
}
