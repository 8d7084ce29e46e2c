//! Discovery engine configuration

use std::time::Duration;

use crate::protocol::{BLUEZ_SERVICE, DEFAULT_ADVERTISEMENT_PATH, OBJECT_ROOT_PATH};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the discovery engine and the advertisement it publishes
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DiscoveryConfig {
    /// Well-known bus name of the Bluetooth daemon
    pub service: String,
    /// Root path enumerated at startup
    pub object_root: String,
    /// Path the local advertisement object is exported at
    pub advertisement_path: String,
    /// Local name announced in the advertisement
    pub local_name: String,
    /// Service UUIDs announced in the advertisement, if any
    pub service_uuids: Vec<String>,
    /// Maximum time to wait for the event-loop worker to report startup
    pub startup_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            service: BLUEZ_SERVICE.to_string(),
            object_root: OBJECT_ROOT_PATH.to_string(),
            advertisement_path: DEFAULT_ADVERTISEMENT_PATH.to_string(),
            local_name: "bluecast".to_string(),
            service_uuids: Vec::new(),
            startup_timeout: Duration::from_secs(10),
        }
    }
}

impl DiscoveryConfig {
    /// Create a new configuration with custom settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bus service name to discover against
    pub fn with_service(mut self, service: String) -> Self {
        self.service = service;
        self
    }

    /// Set the root path enumerated at startup
    pub fn with_object_root(mut self, root: String) -> Self {
        self.object_root = root;
        self
    }

    /// Set the advertisement object path
    pub fn with_advertisement_path(mut self, path: String) -> Self {
        self.advertisement_path = path;
        self
    }

    /// Set the advertised local name
    pub fn with_local_name(mut self, name: String) -> Self {
        self.local_name = name;
        self
    }

    /// Set the advertised service UUIDs
    pub fn with_service_uuids(mut self, uuids: Vec<String>) -> Self {
        self.service_uuids = uuids;
        self
    }

    /// Set the startup handshake timeout
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }
}
