//! Adapter and device bookkeeping
//!
//! The registry is an internal cache: enumeration and the object-manager
//! signals feed it, the engine's read-only accessors drain it. Callers hold
//! the registry's exclusive lock only for the duration of a mutation and
//! never perform I/O while holding it.

use std::collections::HashMap;
use std::time::Instant;

use zvariant::OwnedObjectPath;

use bluecast_bus::InterfaceMap;

use crate::protocol::{ADAPTER_INTERFACE, DEVICE_INTERFACE};

// ----------------------------------------------------------------------------
// Device Records
// ----------------------------------------------------------------------------

/// State kept for one known remote device
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    /// Interfaces the device path implements
    pub interfaces: Vec<String>,
    /// When the device was last reported by the bus
    pub last_seen: Instant,
}

impl DeviceRecord {
    fn new(interfaces: &InterfaceMap) -> Self {
        Self {
            interfaces: interfaces.keys().cloned().collect(),
            last_seen: Instant::now(),
        }
    }

    fn refresh(&mut self, interfaces: &InterfaceMap) {
        self.interfaces = interfaces.keys().cloned().collect();
        self.last_seen = Instant::now();
    }
}

// ----------------------------------------------------------------------------
// Registry
// ----------------------------------------------------------------------------

/// Known adapter and devices, as reported by enumeration and the
/// object-manager signals.
///
/// The adapter slot is first-wins: once set it is never overwritten, no
/// matter what later enumeration or signals report.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    adapter: Option<OwnedObjectPath>,
    devices: HashMap<OwnedObjectPath, DeviceRecord>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies one path and its interfaces. The first path seen with the
    /// adapter interface becomes the adapter; every path with the device
    /// interface gets a record (existing records are refreshed, not
    /// duplicated).
    pub fn observe(&mut self, path: &OwnedObjectPath, interfaces: &InterfaceMap) {
        if self.adapter.is_none() && interfaces.contains_key(ADAPTER_INTERFACE) {
            self.adapter = Some(path.clone());
        }
        if interfaces.contains_key(DEVICE_INTERFACE) {
            match self.devices.get_mut(path) {
                Some(record) => record.refresh(interfaces),
                None => {
                    self.devices.insert(path.clone(), DeviceRecord::new(interfaces));
                }
            }
        }
    }

    /// Removes a device. Removing an absent path is a no-op, not an error;
    /// returns whether a record was actually dropped.
    pub fn remove(&mut self, path: &OwnedObjectPath) -> bool {
        self.devices.remove(path).is_some()
    }

    /// Path of the recognized adapter, if one was seen
    pub fn adapter_path(&self) -> Option<&OwnedObjectPath> {
        self.adapter.as_ref()
    }

    /// Number of known devices
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Whether a device record exists for `path`
    pub fn contains_device(&self, path: &OwnedObjectPath) -> bool {
        self.devices.contains_key(path)
    }

    /// Paths of every known device, in no particular order
    pub fn device_paths(&self) -> Vec<OwnedObjectPath> {
        self.devices.keys().cloned().collect()
    }
}
