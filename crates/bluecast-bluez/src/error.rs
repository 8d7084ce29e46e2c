//! Error types for the discovery engine

use std::time::Duration;

use bluecast_bus::BusError;
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Fatal failures of engine startup. Every variant aborts
/// [`DeviceManager::create`](crate::DeviceManager::create); no
/// partially-initialized engine is ever returned.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("bus connection failed: {0}")]
    Connection(#[source] BusError),

    #[error("object enumeration failed: {0}")]
    Enumeration(#[source] BusError),

    #[error("signal subscription failed: {0}")]
    Subscription(#[source] BusError),

    #[error("advertisement bring-up failed: {0}")]
    Advertisement(#[from] AdvertisementError),

    #[error("failed to spawn the event-loop worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("event-loop worker exited before reporting startup")]
    WorkerExited,

    #[error("event-loop worker did not report startup within {0:?}")]
    StartupTimeout(Duration),
}

/// Errors specific to the published advertisement object
#[derive(Error, Debug)]
pub enum AdvertisementError {
    #[error("no adapter available to register the advertisement with")]
    AdapterUnavailable,

    #[error("failed to export the advertisement object: {0}")]
    Export(#[source] BusError),

    #[error("advertisement registration rejected: {0}")]
    Register(#[source] BusError),

    #[error("advertisement slot already released")]
    Released,
}
