//! BlueZ adapter discovery and LE advertisement publication
//!
//! Built on the generic framework in `bluecast-bus`: the engine enumerates
//! the daemon's object tree, classifies adapters and devices, tracks
//! add/remove notifications on a dedicated event-loop thread, and keeps a
//! local LE advertisement object published while it runs.
//!
//! ## Architecture
//!
//! - [`DeviceManager`] - the engine: enumeration, classification, the worker
//!   thread and its startup handshake, shutdown
//! - [`LeAdvertisement`] - the locally-published `LEAdvertisement1` object
//! - [`DeviceRegistry`] - first-wins adapter handle plus the device cache
//! - [`protocol`] - BlueZ bus names, method names, and fixed paths
//! - [`DiscoveryConfig`] - paths, local name, and startup timeout
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bluecast_bluez::{DeviceManager, DiscoveryConfig};
//! # use bluecast_harness::TestBus;
//!
//! # fn main() -> Result<(), bluecast_bluez::DiscoveryError> {
//! let config = DiscoveryConfig::new()
//!     .with_local_name("my-beacon".to_string());
//!
//! // A real deployment passes a connector for the system bus; tests hand
//! // out the in-memory bus from `bluecast-harness` instead.
//! # let bus = TestBus::new();
//! # let connector = bus.connector();
//! let mut manager = DeviceManager::create(connector, config)?;
//! println!("adapter: {:?}", manager.adapter_path());
//!
//! // The advertisement stays registered until shutdown (or drop).
//! manager.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod protocol;

mod advertisement;
mod config;
mod discovery;
mod error;
mod registry;

// Public API exports
pub use advertisement::{AdvertisementState, LeAdvertisement};
pub use config::DiscoveryConfig;
pub use discovery::DeviceManager;
pub use error::{AdvertisementError, DiscoveryError};
pub use registry::{DeviceRecord, DeviceRegistry};
