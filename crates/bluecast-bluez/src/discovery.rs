//! The discovery engine
//!
//! `DeviceManager` owns one bus connection and one event-loop worker thread.
//! Startup is synchronous from the creator's point of view: enumeration runs
//! on the creating thread, then the worker subscribes to the object-manager
//! signals and brings up the advertisement before reporting success through a
//! one-shot handshake channel. The creator performs no engine bus operation
//! until it observes that success.
//!
//! Lifecycle: `Uninitialized → ConnectionEstablished → Enumerated →
//! SignalsSubscribed → Running → ShuttingDown → Stopped`. The intermediate
//! states exist only inside [`DeviceManager::create`]; a returned engine is
//! always `Running`, and `shutdown` (or drop) walks it to `Stopped`.

use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use zvariant::OwnedObjectPath;

use bluecast_bus::{
    BusConnection, BusError, EventLoop, LoopHandle, SignalArgs, SignalMessage,
    SignalSubscription, INTERFACES_ADDED, INTERFACES_REMOVED, OBJECT_MANAGER_INTERFACE,
};

use crate::advertisement::LeAdvertisement;
use crate::config::DiscoveryConfig;
use crate::error::{AdvertisementError, DiscoveryError};
use crate::registry::DeviceRegistry;

// ----------------------------------------------------------------------------
// Device Manager
// ----------------------------------------------------------------------------

/// Discovers the Bluetooth adapter and devices on the bus and keeps a local
/// advertisement published while running.
pub struct DeviceManager {
    connection: Arc<dyn BusConnection>,
    registry: Arc<Mutex<DeviceRegistry>>,
    loop_handle: LoopHandle,
    worker: Option<JoinHandle<()>>,
}

impl DeviceManager {
    /// Creates and fully initializes an engine. Any failure (connection,
    /// enumeration, subscription, or advertisement bring-up) aborts
    /// creation; a partially-initialized engine is never returned.
    pub fn create(
        connect: impl FnOnce() -> Result<Arc<dyn BusConnection>, BusError>,
        config: DiscoveryConfig,
    ) -> Result<Self, DiscoveryError> {
        let connection = connect().map_err(DiscoveryError::Connection)?;
        debug!("Bus connection established");

        let registry = Arc::new(Mutex::new(DeviceRegistry::new()));
        let tree = connection
            .get_managed_objects(&config.service, &config.object_root)
            .map_err(DiscoveryError::Enumeration)?;
        {
            let mut registry = registry.lock();
            for (path, interfaces) in &tree {
                registry.observe(path, interfaces);
            }
        }
        debug!("Enumerated {} bus objects", tree.len());

        let event_loop = EventLoop::new();
        let loop_handle = event_loop.handle();
        let (init_tx, init_rx) = mpsc::sync_channel(1);

        let worker = thread::Builder::new()
            .name("bluecast-events".to_string())
            .spawn({
                let connection = Arc::clone(&connection);
                let registry = Arc::clone(&registry);
                let config = config.clone();
                move || worker_main(event_loop, connection, registry, config, init_tx)
            })
            .map_err(DiscoveryError::WorkerSpawn)?;

        // The one-shot startup handshake: written at most once by the
        // worker, read exactly once here.
        match init_rx.recv_timeout(config.startup_timeout) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                loop_handle.quit();
                let _ = worker.join();
                return Err(err);
            }
            Err(RecvTimeoutError::Disconnected) => {
                loop_handle.quit();
                let _ = worker.join();
                return Err(DiscoveryError::WorkerExited);
            }
            Err(RecvTimeoutError::Timeout) => {
                loop_handle.quit();
                let _ = worker.join();
                return Err(DiscoveryError::StartupTimeout(config.startup_timeout));
            }
        }

        info!("Discovery engine running");
        Ok(Self {
            connection,
            registry,
            loop_handle,
            worker: Some(worker),
        })
    }

    /// Path of the recognized adapter, if enumeration or a later signal
    /// reported one
    pub fn adapter_path(&self) -> Option<OwnedObjectPath> {
        self.registry.lock().adapter_path().cloned()
    }

    /// Number of currently known devices
    pub fn device_count(&self) -> usize {
        self.registry.lock().device_count()
    }

    /// Paths of every currently known device
    pub fn device_paths(&self) -> Vec<OwnedObjectPath> {
        self.registry.lock().device_paths()
    }

    /// Stops the event loop, joins the worker, and only then lets go of the
    /// connection, so no handler ever observes a half-destroyed engine.
    /// Calling this twice is a no-op.
    pub fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            debug!("Shutting down discovery engine");
            self.loop_handle.quit();
            if worker.join().is_err() {
                error!("Event-loop worker panicked during shutdown");
            }
            debug!("Discovery engine stopped");
        }
    }

    /// The shared bus connection
    pub fn connection(&self) -> &Arc<dyn BusConnection> {
        &self.connection
    }
}

impl Drop for DeviceManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ----------------------------------------------------------------------------
// Worker Thread
// ----------------------------------------------------------------------------

/// Body of the event-loop thread. Subscribes, brings up the advertisement,
/// reports through the handshake, then blocks in the run loop until asked to
/// stop. Any failure before the loop starts is sent through `init_tx` and
/// the thread exits without running.
fn worker_main(
    event_loop: EventLoop,
    connection: Arc<dyn BusConnection>,
    registry: Arc<Mutex<DeviceRegistry>>,
    config: DiscoveryConfig,
    init_tx: SyncSender<Result<(), DiscoveryError>>,
) {
    let handle = event_loop.handle();

    let added = SignalSubscription {
        service: config.service.clone(),
        interface: OBJECT_MANAGER_INTERFACE.to_string(),
        member: INTERFACES_ADDED.to_string(),
        handler: {
            let registry = Arc::clone(&registry);
            Arc::new(move |message| on_interfaces_added(&registry, message))
        },
    };
    let added_id = match connection.subscribe_signal(added, &handle) {
        Ok(id) => id,
        Err(err) => {
            error!("InterfacesAdded subscription failed: {}", err);
            let _ = init_tx.send(Err(DiscoveryError::Subscription(err)));
            return;
        }
    };

    let removed = SignalSubscription {
        service: config.service.clone(),
        interface: OBJECT_MANAGER_INTERFACE.to_string(),
        member: INTERFACES_REMOVED.to_string(),
        handler: {
            let registry = Arc::clone(&registry);
            Arc::new(move |message| on_interfaces_removed(&registry, message))
        },
    };
    let removed_id = match connection.subscribe_signal(removed, &handle) {
        Ok(id) => id,
        Err(err) => {
            error!("InterfacesRemoved subscription failed: {}", err);
            connection.unsubscribe_signal(added_id);
            let _ = init_tx.send(Err(DiscoveryError::Subscription(err)));
            return;
        }
    };

    let advertisement = match bring_up_advertisement(&connection, &registry, &config, &handle) {
        Ok(advertisement) => advertisement,
        Err(err) => {
            error!("Advertisement bring-up failed: {}", err);
            connection.unsubscribe_signal(added_id);
            connection.unsubscribe_signal(removed_id);
            let _ = init_tx.send(Err(DiscoveryError::Advertisement(err)));
            return;
        }
    };

    let _ = init_tx.send(Ok(()));

    // The advertisement calls above were safe to issue from this thread
    // only because the loop was not yet running; from here on, handlers
    // must not make blocking outbound calls on this connection.
    event_loop.run();

    debug!("Event loop stopped, tearing down");
    advertisement.release();
    connection.unsubscribe_signal(added_id);
    connection.unsubscribe_signal(removed_id);
}

fn bring_up_advertisement(
    connection: &Arc<dyn BusConnection>,
    registry: &Arc<Mutex<DeviceRegistry>>,
    config: &DiscoveryConfig,
    handle: &LoopHandle,
) -> Result<LeAdvertisement, AdvertisementError> {
    let adapter_path = registry
        .lock()
        .adapter_path()
        .cloned()
        .ok_or(AdvertisementError::AdapterUnavailable)?;

    let advertisement =
        LeAdvertisement::export(Arc::clone(connection), handle, config, adapter_path)?;
    advertisement.advertise()?;
    Ok(advertisement)
}

// ----------------------------------------------------------------------------
// Signal Handlers
// ----------------------------------------------------------------------------

/// Runs on the event-loop thread for every `InterfacesAdded` delivery.
/// Malformed payloads are logged and dropped; the engine keeps running.
fn on_interfaces_added(registry: &Mutex<DeviceRegistry>, message: SignalMessage) {
    match message.args {
        SignalArgs::ObjectAdded { path, interfaces } => {
            debug!("Interfaces added on {}", path.as_str());
            registry.lock().observe(&path, &interfaces);
        }
        _ => {
            warn!("Dropping malformed {} payload", message.member);
        }
    }
}

/// Runs on the event-loop thread for every `InterfacesRemoved` delivery.
/// Removal is unconditional and idempotent.
fn on_interfaces_removed(registry: &Mutex<DeviceRegistry>, message: SignalMessage) {
    match message.args {
        SignalArgs::ObjectRemoved { path, .. } => {
            if registry.lock().remove(&path) {
                debug!("Device {} removed", path.as_str());
            }
        }
        _ => {
            warn!("Dropping malformed {} payload", message.member);
        }
    }
}
