//! The locally-published LE advertisement object
//!
//! One object, exported at a fixed path, implementing
//! `org.bluez.LEAdvertisement1` plus the standard properties-read surface.
//! The platform's advertising manager is told about it with an outbound
//! `RegisterAdvertisement` call; the inverse `UnregisterAdvertisement` runs
//! on local teardown, and the platform can reclaim the slot at any time by
//! calling `Release` on the object.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use zvariant::{OwnedObjectPath, OwnedValue, Value};

use bluecast_bus::{
    dict_value, object_path, path_value, string_arg, string_value, BusConnection, LoopHandle,
    MethodCall, ObjectDispatcher, ERROR_INVALID_ARGS, GET_ALL,
};

use crate::config::DiscoveryConfig;
use crate::error::AdvertisementError;
use crate::protocol::{
    ADVERTISEMENT_TYPE_PERIPHERAL, LE_ADVERTISING_MANAGER_INTERFACE, PROPERTY_LOCAL_NAME,
    PROPERTY_SERVICE_UUIDS, PROPERTY_TYPE, REGISTER_ADVERTISEMENT, RELEASE,
    UNREGISTER_ADVERTISEMENT,
};

/// Introspection document for the advertisement object, supplied once at
/// registration and never regenerated.
const ADVERTISEMENT_INTROSPECTION_XML: &str = r#"<!DOCTYPE node PUBLIC "-//freedesktop//DTD D-BUS Object Introspection 1.0//EN"
"http://www.freedesktop.org/standards/dbus/1.0/introspect.dtd">
<node>
 <interface name="org.bluez.LEAdvertisement1">
  <method name="Release"/>
  <property name="Type" type="s" access="read"/>
 </interface>
 <interface name="org.freedesktop.DBus.Properties">
  <method name="GetAll">
   <arg name="InterfaceName" direction="in" type="s"/>
   <arg name="properties" direction="out" type="a{sv}"/>
  </method>
 </interface>
</node>"#;

// ----------------------------------------------------------------------------
// Advertisement State
// ----------------------------------------------------------------------------

/// Lifecycle of the advertisement object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertisementState {
    /// Not yet exported on the bus
    Unregistered,
    /// Exported on the bus, not yet announced to the advertising manager
    BusRegistered,
    /// Announced to the advertising manager
    AdvertisingRegistered,
    /// Slot reclaimed by the platform or torn down locally
    Released,
}

// ----------------------------------------------------------------------------
// Advertisement Object
// ----------------------------------------------------------------------------

/// LE advertisement published on the bus.
///
/// Only `Release` arrives inbound; it transitions to
/// [`AdvertisementState::Released`] and never re-advertises on its own.
/// Dropping the object tears it down the same way [`release`](Self::release)
/// does.
pub struct LeAdvertisement {
    connection: Arc<dyn BusConnection>,
    service: String,
    path: OwnedObjectPath,
    adapter_path: OwnedObjectPath,
    local_name: String,
    service_uuids: Vec<String>,
    state: Arc<Mutex<AdvertisementState>>,
}

impl LeAdvertisement {
    /// Builds the handler table and exports the object at the configured
    /// advertisement path. On failure nothing is left registered and the
    /// caller must abort startup.
    pub fn export(
        connection: Arc<dyn BusConnection>,
        dispatch: &LoopHandle,
        config: &DiscoveryConfig,
        adapter_path: OwnedObjectPath,
    ) -> Result<Self, AdvertisementError> {
        let path =
            object_path(&config.advertisement_path).map_err(AdvertisementError::Export)?;
        let state = Arc::new(Mutex::new(AdvertisementState::Unregistered));

        let release_state = Arc::clone(&state);
        let local_name = config.local_name.clone();
        let dispatcher = ObjectDispatcher::build(path.clone(), ADVERTISEMENT_INTROSPECTION_XML)
            .method(RELEASE, move |_args, invocation| {
                let mut state = release_state.lock();
                if *state == AdvertisementState::Released {
                    debug!("Release received while already released");
                } else {
                    info!("Advertising slot reclaimed by the platform");
                    *state = AdvertisementState::Released;
                }
                invocation.reply_empty();
            })
            .method(GET_ALL, {
                let local_name = local_name.clone();
                move |args, invocation| match string_arg(args, 0) {
                    Ok(_interface) => invocation.reply(vec![property_dict(&local_name)]),
                    Err(err) => invocation.reply_error(ERROR_INVALID_ARGS, &err.to_string()),
                }
            })
            .property(PROPERTY_TYPE, || {
                string_value(ADVERTISEMENT_TYPE_PERIPHERAL)
            })
            .finish();

        connection
            .register_object(Arc::new(dispatcher), dispatch)
            .map_err(AdvertisementError::Export)?;
        *state.lock() = AdvertisementState::BusRegistered;
        debug!("Advertisement object exported at {}", path.as_str());

        Ok(Self {
            connection,
            service: config.service.clone(),
            path,
            adapter_path,
            local_name,
            service_uuids: config.service_uuids.clone(),
            state,
        })
    }

    /// Path the advertisement object is exported at
    pub fn path(&self) -> &OwnedObjectPath {
        &self.path
    }

    /// Current lifecycle state
    pub fn state(&self) -> AdvertisementState {
        *self.state.lock()
    }

    /// Announces the advertisement to the advertising manager at the adapter
    /// path. A rejected call leaves the object bus-registered; it is
    /// reported, not retried.
    pub fn advertise(&self) -> Result<(), AdvertisementError> {
        match self.state() {
            AdvertisementState::Released => return Err(AdvertisementError::Released),
            AdvertisementState::AdvertisingRegistered => {
                debug!("Advertisement already registered, nothing to do");
                return Ok(());
            }
            _ => {}
        }

        let call = MethodCall::new(
            self.service.clone(),
            self.adapter_path.clone(),
            LE_ADVERTISING_MANAGER_INTERFACE,
            REGISTER_ADVERTISEMENT,
        )
        .with_args(vec![path_value(&self.path), self.descriptor()]);

        self.connection
            .call(&call)
            .map_err(AdvertisementError::Register)?;
        *self.state.lock() = AdvertisementState::AdvertisingRegistered;
        info!(
            "Registered advertisement {} with {}",
            self.path.as_str(),
            self.adapter_path.as_str()
        );
        Ok(())
    }

    /// Local teardown. Unregisters from the advertising manager if the
    /// registration is still believed active, then withdraws the local
    /// object. Safe to call twice; the outbound unregister is never
    /// re-issued, and a failed unregister only logs (the manager may already
    /// consider the slot gone).
    pub fn release(&self) {
        let previous = {
            let mut state = self.state.lock();
            std::mem::replace(&mut *state, AdvertisementState::Released)
        };

        match previous {
            AdvertisementState::Released => {
                debug!("Advertisement already released");
            }
            AdvertisementState::AdvertisingRegistered => {
                let call = MethodCall::new(
                    self.service.clone(),
                    self.adapter_path.clone(),
                    LE_ADVERTISING_MANAGER_INTERFACE,
                    UNREGISTER_ADVERTISEMENT,
                )
                .with_args(vec![path_value(&self.path)]);
                if let Err(err) = self.connection.call(&call) {
                    warn!("UnregisterAdvertisement failed, continuing teardown: {}", err);
                }
            }
            _ => {}
        }

        self.connection.unregister_object(&self.path);
        if previous != AdvertisementState::Released {
            info!("Advertisement at {} released", self.path.as_str());
        }
    }

    /// Builds a fresh descriptor for one registration attempt
    fn descriptor(&self) -> OwnedValue {
        let mut entries: HashMap<String, Value<'static>> = HashMap::new();
        entries.insert(
            PROPERTY_TYPE.to_string(),
            Value::from(ADVERTISEMENT_TYPE_PERIPHERAL.to_string()),
        );
        entries.insert(
            PROPERTY_LOCAL_NAME.to_string(),
            Value::from(self.local_name.clone()),
        );
        if !self.service_uuids.is_empty() {
            entries.insert(
                PROPERTY_SERVICE_UUIDS.to_string(),
                Value::from(self.service_uuids.clone()),
            );
        }
        dict_value(entries)
    }
}

impl Drop for LeAdvertisement {
    fn drop(&mut self) {
        self.release();
    }
}

fn property_dict(local_name: &str) -> OwnedValue {
    let mut entries: HashMap<String, Value<'static>> = HashMap::new();
    entries.insert(
        PROPERTY_TYPE.to_string(),
        Value::from(ADVERTISEMENT_TYPE_PERIPHERAL.to_string()),
    );
    entries.insert(
        PROPERTY_LOCAL_NAME.to_string(),
        Value::from(local_name.to_string()),
    );
    dict_value(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use bluecast_harness::TestBus;

    use bluecast_bus::EventLoop;

    fn exported(
        bus: &TestBus,
        dispatch: &LoopHandle,
    ) -> Result<LeAdvertisement, AdvertisementError> {
        let config = DiscoveryConfig::default();
        let adapter = object_path("/org/bluez/hci0").unwrap();
        LeAdvertisement::export(
            Arc::new(bus.clone()) as Arc<dyn BusConnection>,
            dispatch,
            &config,
            adapter,
        )
    }

    #[test]
    fn advertise_registers_once_and_release_unregisters_once() {
        let bus = TestBus::new();
        let event_loop = EventLoop::new();
        let handle = event_loop.handle();

        let advertisement = exported(&bus, &handle).unwrap();
        assert_eq!(advertisement.state(), AdvertisementState::BusRegistered);

        advertisement.advertise().unwrap();
        advertisement.advertise().unwrap();
        assert_eq!(
            advertisement.state(),
            AdvertisementState::AdvertisingRegistered
        );
        assert_eq!(bus.calls_to(REGISTER_ADVERTISEMENT).len(), 1);

        advertisement.release();
        advertisement.release();
        assert_eq!(advertisement.state(), AdvertisementState::Released);
        assert_eq!(bus.calls_to(UNREGISTER_ADVERTISEMENT).len(), 1);
        assert!(!bus.is_registered(advertisement.path().as_str()));
    }

    #[test]
    fn rejected_registration_leaves_the_object_bus_registered() {
        let bus = TestBus::new();
        let event_loop = EventLoop::new();
        let handle = event_loop.handle();
        bus.fail_method(REGISTER_ADVERTISEMENT);

        let advertisement = exported(&bus, &handle).unwrap();
        assert!(matches!(
            advertisement.advertise(),
            Err(AdvertisementError::Register(_))
        ));
        assert_eq!(advertisement.state(), AdvertisementState::BusRegistered);
    }

    #[test]
    fn advertise_after_release_is_refused() {
        let bus = TestBus::new();
        let event_loop = EventLoop::new();
        let handle = event_loop.handle();

        let advertisement = exported(&bus, &handle).unwrap();
        advertisement.release();
        assert!(matches!(
            advertisement.advertise(),
            Err(AdvertisementError::Released)
        ));
        assert!(bus.calls_to(REGISTER_ADVERTISEMENT).is_empty());
    }

    #[test]
    fn inbound_release_transitions_and_replies_empty() {
        let bus = TestBus::new();
        let event_loop = EventLoop::new();
        let handle = event_loop.handle();
        let worker = thread::spawn(move || event_loop.run());

        let advertisement = exported(&bus, &handle).unwrap();
        advertisement.advertise().unwrap();

        let reply = bus
            .invoke(advertisement.path().as_str(), RELEASE, Vec::new())
            .unwrap();
        assert!(reply.is_ok());
        assert_eq!(advertisement.state(), AdvertisementState::Released);

        // A second Release while already released is still answered.
        let reply = bus
            .invoke(advertisement.path().as_str(), RELEASE, Vec::new())
            .unwrap();
        assert!(reply.is_ok());

        // The slot is gone remotely, so teardown must not unregister again.
        advertisement.release();
        assert!(bus.calls_to(UNREGISTER_ADVERTISEMENT).is_empty());

        handle.quit();
        worker.join().unwrap();
    }

    #[test]
    fn export_failure_leaves_nothing_registered() {
        let bus = TestBus::new();
        let event_loop = EventLoop::new();
        let handle = event_loop.handle();
        bus.fail_registration();

        assert!(matches!(
            exported(&bus, &handle),
            Err(AdvertisementError::Export(_))
        ));
        assert!(!bus.is_registered(DiscoveryConfig::default().advertisement_path.as_str()));
    }
}
