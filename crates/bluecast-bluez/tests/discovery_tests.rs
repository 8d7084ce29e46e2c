//! Integration tests for the discovery engine
//!
//! Every test drives a full `DeviceManager` against the in-memory `TestBus`:
//! seed the object tree, create the engine, then emit signals and assert on
//! the registry and the recorded outbound traffic.

use std::time::Duration;

use bluecast_bluez::protocol::{
    ADAPTER_INTERFACE, DEFAULT_ADVERTISEMENT_PATH, DEVICE_INTERFACE, INTERFACES_ADDED,
    INTERFACES_REMOVED, REGISTER_ADVERTISEMENT, UNREGISTER_ADVERTISEMENT,
};
use bluecast_bluez::{AdvertisementError, DeviceManager, DiscoveryConfig, DiscoveryError};
use bluecast_bus::string_value;
use bluecast_harness::TestBus;

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

const ADAPTER_PATH: &str = "/org/bluez/hci0";
const DEVICE_PATH: &str = "/org/bluez/hci0/dev_AA";

fn test_config() -> DiscoveryConfig {
    DiscoveryConfig::default().with_startup_timeout(Duration::from_secs(5))
}

fn seeded_bus() -> TestBus {
    let _ = tracing_subscriber::fmt::try_init();
    let bus = TestBus::new();
    bus.seed_object(ADAPTER_PATH, &[ADAPTER_INTERFACE]);
    bus.seed_object(DEVICE_PATH, &[DEVICE_INTERFACE]);
    bus
}

// ----------------------------------------------------------------------------
// Enumeration & Classification
// ----------------------------------------------------------------------------

#[test]
fn enumeration_classifies_adapter_and_device() {
    let bus = seeded_bus();
    let manager = DeviceManager::create(bus.connector(), test_config()).unwrap();

    assert_eq!(
        manager.adapter_path().map(|p| p.as_str().to_string()),
        Some(ADAPTER_PATH.to_string())
    );
    assert_eq!(manager.device_count(), 1);
    let paths = manager.device_paths();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].as_str(), DEVICE_PATH);
}

#[test]
fn first_adapter_in_enumeration_order_wins() {
    let bus = TestBus::new();
    bus.seed_object("/org/bluez/hci1", &[ADAPTER_INTERFACE]);
    bus.seed_object(ADAPTER_PATH, &[ADAPTER_INTERFACE]);
    let manager = DeviceManager::create(bus.connector(), test_config()).unwrap();

    assert_eq!(
        manager.adapter_path().map(|p| p.as_str().to_string()),
        Some("/org/bluez/hci1".to_string())
    );
}

#[test]
fn startup_registers_advertisement_with_the_adapter() {
    let bus = seeded_bus();
    let manager = DeviceManager::create(bus.connector(), test_config()).unwrap();

    assert!(bus.is_registered(DEFAULT_ADVERTISEMENT_PATH));
    assert_eq!(bus.subscription_count(), 2);

    let registrations = bus.calls_to(REGISTER_ADVERTISEMENT);
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].path, ADAPTER_PATH);

    drop(manager);
}

// ----------------------------------------------------------------------------
// Signal Handling
// ----------------------------------------------------------------------------

#[test]
fn interfaces_added_inserts_new_devices_once() {
    let bus = seeded_bus();
    let manager = DeviceManager::create(bus.connector(), test_config()).unwrap();

    assert!(bus.emit_interfaces_added("/org/bluez/hci0/dev_BB", &[DEVICE_INTERFACE]));
    bus.settle();
    assert_eq!(manager.device_count(), 2);

    // Re-announcing a known device refreshes it without duplicating.
    bus.emit_interfaces_added(DEVICE_PATH, &[DEVICE_INTERFACE]);
    bus.settle();
    assert_eq!(manager.device_count(), 2);
}

#[test]
fn interfaces_removed_empties_the_registry() {
    let bus = seeded_bus();
    let manager = DeviceManager::create(bus.connector(), test_config()).unwrap();

    bus.emit_interfaces_removed(DEVICE_PATH, &[DEVICE_INTERFACE]);
    bus.settle();
    assert_eq!(manager.device_count(), 0);
}

#[test]
fn removing_an_unknown_path_is_a_noop() {
    let bus = seeded_bus();
    let manager = DeviceManager::create(bus.connector(), test_config()).unwrap();

    bus.emit_interfaces_removed("/org/bluez/hci0/dev_FF", &[DEVICE_INTERFACE]);
    bus.settle();
    assert_eq!(manager.device_count(), 1);
}

#[test]
fn adapter_redetection_after_the_first_is_ignored() {
    let bus = seeded_bus();
    let manager = DeviceManager::create(bus.connector(), test_config()).unwrap();

    bus.emit_interfaces_added("/org/bluez/hci1", &[ADAPTER_INTERFACE]);
    bus.settle();
    assert_eq!(
        manager.adapter_path().map(|p| p.as_str().to_string()),
        Some(ADAPTER_PATH.to_string())
    );
}

#[test]
fn malformed_signal_payloads_are_dropped_without_harm() {
    let bus = seeded_bus();
    let manager = DeviceManager::create(bus.connector(), test_config()).unwrap();

    bus.emit_raw(INTERFACES_ADDED, vec![string_value("not an object path")]);
    bus.emit_raw(INTERFACES_REMOVED, Vec::new());
    bus.settle();
    assert_eq!(manager.device_count(), 1);

    // The engine is still live afterwards.
    bus.emit_interfaces_added("/org/bluez/hci0/dev_BB", &[DEVICE_INTERFACE]);
    bus.settle();
    assert_eq!(manager.device_count(), 2);
}

// ----------------------------------------------------------------------------
// Startup Failures
// ----------------------------------------------------------------------------

#[test]
fn connection_refusal_aborts_create() {
    let result = DeviceManager::create(TestBus::refused_connector(), test_config());
    assert!(matches!(result, Err(DiscoveryError::Connection(_))));
}

#[test]
fn enumeration_failure_aborts_create() {
    let bus = seeded_bus();
    bus.fail_enumeration();

    let result = DeviceManager::create(bus.connector(), test_config());
    assert!(matches!(result, Err(DiscoveryError::Enumeration(_))));
    assert_eq!(bus.subscription_count(), 0);
}

#[test]
fn subscription_failure_fails_startup_without_running_the_loop() {
    for member in [INTERFACES_ADDED, INTERFACES_REMOVED] {
        let bus = seeded_bus();
        bus.fail_subscription(member);

        let result = DeviceManager::create(bus.connector(), test_config());
        assert!(matches!(result, Err(DiscoveryError::Subscription(_))));

        // The worker exited before the run loop: nothing is left subscribed
        // or registered, and signal emission finds no listener.
        assert_eq!(bus.subscription_count(), 0);
        assert!(!bus.is_registered(DEFAULT_ADVERTISEMENT_PATH));
        assert!(!bus.emit_interfaces_added("/org/bluez/hci0/dev_BB", &[DEVICE_INTERFACE]));
    }
}

#[test]
fn advertisement_export_failure_fails_startup() {
    let bus = seeded_bus();
    bus.fail_registration();

    let result = DeviceManager::create(bus.connector(), test_config());
    assert!(matches!(
        result,
        Err(DiscoveryError::Advertisement(AdvertisementError::Export(_)))
    ));
    assert_eq!(bus.subscription_count(), 0);
}

#[test]
fn advertisement_registration_failure_fails_startup() {
    let bus = seeded_bus();
    bus.fail_method(REGISTER_ADVERTISEMENT);

    let result = DeviceManager::create(bus.connector(), test_config());
    assert!(matches!(
        result,
        Err(DiscoveryError::Advertisement(
            AdvertisementError::Register(_)
        ))
    ));
    assert_eq!(bus.subscription_count(), 0);
    assert!(!bus.is_registered(DEFAULT_ADVERTISEMENT_PATH));
}

#[test]
fn missing_adapter_fails_advertisement_bring_up() {
    let bus = TestBus::new();
    bus.seed_object(DEVICE_PATH, &[DEVICE_INTERFACE]);

    let result = DeviceManager::create(bus.connector(), test_config());
    assert!(matches!(
        result,
        Err(DiscoveryError::Advertisement(
            AdvertisementError::AdapterUnavailable
        ))
    ));
}

// ----------------------------------------------------------------------------
// Shutdown
// ----------------------------------------------------------------------------

#[test]
fn shutdown_tears_down_and_is_idempotent() {
    let bus = seeded_bus();
    let mut manager = DeviceManager::create(bus.connector(), test_config()).unwrap();

    manager.shutdown();
    assert!(!bus.is_registered(DEFAULT_ADVERTISEMENT_PATH));
    assert_eq!(bus.subscription_count(), 0);
    assert_eq!(bus.calls_to(UNREGISTER_ADVERTISEMENT).len(), 1);

    manager.shutdown();
    drop(manager);
    assert_eq!(bus.calls_to(UNREGISTER_ADVERTISEMENT).len(), 1);
}

#[test]
fn drop_performs_the_same_teardown() {
    let bus = seeded_bus();
    let manager = DeviceManager::create(bus.connector(), test_config()).unwrap();

    drop(manager);
    assert!(!bus.is_registered(DEFAULT_ADVERTISEMENT_PATH));
    assert_eq!(bus.subscription_count(), 0);
    assert_eq!(bus.calls_to(UNREGISTER_ADVERTISEMENT).len(), 1);
}

#[test]
fn failed_unregister_does_not_block_teardown() {
    let bus = seeded_bus();
    bus.fail_method(UNREGISTER_ADVERTISEMENT);
    let manager = DeviceManager::create(bus.connector(), test_config()).unwrap();

    drop(manager);
    assert!(!bus.is_registered(DEFAULT_ADVERTISEMENT_PATH));
    assert_eq!(bus.subscription_count(), 0);
}
