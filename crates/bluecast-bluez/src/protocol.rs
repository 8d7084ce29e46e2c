//! BlueZ bus names, method names, and fixed object paths

pub use bluecast_bus::{
    GET_ALL, GET_MANAGED_OBJECTS, INTERFACES_ADDED, INTERFACES_REMOVED, OBJECT_MANAGER_INTERFACE,
    PROPERTIES_INTERFACE,
};

/// Well-known bus name of the BlueZ daemon.
pub const BLUEZ_SERVICE: &str = "org.bluez";

/// Interface implemented by the local Bluetooth adapter object.
pub const ADAPTER_INTERFACE: &str = "org.bluez.Adapter1";

/// Interface implemented by remote device objects.
pub const DEVICE_INTERFACE: &str = "org.bluez.Device1";

/// Interface the local advertisement object implements.
pub const LE_ADVERTISEMENT_INTERFACE: &str = "org.bluez.LEAdvertisement1";

/// Advertising manager interface, served at the adapter's path.
pub const LE_ADVERTISING_MANAGER_INTERFACE: &str = "org.bluez.LEAdvertisingManager1";

/// Advertising manager registration method.
pub const REGISTER_ADVERTISEMENT: &str = "RegisterAdvertisement";

/// Advertising manager unregistration method.
pub const UNREGISTER_ADVERTISEMENT: &str = "UnregisterAdvertisement";

/// Method the platform calls to reclaim the advertisement slot.
pub const RELEASE: &str = "Release";

/// Root path enumerated at startup.
pub const OBJECT_ROOT_PATH: &str = "/";

/// Default path the local advertisement object is exported at. Distinct
/// from the adapter's own path.
pub const DEFAULT_ADVERTISEMENT_PATH: &str = "/com/bluez/advertising";

/// Advertisement type announced to the advertising manager.
pub const ADVERTISEMENT_TYPE_PERIPHERAL: &str = "peripheral";

/// Advertisement descriptor and property field names.
pub const PROPERTY_TYPE: &str = "Type";
pub const PROPERTY_LOCAL_NAME: &str = "LocalName";
pub const PROPERTY_SERVICE_UUIDS: &str = "ServiceUUIDs";
