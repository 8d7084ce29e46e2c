//! Payload type aliases and helpers for structured bus values
//!
//! The actual marshalling lives in `zvariant`; this module only pins down the
//! shapes the framework passes around and wraps the handful of conversions
//! the rest of the workspace needs.

use std::collections::HashMap;

use zvariant::{OwnedObjectPath, OwnedValue, Value};

use crate::error::BusError;

// ----------------------------------------------------------------------------
// Payload Shapes
// ----------------------------------------------------------------------------

/// Property name to value map (`a{sv}`).
pub type PropertyMap = HashMap<String, OwnedValue>;

/// Interface name to property map (`a{sa{sv}}`), as carried by enumeration
/// replies and `InterfacesAdded`.
pub type InterfaceMap = HashMap<String, PropertyMap>;

/// Object tree returned by `GetManagedObjects`, in bus delivery order.
///
/// Delivery order matters to consumers that break ties positionally (the
/// discovery engine picks the first adapter it sees), so the tree is kept as
/// an ordered list of pairs instead of a map.
pub type ManagedObjects = Vec<(OwnedObjectPath, InterfaceMap)>;

// ----------------------------------------------------------------------------
// Value Helpers
// ----------------------------------------------------------------------------

/// Parses and validates an object path.
pub fn object_path(path: &str) -> Result<OwnedObjectPath, BusError> {
    OwnedObjectPath::try_from(path).map_err(|e| BusError::InvalidPath(format!("{}: {}", path, e)))
}

/// Builds a string value.
pub fn string_value(s: &str) -> OwnedValue {
    OwnedValue::from(Value::from(String::from(s)))
}

/// Builds an object-path value.
pub fn path_value(path: &OwnedObjectPath) -> OwnedValue {
    OwnedValue::from(Value::from(path.clone().into_inner()))
}

/// Builds an `a{sv}` dictionary value from owned entries.
pub fn dict_value(entries: HashMap<String, Value<'static>>) -> OwnedValue {
    OwnedValue::from(Value::from(entries))
}

/// Reads the string argument at `index` from a call body.
pub fn string_arg(args: &[OwnedValue], index: usize) -> Result<String, BusError> {
    match args.get(index).map(|v| &**v) {
        Some(Value::Str(s)) => Ok(s.as_str().to_string()),
        Some(other) => Err(BusError::MalformedBody(format!(
            "argument {} is not a string: {:?}",
            index, other
        ))),
        None => Err(BusError::MalformedBody(format!(
            "argument {} is missing",
            index
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_path_validates_input() {
        assert!(object_path("/org/bluez/hci0").is_ok());
        assert!(object_path("not a path").is_err());
        assert!(object_path("").is_err());
    }

    #[test]
    fn string_arg_reads_strings_and_rejects_the_rest() {
        let args = vec![string_value("org.bluez.LEAdvertisement1")];
        assert_eq!(
            string_arg(&args, 0).unwrap(),
            "org.bluez.LEAdvertisement1".to_string()
        );
        assert!(string_arg(&args, 1).is_err());

        let path = object_path("/com/bluez/advertising").unwrap();
        let args = vec![path_value(&path)];
        assert!(string_arg(&args, 0).is_err());
    }
}
