//! The transport seam: outbound calls, enumeration, signals, registration

use std::sync::Arc;

use zvariant::{OwnedObjectPath, OwnedValue};

use crate::dispatcher::ObjectDispatcher;
use crate::error::BusError;
use crate::event_loop::LoopHandle;
use crate::value::{InterfaceMap, ManagedObjects};

// ----------------------------------------------------------------------------
// Standard Interface Names
// ----------------------------------------------------------------------------

/// Standard object-manager interface enumerating objects under a root path.
pub const OBJECT_MANAGER_INTERFACE: &str = "org.freedesktop.DBus.ObjectManager";

/// Standard properties-read interface.
pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// Object-manager enumeration method.
pub const GET_MANAGED_OBJECTS: &str = "GetManagedObjects";

/// Object-manager signal announcing new interfaces on a path.
pub const INTERFACES_ADDED: &str = "InterfacesAdded";

/// Object-manager signal announcing removed interfaces on a path.
pub const INTERFACES_REMOVED: &str = "InterfacesRemoved";

/// Properties-interface bulk read method.
pub const GET_ALL: &str = "GetAll";

// ----------------------------------------------------------------------------
// Outbound Calls
// ----------------------------------------------------------------------------

/// An outbound method call addressed to a remote bus object.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub service: String,
    pub path: OwnedObjectPath,
    pub interface: String,
    pub method: String,
    pub args: Vec<OwnedValue>,
}

impl MethodCall {
    pub fn new(
        service: impl Into<String>,
        path: OwnedObjectPath,
        interface: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            path,
            interface: interface.into(),
            method: method.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<OwnedValue>) -> Self {
        self.args = args;
        self
    }
}

// ----------------------------------------------------------------------------
// Signals
// ----------------------------------------------------------------------------

/// Identifier of an active signal subscription. Never zero for a live
/// subscription.
pub type SubscriptionId = u64;

/// Payloads the framework decodes for subscribers.
#[derive(Debug, Clone)]
pub enum SignalArgs {
    /// Object-manager `InterfacesAdded`: a path gained interfaces.
    ObjectAdded {
        path: OwnedObjectPath,
        interfaces: InterfaceMap,
    },
    /// Object-manager `InterfacesRemoved`: a path lost interfaces.
    ObjectRemoved {
        path: OwnedObjectPath,
        interfaces: Vec<String>,
    },
    /// Any other signal, body left opaque.
    Raw(Vec<OwnedValue>),
}

/// A broadcast signal as delivered to a subscriber, on the event-loop thread
/// the subscription was attached to.
#[derive(Debug, Clone)]
pub struct SignalMessage {
    pub interface: String,
    pub member: String,
    pub args: SignalArgs,
}

/// Subscriber callback. Runs on the event-loop thread; deliveries are
/// serialized with each other and with method dispatch.
pub type SignalHandler = Arc<dyn Fn(SignalMessage) + Send + Sync>;

/// A request to receive one broadcast signal from one service.
#[derive(Clone)]
pub struct SignalSubscription {
    pub service: String,
    pub interface: String,
    pub member: String,
    pub handler: SignalHandler,
}

// ----------------------------------------------------------------------------
// Connection Trait
// ----------------------------------------------------------------------------

/// Transport-level bus connection.
///
/// Implementations are shared (`Arc`) between the discovery engine and every
/// locally-published object, and must accept concurrent outbound calls from
/// multiple threads. Each call is synchronous from the issuing thread's
/// perspective. Inbound work (signal deliveries, method calls, property
/// reads) is posted to the [`LoopHandle`] supplied at subscription or
/// registration time and runs on that loop's thread only.
pub trait BusConnection: Send + Sync {
    /// Issues a synchronous outbound call and waits for the reply body.
    fn call(&self, call: &MethodCall) -> Result<Vec<OwnedValue>, BusError>;

    /// Synchronously fetches the object tree below `root` from `service`,
    /// preserving bus delivery order.
    fn get_managed_objects(&self, service: &str, root: &str)
        -> Result<ManagedObjects, BusError>;

    /// Subscribes to a broadcast signal. Deliveries run on `dispatch`'s loop
    /// thread. Returns a non-zero subscription id.
    fn subscribe_signal(
        &self,
        subscription: SignalSubscription,
        dispatch: &LoopHandle,
    ) -> Result<SubscriptionId, BusError>;

    /// Cancels a subscription. Unknown ids are ignored.
    fn unsubscribe_signal(&self, id: SubscriptionId);

    /// Exposes a local object at its dispatcher's path. Inbound calls and
    /// property reads are posted to `dispatch`. Fails if the path is already
    /// registered or the object description is rejected.
    fn register_object(
        &self,
        object: Arc<ObjectDispatcher>,
        dispatch: &LoopHandle,
    ) -> Result<(), BusError>;

    /// Withdraws a local object. Unknown paths are ignored. After this
    /// returns, no further handler invocation is delivered for the path.
    fn unregister_object(&self, path: &OwnedObjectPath);
}
