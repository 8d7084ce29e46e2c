//! Generic framework for exposing and consuming objects on a message bus
//!
//! This crate contains the transport-agnostic half of bluecast: everything
//! needed to publish a local object on a bus, route inbound method calls and
//! property reads to typed handlers, and keep all delivery serialized on one
//! dedicated thread. The transport itself stays behind the [`BusConnection`]
//! trait; a real bus binding (or the in-memory test bus from
//! `bluecast-harness`) plugs in there.
//!
//! ## Architecture
//!
//! - [`connection`](BusConnection) - the transport seam: outbound calls,
//!   object-tree enumeration, signal subscriptions, object registration
//! - [`dispatcher`](ObjectDispatcher) - a local object with a frozen
//!   method-handler table and property getters
//! - [`invocation`](MethodInvocation) - per-call reply handle enforcing
//!   exactly one reply
//! - [`event_loop`](EventLoop) - the private task queue the owning thread
//!   drains; transports post deliveries through a [`LoopHandle`]
//! - [`value`](ManagedObjects) - payload type aliases and `OwnedValue`
//!   helpers

mod connection;
mod dispatcher;
mod error;
mod event_loop;
mod invocation;
mod value;

// Public API exports
pub use connection::{
    BusConnection, MethodCall, SignalArgs, SignalHandler, SignalMessage, SignalSubscription,
    SubscriptionId, GET_ALL, GET_MANAGED_OBJECTS, INTERFACES_ADDED, INTERFACES_REMOVED,
    OBJECT_MANAGER_INTERFACE, PROPERTIES_INTERFACE,
};
pub use dispatcher::{MethodHandler, ObjectDispatcher, ObjectDispatcherBuilder, PropertyGetter};
pub use error::BusError;
pub use event_loop::{EventLoop, LoopHandle};
pub use invocation::{
    MethodInvocation, MethodReply, ReplySink, ERROR_FAILED, ERROR_INVALID_ARGS,
    ERROR_UNKNOWN_METHOD,
};
pub use value::{
    dict_value, object_path, path_value, string_arg, string_value, InterfaceMap, ManagedObjects,
    PropertyMap,
};
