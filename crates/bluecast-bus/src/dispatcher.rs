//! Local object exposure with typed call routing

use std::collections::HashMap;

use tracing::{debug, warn};
use zvariant::{OwnedObjectPath, OwnedValue};

use crate::invocation::{MethodInvocation, ERROR_UNKNOWN_METHOD};

// ----------------------------------------------------------------------------
// Handler Types
// ----------------------------------------------------------------------------

/// Handler bound to one method name. Receives the call body and the reply
/// handle; the handler owns the reply on every path.
pub type MethodHandler = Box<dyn Fn(&[OwnedValue], MethodInvocation) + Send + Sync>;

/// Getter bound to one readable property name.
pub type PropertyGetter = Box<dyn Fn() -> OwnedValue + Send + Sync>;

// ----------------------------------------------------------------------------
// Object Dispatcher
// ----------------------------------------------------------------------------

/// A local object exposed on the bus at a fixed path.
///
/// The method-handler table and property getters are frozen when the builder
/// finishes, so routing never takes a lock. The transport that the dispatcher
/// is registered with invokes [`dispatch_call`](Self::dispatch_call) and
/// [`read_property`](Self::read_property) on its event-loop thread; no
/// handler runs before registration succeeds, and teardown unregisters the
/// object before handler state is released.
pub struct ObjectDispatcher {
    path: OwnedObjectPath,
    introspection: String,
    methods: HashMap<String, MethodHandler>,
    properties: HashMap<String, PropertyGetter>,
}

impl ObjectDispatcher {
    /// Starts building a dispatcher for the object at `path`, described by a
    /// static introspection document.
    pub fn build(path: OwnedObjectPath, introspection: impl Into<String>) -> ObjectDispatcherBuilder {
        ObjectDispatcherBuilder {
            path,
            introspection: introspection.into(),
            methods: HashMap::new(),
            properties: HashMap::new(),
        }
    }

    /// Path the object is exposed at.
    pub fn path(&self) -> &OwnedObjectPath {
        &self.path
    }

    /// Introspection document supplied at registration, never regenerated.
    pub fn introspection(&self) -> &str {
        &self.introspection
    }

    /// Routes an inbound method call. Exactly one reply is produced: either
    /// by the bound handler or, for unknown methods, by the dispatcher
    /// itself.
    pub fn dispatch_call(&self, method: &str, args: &[OwnedValue], invocation: MethodInvocation) {
        match self.methods.get(method) {
            Some(handler) => {
                debug!("Dispatching {} on {}", method, self.path.as_str());
                handler(args, invocation);
            }
            None => {
                warn!(
                    "Inbound call names unknown method {} on {}",
                    method,
                    self.path.as_str()
                );
                invocation.reply_error(
                    ERROR_UNKNOWN_METHOD,
                    &format!("unknown method {}", method),
                );
            }
        }
    }

    /// Routes an inbound property read. Unknown properties yield no value,
    /// which the transport reports as unset rather than leaving the caller
    /// blocked.
    pub fn read_property(&self, property: &str) -> Option<OwnedValue> {
        self.properties.get(property).map(|getter| getter())
    }
}

// ----------------------------------------------------------------------------
// Builder
// ----------------------------------------------------------------------------

/// Collects handlers for an [`ObjectDispatcher`]; the table is immutable once
/// [`finish`](Self::finish) runs.
pub struct ObjectDispatcherBuilder {
    path: OwnedObjectPath,
    introspection: String,
    methods: HashMap<String, MethodHandler>,
    properties: HashMap<String, PropertyGetter>,
}

impl ObjectDispatcherBuilder {
    /// Binds a handler to a method name.
    pub fn method(
        mut self,
        name: impl Into<String>,
        handler: impl Fn(&[OwnedValue], MethodInvocation) + Send + Sync + 'static,
    ) -> Self {
        self.methods.insert(name.into(), Box::new(handler));
        self
    }

    /// Binds a getter to a readable property name.
    pub fn property(
        mut self,
        name: impl Into<String>,
        getter: impl Fn() -> OwnedValue + Send + Sync + 'static,
    ) -> Self {
        self.properties.insert(name.into(), Box::new(getter));
        self
    }

    pub fn finish(self) -> ObjectDispatcher {
        ObjectDispatcher {
            path: self.path,
            introspection: self.introspection,
            methods: self.methods,
            properties: self.properties,
        }
    }
}
