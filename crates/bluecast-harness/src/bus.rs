//! Scriptable in-memory bus

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;
use zvariant::{OwnedObjectPath, OwnedValue};

use bluecast_bus::{
    object_path, BusConnection, BusError, InterfaceMap, LoopHandle, ManagedObjects, MethodCall,
    MethodInvocation, MethodReply, ObjectDispatcher, PropertyMap, ReplySink, SignalArgs,
    SignalMessage, SignalSubscription, SubscriptionId, GET_MANAGED_OBJECTS, INTERFACES_ADDED,
    INTERFACES_REMOVED, OBJECT_MANAGER_INTERFACE,
};

/// How long synchronous helpers wait on the event-loop thread.
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

// ----------------------------------------------------------------------------
// Recorded State
// ----------------------------------------------------------------------------

/// One outbound call exactly as a caller issued it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub service: String,
    pub path: String,
    pub interface: String,
    pub method: String,
    pub args: Vec<OwnedValue>,
}

struct Registration {
    object: Arc<ObjectDispatcher>,
    dispatch: LoopHandle,
}

struct Subscription {
    subscription: SignalSubscription,
    dispatch: LoopHandle,
}

#[derive(Default)]
struct TestBusInner {
    tree: ManagedObjects,
    objects: HashMap<String, Registration>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
    calls: Vec<RecordedCall>,
    failing_methods: HashMap<String, BusError>,
    failing_subscriptions: HashMap<String, BusError>,
    enumeration_failure: Option<BusError>,
    registration_failure: Option<BusError>,
}

struct Shared {
    state: Mutex<TestBusInner>,
    next_subscription: AtomicU64,
}

// ----------------------------------------------------------------------------
// Test Bus
// ----------------------------------------------------------------------------

/// In-memory [`BusConnection`] double.
///
/// Tests seed the enumeration tree and failure injections up front, hand the
/// bus to the code under test, then drive signals and local-object calls
/// while asserting on the recorded outbound traffic. Clones are handles onto
/// the same bus, so the test keeps scripting the instance the engine talks
/// to.
#[derive(Clone)]
pub struct TestBus {
    shared: Arc<Shared>,
}

impl TestBus {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(TestBusInner::default()),
                next_subscription: AtomicU64::new(1),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Scripting
    // ------------------------------------------------------------------

    /// Seeds one object into the enumeration result. Seeding order is the
    /// order enumeration reports.
    pub fn seed_object(&self, path: &str, interfaces: &[&str]) {
        let path = object_path(path).expect("seeded path must be valid");
        let map: InterfaceMap = interfaces
            .iter()
            .map(|name| (name.to_string(), PropertyMap::new()))
            .collect();
        self.shared.state.lock().tree.push((path, map));
    }

    /// Makes enumeration calls fail.
    pub fn fail_enumeration(&self) {
        self.shared.state.lock().enumeration_failure = Some(BusError::CallFailed {
            interface: OBJECT_MANAGER_INTERFACE.to_string(),
            method: GET_MANAGED_OBJECTS.to_string(),
            reason: "injected enumeration failure".to_string(),
        });
    }

    /// Makes subscriptions for `member` fail.
    pub fn fail_subscription(&self, member: &str) {
        self.shared.state.lock().failing_subscriptions.insert(
            member.to_string(),
            BusError::SubscriptionRejected(format!("injected failure for {}", member)),
        );
    }

    /// Makes outbound calls to `method` fail. The call is still recorded.
    pub fn fail_method(&self, method: &str) {
        self.shared.state.lock().failing_methods.insert(
            method.to_string(),
            BusError::CallFailed {
                interface: "(injected)".to_string(),
                method: method.to_string(),
                reason: format!("injected failure for {}", method),
            },
        );
    }

    /// Makes the next local-object registration fail.
    pub fn fail_registration(&self) {
        self.shared.state.lock().registration_failure = Some(BusError::DescriptionRejected(
            "injected registration failure".to_string(),
        ));
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Every outbound call recorded so far, in issue order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.shared.state.lock().calls.clone()
    }

    /// Outbound calls to one method, in issue order.
    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.shared
            .state
            .lock()
            .calls
            .iter()
            .filter(|call| call.method == method)
            .cloned()
            .collect()
    }

    /// Whether a local object is currently registered at `path`.
    pub fn is_registered(&self, path: &str) -> bool {
        self.shared.state.lock().objects.contains_key(path)
    }

    /// Number of live signal subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.shared.state.lock().subscriptions.len()
    }

    // ------------------------------------------------------------------
    // Driving
    // ------------------------------------------------------------------

    /// Emits `InterfacesAdded` to every matching subscriber. Returns whether
    /// at least one delivery could be posted.
    pub fn emit_interfaces_added(&self, path: &str, interfaces: &[&str]) -> bool {
        let path = object_path(path).expect("emitted path must be valid");
        let map: InterfaceMap = interfaces
            .iter()
            .map(|name| (name.to_string(), PropertyMap::new()))
            .collect();
        self.emit(
            INTERFACES_ADDED,
            SignalArgs::ObjectAdded {
                path,
                interfaces: map,
            },
        )
    }

    /// Emits `InterfacesRemoved` to every matching subscriber.
    pub fn emit_interfaces_removed(&self, path: &str, interfaces: &[&str]) -> bool {
        let path = object_path(path).expect("emitted path must be valid");
        let names: Vec<String> = interfaces.iter().map(|name| name.to_string()).collect();
        self.emit(
            INTERFACES_REMOVED,
            SignalArgs::ObjectRemoved {
                path,
                interfaces: names,
            },
        )
    }

    /// Emits a signal with an opaque body, for malformed-payload handling.
    pub fn emit_raw(&self, member: &str, body: Vec<OwnedValue>) -> bool {
        self.emit(member, SignalArgs::Raw(body))
    }

    /// Blocks until every delivery posted so far has been dispatched, by
    /// running a barrier task through each loop the bus knows about.
    pub fn settle(&self) {
        let handles: Vec<LoopHandle> = {
            let inner = self.shared.state.lock();
            inner
                .subscriptions
                .values()
                .map(|entry| entry.dispatch.clone())
                .chain(inner.objects.values().map(|entry| entry.dispatch.clone()))
                .collect()
        };
        for handle in handles {
            let (tx, rx) = mpsc::channel();
            if handle.post(move || {
                let _ = tx.send(());
            }) {
                let _ = rx.recv_timeout(REPLY_TIMEOUT);
            }
        }
    }

    fn emit(&self, member: &str, args: SignalArgs) -> bool {
        // Snapshot targets first so handlers never run under the bus lock.
        let targets: Vec<(SignalSubscription, LoopHandle)> = {
            let inner = self.shared.state.lock();
            inner
                .subscriptions
                .values()
                .filter(|entry| entry.subscription.member == member)
                .map(|entry| (entry.subscription.clone(), entry.dispatch.clone()))
                .collect()
        };

        let mut delivered = false;
        for (subscription, dispatch) in targets {
            let message = SignalMessage {
                interface: subscription.interface.clone(),
                member: member.to_string(),
                args: args.clone(),
            };
            let handler = Arc::clone(&subscription.handler);
            delivered |= dispatch.post(move || handler(message));
        }
        delivered
    }

    /// Invokes a method on a registered local object, through its event
    /// loop, and waits for the single reply.
    pub fn invoke(
        &self,
        path: &str,
        method: &str,
        args: Vec<OwnedValue>,
    ) -> Result<MethodReply, BusError> {
        let (object, dispatch) = {
            let inner = self.shared.state.lock();
            let registration = inner.objects.get(path).ok_or_else(|| BusError::CallFailed {
                interface: "(local)".to_string(),
                method: method.to_string(),
                reason: format!("no object at {}", path),
            })?;
            (
                Arc::clone(&registration.object),
                registration.dispatch.clone(),
            )
        };

        let (tx, rx) = mpsc::channel();
        let sink: ReplySink = Box::new(move |reply| {
            let _ = tx.send(reply);
        });
        let invocation = MethodInvocation::new(object.path().clone(), method, sink);
        let method_name = method.to_string();
        if !dispatch.post(move || object.dispatch_call(&method_name, &args, invocation)) {
            return Err(BusError::LoopGone);
        }

        rx.recv_timeout(REPLY_TIMEOUT).map_err(|_| BusError::CallFailed {
            interface: "(local)".to_string(),
            method: method.to_string(),
            reason: "no reply before timeout".to_string(),
        })
    }

    /// Reads a property from a registered local object, through its event
    /// loop. `Ok(None)` means the property is unset.
    pub fn get_property(
        &self,
        path: &str,
        property: &str,
    ) -> Result<Option<OwnedValue>, BusError> {
        let (object, dispatch) = {
            let inner = self.shared.state.lock();
            let registration = inner.objects.get(path).ok_or_else(|| BusError::CallFailed {
                interface: "(local)".to_string(),
                method: "Get".to_string(),
                reason: format!("no object at {}", path),
            })?;
            (
                Arc::clone(&registration.object),
                registration.dispatch.clone(),
            )
        };

        let (tx, rx) = mpsc::channel();
        let name = property.to_string();
        if !dispatch.post(move || {
            let _ = tx.send(object.read_property(&name));
        }) {
            return Err(BusError::LoopGone);
        }

        rx.recv_timeout(REPLY_TIMEOUT).map_err(|_| BusError::CallFailed {
            interface: "(local)".to_string(),
            method: "Get".to_string(),
            reason: "no reply before timeout".to_string(),
        })
    }

    // ------------------------------------------------------------------
    // Connectors
    // ------------------------------------------------------------------

    /// A connector closure handing out this bus.
    pub fn connector(&self) -> impl FnOnce() -> Result<Arc<dyn BusConnection>, BusError> {
        let bus = self.clone();
        move || Ok(Arc::new(bus) as Arc<dyn BusConnection>)
    }

    /// A connector that refuses, simulating an unreachable bus.
    pub fn refused_connector() -> impl FnOnce() -> Result<Arc<dyn BusConnection>, BusError> {
        || Err(BusError::Unreachable("injected connection refusal".to_string()))
    }
}

impl Default for TestBus {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// BusConnection Implementation
// ----------------------------------------------------------------------------

impl BusConnection for TestBus {
    fn call(&self, call: &MethodCall) -> Result<Vec<OwnedValue>, BusError> {
        let mut inner = self.shared.state.lock();
        inner.calls.push(RecordedCall {
            service: call.service.clone(),
            path: call.path.as_str().to_string(),
            interface: call.interface.clone(),
            method: call.method.clone(),
            args: call.args.clone(),
        });
        if let Some(err) = inner.failing_methods.get(&call.method) {
            return Err(err.clone());
        }
        Ok(Vec::new())
    }

    fn get_managed_objects(
        &self,
        _service: &str,
        _root: &str,
    ) -> Result<ManagedObjects, BusError> {
        let inner = self.shared.state.lock();
        if let Some(err) = &inner.enumeration_failure {
            return Err(err.clone());
        }
        Ok(inner.tree.clone())
    }

    fn subscribe_signal(
        &self,
        subscription: SignalSubscription,
        dispatch: &LoopHandle,
    ) -> Result<SubscriptionId, BusError> {
        let mut inner = self.shared.state.lock();
        if let Some(err) = inner.failing_subscriptions.get(&subscription.member) {
            return Err(err.clone());
        }
        let id = self.shared.next_subscription.fetch_add(1, Ordering::Relaxed);
        debug!("Subscribed {} as {}", subscription.member, id);
        inner.subscriptions.insert(
            id,
            Subscription {
                subscription,
                dispatch: dispatch.clone(),
            },
        );
        Ok(id)
    }

    fn unsubscribe_signal(&self, id: SubscriptionId) {
        self.shared.state.lock().subscriptions.remove(&id);
    }

    fn register_object(
        &self,
        object: Arc<ObjectDispatcher>,
        dispatch: &LoopHandle,
    ) -> Result<(), BusError> {
        let mut inner = self.shared.state.lock();
        if let Some(err) = inner.registration_failure.take() {
            return Err(err);
        }
        let path = object.path().as_str().to_string();
        if inner.objects.contains_key(&path) {
            return Err(BusError::PathInUse(path));
        }
        debug!("Registered local object at {}", path);
        inner.objects.insert(
            path,
            Registration {
                object,
                dispatch: dispatch.clone(),
            },
        );
        Ok(())
    }

    fn unregister_object(&self, path: &OwnedObjectPath) {
        self.shared.state.lock().objects.remove(path.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use bluecast_bus::{string_value, EventLoop};

    #[test]
    fn enumeration_preserves_seeding_order() {
        let bus = TestBus::new();
        bus.seed_object("/org/bluez/hci1", &["org.bluez.Adapter1"]);
        bus.seed_object("/org/bluez/hci0", &["org.bluez.Adapter1"]);

        let tree = bus.get_managed_objects("org.bluez", "/").unwrap();
        let paths: Vec<&str> = tree.iter().map(|(path, _)| path.as_str()).collect();
        assert_eq!(paths, vec!["/org/bluez/hci1", "/org/bluez/hci0"]);
    }

    #[test]
    fn injected_call_failures_are_reported_and_recorded() {
        let bus = TestBus::new();
        bus.fail_method("RegisterAdvertisement");

        let call = MethodCall::new(
            "org.bluez",
            object_path("/org/bluez/hci0").unwrap(),
            "org.bluez.LEAdvertisingManager1",
            "RegisterAdvertisement",
        );
        assert!(bus.call(&call).is_err());
        assert_eq!(bus.calls_to("RegisterAdvertisement").len(), 1);
    }

    #[test]
    fn invoke_round_trips_through_a_running_loop() {
        let bus = TestBus::new();
        let event_loop = EventLoop::new();
        let handle = event_loop.handle();
        let worker = thread::spawn(move || event_loop.run());

        let dispatcher = ObjectDispatcher::build(object_path("/test/echo").unwrap(), "<node/>")
            .method("Echo", |args, invocation| invocation.reply(args.to_vec()))
            .finish();
        bus.register_object(Arc::new(dispatcher), &handle).unwrap();

        let reply = bus
            .invoke("/test/echo", "Echo", vec![string_value("hello")])
            .unwrap();
        assert!(reply.is_ok());

        assert!(bus.get_property("/test/echo", "Type").unwrap().is_none());

        handle.quit();
        worker.join().unwrap();
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let bus = TestBus::new();
        let event_loop = EventLoop::new();
        let handle = event_loop.handle();

        let build = || {
            Arc::new(
                ObjectDispatcher::build(object_path("/test/dup").unwrap(), "<node/>").finish(),
            )
        };
        bus.register_object(build(), &handle).unwrap();
        match bus.register_object(build(), &handle) {
            Err(BusError::PathInUse(path)) => assert_eq!(path, "/test/dup"),
            other => panic!("expected PathInUse, got {:?}", other.map(|_| ())),
        }
    }
}
