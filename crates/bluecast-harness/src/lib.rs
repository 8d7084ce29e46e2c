//! Test scaffolding shared across the bluecast workspace
//!
//! The centerpiece is [`TestBus`], a scriptable in-memory implementation of
//! the `BusConnection` trait: tests seed it with an object tree, point the
//! engine at it, then drive signals and inbound calls while asserting on the
//! outbound calls the engine issued.

mod bus;

pub use bus::{RecordedCall, TestBus};
