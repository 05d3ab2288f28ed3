//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use tether_engine::{Bridge, BridgeConfig, BridgeOptions};
use tether_sdk::{ArgSlot, ObjectRef};
use tether_testkit::FakeRuntime;

/// Route engine logs to the test writer; `RUST_LOG=tether_engine=trace` shows them
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Bridge with every sentinel registered against `rt`'s built-ins
pub fn bridge(rt: &FakeRuntime) -> Bridge {
    bridge_with(rt, BridgeOptions::default())
}

pub fn bridge_with(rt: &FakeRuntime, options: BridgeOptions) -> Bridge {
    init_tracing();
    let b = rt.builtins();
    let config = BridgeConfig::new(options)
        .with_sentinels(
            b.persistent_object.class,
            b.binary_buffer.class,
            Some(b.typed_value.class),
        )
        .expect("fresh sentinels");
    Bridge::new(Arc::new(config))
}

pub fn int_arg(slot: &ArgSlot) -> i32 {
    let bytes = slot.value_bytes().expect("value slot");
    i32::from_le_bytes(bytes[..4].try_into().unwrap())
}

pub fn boxed_int(rt: &FakeRuntime, v: i32) -> Option<ObjectRef> {
    use tether_sdk::ManagedRuntime;
    Some(rt.box_value(rt.builtins().i4.class, &v.to_le_bytes()))
}
