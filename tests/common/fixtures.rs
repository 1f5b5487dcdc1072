//! Shared fixtures for integration and property tests

use xfcad::shared::{LockConfig, Operation, OperationKind, ParamValue};

/// Lock configuration with long maintenance cadences; tests drive the
/// sweep and deadlock passes directly so wall-clock timing stays out of
/// the assertions.
pub fn quiet_lock_config() -> LockConfig {
    LockConfig {
        default_ttl_ms: 60_000,
        expiry_sweep_interval_ms: 60_000,
        queue_interval_ms: 60_000,
        deadlock_interval_ms: 60_000,
        event_capacity: 64,
    }
}

pub fn ids(objects: &[&str]) -> Vec<String> {
    objects.iter().map(|object| object.to_string()).collect()
}

pub fn create(target: &str, actor: &str, ts: u64) -> Operation {
    Operation::new(OperationKind::Create, Some(target), actor).with_timestamp(ts)
}

pub fn modify(target: &str, actor: &str, ts: u64, key: &str, value: impl Into<ParamValue>) -> Operation {
    Operation::new(OperationKind::Modify, Some(target), actor)
        .with_timestamp(ts)
        .with_param(key, value)
}

pub fn rotate(target: &str, actor: &str, ts: u64, angles: [f64; 3]) -> Operation {
    Operation::new(OperationKind::Rotate, Some(target), actor)
        .with_timestamp(ts)
        .with_param("angles", ParamValue::vec3(angles))
}

pub fn move_op(target: &str, actor: &str, ts: u64, offset: [f64; 3]) -> Operation {
    Operation::new(OperationKind::Move, Some(target), actor)
        .with_timestamp(ts)
        .with_param("offset", ParamValue::vec3(offset))
}
