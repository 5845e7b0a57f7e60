//! Device and driver integration tests for VMRT HAL

use std::sync::Arc;
use vmrt_common::hal::driver::HalError;
use vmrt_common::hal::types::{BinaryOp, HostArray, UnaryOp};
use vmrt_hal::drivers::local::{create_sync_driver, create_task_driver};
use vmrt_hal::{Device, DeviceCache, DriverRegistry};

#[test]
fn test_global_cache_shares_devices() -> Result<(), HalError> {
    let a = DeviceCache::global().resolve("nothere1,local-sync")?;
    let b = DeviceCache::global().resolve("nothere1,local-sync")?;
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.driver_name(), "local-sync");
    Ok(())
}

#[test]
fn test_global_cache_rejects_unavailable_list() {
    let err = DeviceCache::global().resolve("nothere1,nothere2").unwrap_err();
    assert_eq!(err.to_string(), "No device found from list \"nothere1,nothere2\"");
}

#[test]
fn test_empty_list_is_unavailable() {
    let cache = DeviceCache::with_registry(DriverRegistry::with_builtin_drivers());
    assert!(cache.resolve("").is_err());
    assert!(cache.resolve(" , ").is_err());
}

#[test]
fn test_concurrent_same_key_from_many_threads() {
    let cache = Arc::new(DeviceCache::with_registry(DriverRegistry::with_builtin_drivers()));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || cache.resolve("nothere,local-task").unwrap().id())
        })
        .collect();
    let ids: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_task_driver_matches_sync_driver() -> Result<(), HalError> {
    let sync = Device::new(create_sync_driver())?;
    let task = Device::new(create_task_driver())?;
    let len = 10_000;
    let lhs = HostArray::new([len], (0..len as i64).collect::<Vec<_>>())?;
    let rhs = HostArray::new([len], (0..len as i64).map(|v| v % 7 - 3).collect::<Vec<_>>())?;

    for op in [BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul, BinaryOp::Max, BinaryOp::Min] {
        let a = sync.dispatch_binary(op, &sync.upload(&lhs), &sync.upload(&rhs))?;
        let b = task.dispatch_binary(op, &task.upload(&lhs), &task.upload(&rhs))?;
        assert_eq!(sync.download(&a)?, task.download(&b)?, "{op:?}");
    }
    let a = sync.dispatch_unary(UnaryOp::Abs, &sync.upload(&rhs))?;
    let b = task.dispatch_unary(UnaryOp::Abs, &task.upload(&rhs))?;
    assert_eq!(sync.download(&a)?, task.download(&b)?);
    Ok(())
}

#[test]
fn test_integer_division_by_zero_fails() -> Result<(), HalError> {
    let device = Device::new(create_task_driver())?;
    let lhs = device.upload(&HostArray::from_slice(&[1i32, 2]));
    let rhs = device.upload(&HostArray::from_slice(&[1i32, 0]));
    let err = device.dispatch_binary(BinaryOp::Div, &lhs, &rhs).unwrap_err();
    assert!(matches!(err, HalError::DispatchFailed(_)));
    Ok(())
}

#[test]
fn test_foreign_buffers_are_rejected() -> Result<(), HalError> {
    let a = Device::new(create_sync_driver())?;
    let b = Device::new(create_sync_driver())?;
    let view = a.upload(&HostArray::from_slice(&[1.0f64]));
    assert!(matches!(b.download(&view), Err(HalError::ForeignBuffer { .. })));

    let imported = b.import(&a, &view)?;
    assert_eq!(imported.device_id(), b.id());
    assert_eq!(b.download(&imported)?.as_slice::<f64>(), Some(&[1.0][..]));
    Ok(())
}
