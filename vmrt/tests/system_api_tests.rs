//! System API tests: configs, contexts, invocation and tracing.

mod common;

use common::create_simple_mul_module;
use std::sync::Arc;
use tempfile::TempDir;
use vmrt::{
    Config, ExecutionContext, HostValue, Result, RuntimeError, TraceValue, Tracer, load_vm_module,
};
use vmrt_common::hal::types::HostArray;

fn arg0() -> HostValue {
    HostArray::from_slice(&[1.0f32, 2.0, 3.0, 4.0]).into()
}

fn arg1() -> HostValue {
    HostArray::from_slice(&[4.0f32, 5.0, 6.0, 7.0]).into()
}

fn snapshot_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .path()
                .extension()
                .is_some_and(|ext| ext == "vmbc")
        })
        .count()
}

#[test]
fn test_non_existing_driver() {
    let err = Config::new("nothere1,nothere2").unwrap_err();
    assert!(matches!(err, RuntimeError::DriverResolution { .. }));
    assert!(err.to_string().contains("No device found from list"));
    assert!(err.to_string().contains("nothere1,nothere2"));
}

#[test]
fn test_subsequent_driver() -> Result<()> {
    let config = Config::new("nothere1,local-task")?;
    assert_eq!(config.device().driver_name(), "local-task");
    Ok(())
}

#[test]
fn test_multi_config_caches() -> Result<()> {
    let config1 = Config::new("nothere1,local-sync")?;
    let config2 = Config::new("nothere1,local-sync")?;
    assert!(Arc::ptr_eq(config1.device(), config2.device()));
    Ok(())
}

#[test]
fn test_empty_dynamic() -> Result<()> {
    let ctx = ExecutionContext::new_default()?;
    assert!(ctx.is_dynamic());
    assert!(ctx.modules().contains("hal"));
    assert_eq!(ctx.modules()["hal"].name(), "hal");
    assert_eq!(ctx.modules().len(), 1);
    Ok(())
}

#[test]
fn test_empty_static() -> Result<()> {
    let mut ctx = ExecutionContext::new(Config::default_config()?, Some(Vec::new()))?;
    assert!(!ctx.is_dynamic());
    assert_eq!(ctx.modules().names().collect::<Vec<_>>(), ["hal"]);

    let err = ctx.add_module(&create_simple_mul_module()).unwrap_err();
    assert!(matches!(err, RuntimeError::InvalidState(_)));
    assert_eq!(ctx.modules().len(), 1);
    Ok(())
}

#[test]
fn test_static_with_modules() -> Result<()> {
    let ctx = ExecutionContext::with_modules(Config::default_config()?, [create_simple_mul_module()])?;
    assert!(!ctx.is_dynamic());
    assert_eq!(ctx.modules().names().collect::<Vec<_>>(), ["hal", "arithmetic"]);

    let results = ctx.modules()["arithmetic"]["simple_mul"].call(&[arg0(), arg1()])?;
    assert_eq!(results[0].to_vec::<f32>()?, vec![4.0, 10.0, 18.0, 28.0]);
    Ok(())
}

#[test]
fn test_custom_dynamic() -> Result<()> {
    let mut ctx = ExecutionContext::new_default()?;
    assert!(ctx.is_dynamic());
    ctx.add_module(&create_simple_mul_module())?;
    assert_eq!(ctx.modules()["arithmetic"].name(), "arithmetic");

    let f = &ctx.modules()["arithmetic"]["simple_mul"];
    assert_eq!(
        f.to_string(),
        "<VmFunction simple_mul(0rr_r), reflection = {}>"
    );
    Ok(())
}

#[test]
fn test_duplicate_module() -> Result<()> {
    let mut ctx = ExecutionContext::new_default()?;
    ctx.add_module(&create_simple_mul_module())?;

    let err = ctx.add_module(&create_simple_mul_module()).unwrap_err();
    assert!(matches!(err, RuntimeError::ModuleNameCollision { .. }));
    assert!(err.to_string().contains("arithmetic"));
    assert_eq!(ctx.modules().names().collect::<Vec<_>>(), ["hal", "arithmetic"]);
    Ok(())
}

#[test]
fn test_static_invoke() -> Result<()> {
    let mut ctx = ExecutionContext::new_default()?;
    ctx.add_module(&create_simple_mul_module())?;
    let f = &ctx.modules()["arithmetic"]["simple_mul"];

    let results = f.call(&[arg0(), arg1()])?;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].to_vec::<f32>()?, vec![4.0, 10.0, 18.0, 28.0]);
    Ok(())
}

#[test]
fn test_chained_invoke() -> Result<()> {
    let mut ctx = ExecutionContext::new_default()?;
    ctx.add_module(&create_simple_mul_module())?;
    let f = &ctx.modules()["arithmetic"]["simple_mul"];

    let results = f.call(&[arg0(), arg1()])?;
    assert!(results[0].as_device().is_some());
    let results2 = f.call(&[results[0].clone(), results[0].clone()])?;
    assert_eq!(results2[0].to_vec::<f32>()?, vec![16.0, 100.0, 324.0, 784.0]);
    Ok(())
}

#[test]
fn test_arity_and_type_errors() -> Result<()> {
    let mut ctx = ExecutionContext::new_default()?;
    ctx.add_module(&create_simple_mul_module())?;
    let f = &ctx.modules()["arithmetic"]["simple_mul"];

    let err = f.call(&[arg0()]).unwrap_err();
    assert!(matches!(err, RuntimeError::Arity { expected: 2, actual: 1, .. }));

    let wrong = HostValue::from(HostArray::from_slice(&[1.0f32, 2.0]));
    let err = f.call(&[arg0(), wrong]).unwrap_err();
    assert!(matches!(err, RuntimeError::TypeMismatch { index: 1, .. }));

    let err = f.call(&[arg0(), HostValue::from(2.0f32)]).unwrap_err();
    assert!(matches!(err, RuntimeError::TypeMismatch { index: 1, .. }));
    Ok(())
}

fn verify_tracing(config: Config, temp_dir: &std::path::Path) -> Result<()> {
    let mut ctx = ExecutionContext::dynamic(config)?;
    ctx.add_module(&create_simple_mul_module())?;
    let f = &ctx.modules()["arithmetic"]["simple_mul"];

    let results = f.call(&[arg0(), arg1()])?;
    assert!(temp_dir.join("arithmetic.vmbc").exists());
    assert!(temp_dir.join("calls.yaml").exists());
    assert_eq!(snapshot_count(temp_dir), 1);

    let entries = Tracer::read_call_log(&temp_dir.join("calls.yaml"))?;
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.module, "arithmetic");
    assert_eq!(entry.function, "simple_mul");
    assert_eq!(entry.calling_convention, "0rr_r");
    assert_eq!(entry.context, ctx.id());
    assert_eq!(
        entry.inputs,
        vec![TraceValue::capture(&arg0())?, TraceValue::capture(&arg1())?]
    );
    assert_eq!(entry.outputs, vec![TraceValue::capture(&results[0])?]);

    f.call(&[results[0].clone(), results[0].clone()])?;
    let entries = Tracer::read_call_log(&temp_dir.join("calls.yaml"))?;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].seq, 1);
    assert_eq!(snapshot_count(temp_dir), 1);
    Ok(())
}

#[test]
fn test_tracing_explicit() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let tracer = Arc::new(Tracer::new(temp_dir.path())?);
    let config = Config::with_tracer("local-task", Some(tracer))?;
    verify_tracing(config, temp_dir.path())
}

#[test]
fn test_tracing_from_runtime_config() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let runtime = vmrt_common::config::RuntimeConfig {
        trace_dir: Some(temp_dir.path().to_path_buf()),
        ..Default::default()
    };
    verify_tracing(Config::from_runtime_config(&runtime)?, temp_dir.path())
}

#[test]
fn test_failed_invocation_is_not_traced() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let tracer = Arc::new(Tracer::new(temp_dir.path())?);
    let mut ctx = ExecutionContext::dynamic(Config::with_tracer("local-task", Some(tracer))?)?;
    ctx.add_module(&create_simple_mul_module())?;

    assert!(ctx.modules()["arithmetic"]["simple_mul"].call(&[arg0()]).is_err());
    assert!(!temp_dir.path().join("calls.yaml").exists());
    Ok(())
}

#[test]
fn test_hal_module_is_not_snapshotted() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let tracer = Arc::new(Tracer::new(temp_dir.path())?);
    let _ctx = ExecutionContext::dynamic(Config::with_tracer("local-task", Some(tracer))?)?;
    assert_eq!(snapshot_count(temp_dir.path()), 0);
    Ok(())
}

#[test]
fn test_replay_from_call_log() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let tracer = Arc::new(Tracer::new(temp_dir.path())?);
    let mut ctx = ExecutionContext::dynamic(Config::with_tracer("local-task", Some(tracer))?)?;
    ctx.add_module(&create_simple_mul_module())?;
    let f = &ctx.modules()["arithmetic"]["simple_mul"];
    let first = f.call(&[arg0(), arg1()])?;
    f.call(&[first[0].clone(), arg1()])?;

    // Fresh context, untraced, loading the snapshot back from disk.
    let module = vmrt::VmModule::load_file(&temp_dir.path().join("arithmetic.vmbc"))?;
    let replay = load_vm_module(&module, Some(Config::new("local-sync")?))?;
    for entry in Tracer::read_call_log(&temp_dir.path().join("calls.yaml"))? {
        let outputs = replay[entry.function.as_str()].call(&entry.input_values()?)?;
        let outputs = outputs
            .iter()
            .map(TraceValue::capture)
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(outputs, entry.outputs);
    }
    Ok(())
}

#[test]
fn test_concurrent_invocations_are_all_logged() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let tracer = Arc::new(Tracer::new(temp_dir.path())?);
    let mut ctx = ExecutionContext::dynamic(Config::with_tracer("local-task", Some(tracer))?)?;
    ctx.add_module(&create_simple_mul_module())?;
    let f = ctx.modules()["arithmetic"]["simple_mul"].clone();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let f = f.clone();
            std::thread::spawn(move || -> Result<()> {
                for _ in 0..5 {
                    let out = f.call(&[arg0(), arg1()])?;
                    assert_eq!(out[0].to_vec::<f32>()?, vec![4.0, 10.0, 18.0, 28.0]);
                }
                Ok(())
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap()?;
    }

    let entries = Tracer::read_call_log(&temp_dir.path().join("calls.yaml"))?;
    assert_eq!(entries.len(), 20);
    assert!(entries.iter().enumerate().all(|(i, e)| e.seq == i as u64));
    Ok(())
}

#[test]
fn test_load_vm_module() -> Result<()> {
    let arithmetic = load_vm_module(&create_simple_mul_module(), None)?;
    let results = arithmetic["simple_mul"].call(&[arg0(), arg1()])?;
    assert_eq!(results[0].to_vec::<f32>()?, vec![4.0, 10.0, 18.0, 28.0]);
    Ok(())
}

#[test]
fn test_load_multiple_modules() -> Result<()> {
    let m = create_simple_mul_module();
    let m1 = load_vm_module(&m, None)?;
    let m2 = load_vm_module(&m, None)?;

    let r1 = m1["simple_mul"].call(&[arg0(), arg1()])?;
    let r2 = m2["simple_mul"].call(&[r1[0].clone(), arg1()])?;
    assert_eq!(r1[0].to_vec::<f32>()?, vec![4.0, 10.0, 18.0, 28.0]);
    assert_eq!(r2[0].to_vec::<f32>()?, vec![16.0, 50.0, 108.0, 196.0]);
    Ok(())
}
