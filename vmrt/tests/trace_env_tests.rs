//! Tracing enabled through `VMRT_TRACE_PATH`.
//!
//! Kept in its own test binary: the variable is process-wide and would leak
//! into every other test running alongside it.

mod common;

use common::create_simple_mul_module;
use std::sync::Arc;
use tempfile::TempDir;
use vmrt::{Config, ExecutionContext, HostValue, Result, Tracer};
use vmrt_common::consts::TRACE_PATH_ENV_KEY;
use vmrt_common::hal::types::HostArray;

#[test]
fn test_tracing_from_environment() -> Result<()> {
    let env_dir = TempDir::new().unwrap();
    let explicit_dir = TempDir::new().unwrap();
    // SAFETY: this is the only test in this binary, nothing else reads the
    // environment concurrently.
    unsafe { std::env::set_var(TRACE_PATH_ENV_KEY, env_dir.path()) };

    let config = Config::new("local-task")?;
    assert_eq!(config.tracer().map(|t| t.dir()), Some(env_dir.path()));

    let mut ctx = ExecutionContext::dynamic(config)?;
    ctx.add_module(&create_simple_mul_module())?;
    let arg0 = HostValue::from(HostArray::from_slice(&[1.0f32, 2.0, 3.0, 4.0]));
    let arg1 = HostValue::from(HostArray::from_slice(&[4.0f32, 5.0, 6.0, 7.0]));
    ctx.modules()["arithmetic"]["simple_mul"].call(&[arg0, arg1])?;

    assert!(env_dir.path().join("arithmetic.vmbc").exists());
    assert!(env_dir.path().join("calls.yaml").exists());
    assert_eq!(Tracer::read_call_log(&env_dir.path().join("calls.yaml"))?.len(), 1);

    // A second config on the same directory shares the tracer, so the log
    // keeps one sequence and the module snapshot is not rewritten.
    let second = Config::new("local-sync")?;
    assert!(Arc::ptr_eq(
        second.tracer().unwrap(),
        ctx.config().tracer().unwrap()
    ));
    let snapshot = env_dir.path().join("arithmetic.vmbc");
    std::fs::write(&snapshot, b"marker").unwrap();

    let mut ctx2 = ExecutionContext::dynamic(second)?;
    ctx2.add_module(&create_simple_mul_module())?;
    let arg0 = HostValue::from(HostArray::from_slice(&[2.0f32, 2.0, 2.0, 2.0]));
    let arg1 = HostValue::from(HostArray::from_slice(&[1.0f32, 2.0, 3.0, 4.0]));
    ctx2.modules()["arithmetic"]["simple_mul"].call(&[arg0.clone(), arg1.clone()])?;
    ctx.modules()["arithmetic"]["simple_mul"].call(&[arg0, arg1])?;

    assert_eq!(std::fs::read(&snapshot).unwrap(), b"marker");
    let entries = Tracer::read_call_log(&env_dir.path().join("calls.yaml"))?;
    assert_eq!(entries.iter().map(|e| e.seq).collect::<Vec<_>>(), [0, 1, 2]);
    assert_ne!(entries[1].context, entries[2].context);

    // An explicit tracer wins over the environment.
    let tracer = Arc::new(Tracer::new(explicit_dir.path())?);
    let config = Config::with_tracer("local-task", Some(tracer))?;
    assert_eq!(config.tracer().map(|t| t.dir()), Some(explicit_dir.path()));

    unsafe { std::env::remove_var(TRACE_PATH_ENV_KEY) };
    assert!(Config::new("local-task")?.tracer().is_none());
    Ok(())
}
