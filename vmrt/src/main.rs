//! # VMRT Binary
//!
//! Loads a module binary and lists or invokes its functions.
//!
//! # Usage
//!
//! ```bash
//! # List exported functions
//! vmrt --module arithmetic.vmbc --list
//!
//! # Invoke with two f32 vectors, trying an unknown driver first
//! vmrt --module arithmetic.vmbc --function simple_mul \
//!      --input 4xf32=1,2,3,4 --input 4xf32=4,5,6,7 --driver nothere,local-task
//!
//! # Record the module and the call
//! vmrt --module arithmetic.vmbc --function simple_mul ... --trace-dir /tmp/trace
//! ```

#![deny(warnings)]

use clap::Parser;
use std::path::PathBuf;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;
use vmrt::input::{format_value, parse_value};
use vmrt::{Config, ExecutionContext, HostValue, TraceValue, VmModule};
use vmrt_common::config::{ConfigLoader, RuntimeConfig};

/// VMRT - run functions of precompiled tensor-program modules
#[derive(Parser, Debug)]
#[command(name = "vmrt")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Load a module binary and invoke its exported functions")]
#[command(long_about = None)]
struct Args {
    /// Module binary to load
    #[arg(short, long, value_name = "FILE")]
    module: PathBuf,

    /// Function to invoke
    #[arg(short, long)]
    function: Option<String>,

    /// Call argument, e.g. 4xf32=1,2,3,4 or i32=5 (repeat in order)
    #[arg(short, long = "input", value_parser = parse_value, action = clap::ArgAction::Append)]
    inputs: Vec<HostValue>,

    /// Comma-separated driver priority list (overrides the config file)
    #[arg(short, long)]
    driver: Option<String>,

    /// Runtime configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Record module snapshots and calls into this directory
    #[arg(long, value_name = "DIR")]
    trace_dir: Option<PathBuf>,

    /// List exported functions and exit
    #[arg(short, long)]
    list: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs and results in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("vmrt failed: {}", e);
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut runtime = match &args.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };
    setup_tracing(&args, &runtime);

    info!("VMRT v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Some(drivers) = &args.driver {
        runtime.drivers = drivers.clone();
    }
    if let Some(dir) = &args.trace_dir {
        runtime.trace_dir = Some(dir.clone());
    }
    let config = Config::from_runtime_config(&runtime)?;

    let module = VmModule::load_file(&args.module)?;
    let mut context = ExecutionContext::dynamic(config)?;
    let bound = context.add_module(&module)?;

    if args.list || args.function.is_none() {
        for function in bound.functions() {
            println!("{function}");
        }
        return Ok(());
    }

    let name = args.function.as_deref().unwrap_or_default();
    let function = bound
        .get(name)
        .ok_or_else(|| format!("module '{}' has no function '{}'", bound.name(), name))?;
    let results = function.call(&args.inputs)?;

    for result in &results {
        if args.json {
            println!("{}", serde_json::to_string(&TraceValue::capture(result)?)?);
        } else {
            println!("{}", format_value(result)?);
        }
    }
    Ok(())
}

/// Setup tracing subscriber from CLI arguments and the config file.
fn setup_tracing(args: &Args, runtime: &RuntimeConfig) {
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(runtime.log_level.as_directive()))
    };

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
