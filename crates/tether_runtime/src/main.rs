//! Tether Runtime
//!
//! Boots the interop layer and a script context, then drives a fixed number
//! of frames: advance the clock, call the script's `update`, drain jobs.
//!
//! Usage: `tether [--settings <path>] [script.js]`

mod settings;

use anyhow::{Context as _, Result};
use clap::Parser;
use settings::{Settings, SETTINGS_ENV};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use tether_interop::{HostEnvironment, InteropRuntime, InteropValue};
use tether_script::ScriptRuntime;
use tracing_subscriber::EnvFilter;

const DEMO_SCRIPT: &str = r#"
var frames = 0;
function update(dt) {
    frames += 1;
    if (frames % 30 === 0) {
        var t = __invoke('Time', 'time', 2, true, 0);
        var s = __invoke('Mathf', 'sin', 1, true, 0, [t]);
        console.log('frame', frames, 'time', t.toFixed(3), 'sin', s.toFixed(3));
    }
}
"#;

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Runs a script against the Tether host bindings", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON settings file (falls back to $TETHER_SETTINGS)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Script to run instead of the built-in demo
    script: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Tether v{}", tether_core::VERSION);

    let args = Cli::parse();
    let settings_path = args
        .settings
        .or_else(|| std::env::var_os(SETTINGS_ENV).map(PathBuf::from));
    let settings = match &settings_path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::default(),
    };
    tracing::debug!("Settings: {:?}", settings);

    let env = HostEnvironment::new(settings.seed);
    *env.screen.borrow_mut() = settings.screen;

    let interop = Rc::new(RefCell::new(InteropRuntime::with_host(
        settings.interop.clone(),
        env.clone(),
    )));
    let script = ScriptRuntime::new(interop.clone(), settings.script.clone())?;

    match &args.script {
        Some(path) => script
            .execute_file(path)
            .with_context(|| format!("running {}", path.display()))?,
        None => script.execute(DEMO_SCRIPT)?,
    }

    let has_update = script.has_function("update");
    if !has_update {
        tracing::warn!("Script defines no update function; only jobs will run");
    }

    for _ in 0..settings.frames {
        env.clock.borrow_mut().advance(settings.delta_time);
        if has_update {
            let dt = env.clock.borrow().delta_time();
            script.call_function("update", &[InteropValue::Float32(dt)])?;
        }
        script.tick()?;
    }

    let clock = env.clock.borrow();
    tracing::info!(
        "Ran {} frames ({:.3}s), {} bindings, {} live handles",
        clock.frame_count(),
        clock.time(),
        interop.borrow().count(),
        interop.borrow().handles().len()
    );

    Ok(())
}
