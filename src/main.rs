//! speakkey - push-to-talk voice-to-text
//!
//! Run with `speakkey` (or `speakkey run`) to start the daemon.
//! `speakkey backends` and `speakkey devices` print what the machine has.

use clap::{Parser, Subcommand};
use speakkey::audio::CpalCapture;
use speakkey::backend::BackendRegistry;
use speakkey::orchestrator::{OrchestratorOptions, PresetOrchestrator};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "speakkey")]
#[command(author, version, about = "Push-to-talk voice-to-text")]
#[command(long_about = "
Speakkey binds global keyboard chords to transcription presets.
Hold a chord (or toggle it) while speaking; the transcription is pasted
into the focused window. All processing is local.

Models are GGML whisper files (ggml-<name>.bin) in the models directory;
GPU backends are optional ggml libraries placed next to the executable.
")]
struct Cli {
    /// Path to config file (default: portable or per-user config.json)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon (default if no command is given)
    Run,

    /// List compute backends and their availability
    Backends,

    /// List audio capture devices
    Devices,

    /// Load the config file, migrating a legacy layout if found
    MigrateConfig,
}

fn init_logging(cli: &Cli) {
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_sig: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

fn install_signal_handlers() {
    let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
    unsafe {
        libc::signal(libc::SIGINT, handler);
        libc::signal(libc::SIGTERM, handler);
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let exit_code = match cli.command.as_ref().unwrap_or(&Commands::Run) {
        Commands::Run => run_daemon(&cli),
        Commands::Backends => {
            print_backends();
            0
        }
        Commands::Devices => {
            print_devices();
            0
        }
        Commands::MigrateConfig => {
            migrate_config(&cli);
            0
        }
    };
    std::process::exit(exit_code);
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .clone()
        .unwrap_or_else(speakkey::config::config_path)
}

fn run_daemon(cli: &Cli) -> i32 {
    let config_path = config_path(cli);
    tracing::info!("speakkey {} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!("config: {:?}", config_path);

    let orchestrator = PresetOrchestrator::new(OrchestratorOptions::system(config_path));
    if let Err(e) = orchestrator.init() {
        tracing::error!("init failed: {}", e);
        return 1;
    }

    install_signal_handlers();
    tracing::info!("ready; waiting for hotkeys (Ctrl+C to quit)");

    while !SHUTDOWN.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }

    tracing::info!("shutting down");
    // An in-flight inference is not abortable; budget 2 s and hard-exit.
    let watchdog = std::thread::spawn(|| {
        std::thread::sleep(Duration::from_secs(2));
        tracing::warn!("shutdown timeout, forcing exit");
        std::process::exit(0);
    });
    orchestrator.shutdown();
    drop(watchdog);
    0
}

fn print_backends() {
    let registry = BackendRegistry::new();
    let infos = registry.enumerate();

    println!("{:<8} {:<8} {:>8} {:>8} {:>9}  {}", "ID", "NAME", "PRESENT", "RUNTIME", "USABLE", "DETAIL");
    for info in &infos {
        let detail = if !info.unavailable_reason.is_empty() {
            info.unavailable_reason.clone()
        } else if !info.gpu_detected.is_empty() {
            info.gpu_detected.clone()
        } else {
            String::new()
        };
        println!(
            "{:<8} {:<8} {:>8} {:>8} {:>9}  {}",
            info.id,
            info.name,
            if info.present { "yes" } else { "no" },
            if info.runtime_available { "yes" } else { "no" },
            if info.usable() { "yes" } else { "no" },
            detail
        );
    }

    let cfg = speakkey::config::load();
    println!("\nconfigured: {}", cfg.backend);
    println!("active:     {}", registry.active(&cfg.backend));
}

fn print_devices() {
    let devices = CpalCapture::list_devices();
    if devices.is_empty() {
        println!("no audio input devices found");
        return;
    }
    println!("audio input devices:");
    for name in devices {
        println!("  {}", name);
    }
}

fn migrate_config(cli: &Cli) {
    let path = config_path(cli);
    let cfg = speakkey::config::load_from(&path);
    println!(
        "config at {:?}: {} preset(s), backend {}",
        path,
        cfg.presets.len(),
        cfg.backend
    );
}
