//! Face Capture Detector CLI
//!
//! Watches a camera drop directory and prints one line per face capture.

use clap::{Parser, Subcommand};
use face_capture_detector::{
    Config, DetectorEvent, DetectorExit, DriverRegistry, FaceDetected, VERSION,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "face-detector")]
#[command(version = VERSION)]
#[command(about = "Pairs camera face crops with their background snapshots", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a directory and print detected faces
    Watch {
        /// Driver (file naming convention) to use
        #[arg(long, short)]
        driver: Option<String>,

        /// Directory the camera writes into
        #[arg(long, short)]
        path: Option<PathBuf>,

        /// Per-file debounce window in milliseconds
        #[arg(long)]
        debounce_ms: Option<u64>,

        /// How long a face waits for its background, in milliseconds
        #[arg(long)]
        flush_ms: Option<u64>,

        /// Watch loop idle interval in milliseconds
        #[arg(long)]
        idle_ms: Option<u64>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// List available drivers
    Drivers,

    /// Show the effective configuration
    Config {
        /// Write the configuration file
        #[arg(long)]
        save: bool,
    },
}

struct WatchArgs {
    driver: Option<String>,
    path: Option<PathBuf>,
    debounce_ms: Option<u64>,
    flush_ms: Option<u64>,
    idle_ms: Option<u64>,
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.config.unwrap_or_else(Config::config_path);

    match cli.command {
        Commands::Watch {
            driver,
            path,
            debounce_ms,
            flush_ms,
            idle_ms,
            json,
        } => {
            let args = WatchArgs {
                driver,
                path,
                debounce_ms,
                flush_ms,
                idle_ms,
                json,
            };
            cmd_watch(&config_path, args);
        }
        Commands::Drivers => {
            cmd_drivers();
        }
        Commands::Config { save } => {
            cmd_config(&config_path, save);
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &Path) -> Config {
    match Config::load_from(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config {path:?}: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_watch(config_path: &Path, args: WatchArgs) {
    let mut config = load_config(config_path);

    if let Some(driver) = args.driver {
        config.driver = driver;
    }
    if let Some(path) = args.path {
        config.detector.path = path;
    }
    if let Some(ms) = args.debounce_ms {
        config.detector.fsnotifyloop_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = args.flush_ms {
        config.detector.mainloop_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = args.idle_ms {
        config.detector.watchloop_interval = Duration::from_millis(ms);
    }

    let registry = DriverRegistry::builtin();
    let detector = match registry.open(&config.driver, config.detector.clone()) {
        Ok(detector) => Arc::new(detector),
        Err(e) => {
            eprintln!("Error starting face detector: {e}");
            std::process::exit(1);
        }
    };

    if !args.json {
        println!("Face Capture Detector v{VERSION}");
        println!();
        println!("  Driver: {}", config.driver);
        println!("  Path: {}", config.detector.path.display());
        println!(
            "  Debounce window: {}ms",
            config.detector.fsnotifyloop_timeout.as_millis()
        );
        println!(
            "  Face flush timeout: {}ms",
            config.detector.mainloop_timeout.as_millis()
        );
        println!();
        println!("Press Ctrl+C to stop");
        println!();
    }

    // Closing from the signal handler ends the event loop below.
    let handle = detector.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        handle.close();
    }) {
        eprintln!("Warning: could not install Ctrl+C handler: {e}");
    }

    while let Some(event) = detector.recv() {
        match event {
            DetectorEvent::FaceDetected(face) => print_face(&face, args.json),
            other => {
                tracing::warn!(event_type = other.event_type(), "unexpected event type");
            }
        }
    }

    detector.close();

    if !args.json {
        println!();
        println!("{}", detector.stats().summary());
    }

    match detector.exit_status() {
        Some(DetectorExit::Failed(e)) => {
            eprintln!("Face detector failed: {e}");
            std::process::exit(1);
        }
        _ => {
            if !args.json {
                println!("Face detector closed.");
            }
        }
    }
}

fn print_face(face: &FaceDetected, json: bool) {
    let summary = face.summary();
    if json {
        match serde_json::to_string(&summary) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("Error serializing event: {e}"),
        }
        return;
    }

    let snapshot = match summary.snapshot_bytes {
        Some(bytes) => format!("{bytes} bytes"),
        None => "none".to_string(),
    };
    println!(
        "[{}] Face detected: id={} face={} bytes snapshot={}",
        summary.timestamp.format("%H:%M:%S"),
        summary.id,
        summary.face_bytes,
        snapshot
    );
}

fn cmd_drivers() {
    let registry = DriverRegistry::builtin();
    println!("Available drivers:");
    for name in registry.names() {
        println!("  {name}");
    }
}

fn cmd_config(config_path: &Path, save: bool) {
    let config = load_config(config_path);

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {config_path:?}");
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );

    if save {
        if let Err(e) = config.save_to(config_path) {
            eprintln!("Error saving config: {e}");
            std::process::exit(1);
        }
        println!();
        println!("Saved to {config_path:?}");
    }
}
