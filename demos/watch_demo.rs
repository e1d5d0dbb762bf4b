//! Demonstration of the face capture detector.
//!
//! This example shows how to:
//! 1. Open a detector through the driver registry
//! 2. Receive face events until Ctrl+C or a timeout
//! 3. Inspect the runtime counters afterwards
//!
//! Run with: cargo run --example watch_demo -- <directory> [driver]
//!
//! Then copy a face file and its background into the directory, for example
//! `IMG001[M].jpg` followed by `IMG001[R].jpg` for the dahua driver.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use face_capture_detector::{DetectorConfig, DetectorEvent, DriverRegistry};

fn main() {
    println!("Face Capture Detector - Watch Demo");
    println!("==================================");
    println!();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("Usage: watch_demo <directory> [driver]");
        return;
    };
    let driver = args.next().unwrap_or_else(|| "dahua".to_string());

    let registry = DriverRegistry::builtin();
    println!("Available drivers: {}", registry.names().join(", "));

    // Short timers so the demo reacts quickly to hand-copied files.
    let config = DetectorConfig::new(&path)
        .with_fsnotifyloop_timeout(Duration::from_secs(1))
        .with_mainloop_timeout(Duration::from_secs(5));

    let detector = match registry.open(&driver, config) {
        Ok(detector) => Arc::new(detector),
        Err(e) => {
            eprintln!("Error starting detector: {e}");
            return;
        }
    };

    println!("Watching {path} with the {driver} driver for 60 seconds...");
    println!("Press Ctrl+C to stop early");
    println!();

    let handle = detector.clone();
    ctrlc::set_handler(move || {
        handle.close();
    })
    .expect("Error setting Ctrl+C handler");

    let deadline = Instant::now() + Duration::from_secs(60);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match detector.recv_timeout(remaining) {
            Ok(DetectorEvent::FaceDetected(face)) => {
                println!("Face detected at {}", face.timestamp.format("%H:%M:%S%.3f"));
                println!("  id:       {}", face.id);
                println!("  face:     {} bytes", face.face.len());
                match &face.snapshot {
                    Some(snapshot) => println!("  snapshot: {} bytes", snapshot.len()),
                    None => println!("  snapshot: none"),
                }
                println!();
            }
            Ok(other) => println!("Ignoring {} event", other.event_type()),
            Err(RecvTimeoutError::Timeout) => break,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    detector.close();

    println!("{}", detector.stats().summary());
    if let Some(exit) = detector.exit_status() {
        println!("Detector {exit}");
    }
}
