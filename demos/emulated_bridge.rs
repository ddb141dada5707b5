//! End-to-end bridge run against the firmware emulator.
//!
//! Demonstrates:
//! - Starting a bridge over the emulated device
//! - Receiving pushed events through the event handler
//! - LED, accelerometer and temperature commands
//! - Error events for malformed messages
//! - Session destruction and query
//!
//! Usage:
//!   cargo run --example emulated_bridge
//!   cargo run --example emulated_bridge -- --debug

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serial_bridge::{Bridge, EmulatedDevice, Event, Request, Result, SessionHandle};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let debug = std::env::args().any(|arg| arg == "--debug");
    init_logging(debug);

    if let Err(e) = run().await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        "serial_bridge=trace"
    } else {
        "serial_bridge=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

async fn run() -> Result<()> {
    println!("=== Serial bridge over emulated device ===\n");

    // ========================================================================
    // Start
    // ========================================================================

    let (device, probe) = EmulatedDevice::new();
    probe.set_accelerometer([12, -340, 1016]);
    probe.set_temperature_sample(1000);

    let bridge = Bridge::builder()
        .reset_delay(Duration::ZERO)
        .start_with_transport(device)
        .await?;

    bridge.set_event_handler(Box::new(|event: &Event| {
        println!("[push] {} tx={:?} {}", event.handle, event.transaction, event.body);
    }));

    let handle = SessionHandle::new(0x1);
    bridge.create_session(handle)?;
    println!("[Setup] Session {handle} created\n");

    // ========================================================================
    // Commands
    // ========================================================================

    let messages = [
        ("led-on", r#"{"command":0,"id":3}"#),
        ("led-off", r#"{"command":"off","id":3}"#),
        ("accel", r#"{"message":{"command":2,"id":1}}"#),
        ("temp", r#"{"command":2,"id":2}"#),
        ("empty", ""),
        ("broken", "{bad"),
        ("unknown", r#"{"command":9,"id":3}"#),
    ];

    for (transaction, body) in messages {
        let event = bridge
            .handle_message(
                Request::new(handle)
                    .with_transaction(transaction)
                    .with_message(body),
            )?
            .wait_timeout(REPLY_TIMEOUT)
            .await?;

        match event.error_code() {
            Some(code) => println!("[{transaction}] error {code}: {}", event.get_string("error")),
            None => println!("[{transaction}] ok"),
        }
    }

    println!("\n[Device] frames received: {}", probe.frames().len());
    println!("[Device] LED 3 on: {:?}", probe.led(3));

    // ========================================================================
    // Teardown
    // ========================================================================

    bridge.slow_link(handle, true)?;
    bridge.destroy_session(handle)?;
    if let Some(state) = bridge.query_session(handle) {
        println!("[Query] {state}");
    }

    bridge.shutdown().await;
    println!("\n=== Done ===");
    Ok(())
}
