//! Example: a full session against the simulated cap.
//!
//! Run with: `RUST_LOG=debug cargo run --example sync_session`

use mousecap_core::{
    ControlState, LogFacade, MockTransport, SyncConfig, SyncError, SyncOrchestrator,
    inbound_channel,
};

fn main() -> Result<(), SyncError> {
    // Initialize logging (optional)
    env_logger::init();

    let mut device = ControlState::default();
    device.amplitude = 20;
    device.cap_id = 4;

    let (tx, rx) = inbound_channel();
    let link = MockTransport::new(tx)
        .with_device(device)
        .with_battery_percent(65);
    let mut session = SyncOrchestrator::new(link, rx, LogFacade, SyncConfig::default());

    println!("Connecting...");
    session.connect()?;

    let state = session.state();
    println!(
        "Cap {}: amplitude={}% ({} uA @ 1k), frequency={} Hz, pulse={} us, battery={:?}%",
        state.cap_id_label(),
        state.amplitude,
        state.amplitude_microamps(),
        state.frequency_hz,
        state.pulse_duration_us,
        state.battery_percent()
    );

    // Let the post-connect settling window pass so edits count
    std::thread::sleep(session.config().settle_delay);

    session.set_amplitude(45);
    session.set_frequency(150);
    println!("Status after edits: {:?}", session.status());

    match session.sync() {
        Ok(command) => println!("Pushed: {}", command),
        Err(e) => eprintln!("Sync failed: {}", e),
    }

    session.toggle_led()?;
    session.disconnect();
    Ok(())
}
