//! # Quickstart Example
//!
//! Minimal walkthrough of korri-safety on a Nissan X-Trail layout:
//! - Select a safety mode from its numeric id
//! - Feed received frames and watch the vehicle state
//! - Ask the gatekeeper about outgoing steering and button frames
//! - Route frames between the vehicle and camera buses
//!
//! Timestamps are supplied by hand, so this runs the same on a host as on
//! the target.
//!
//! ```bash
//! cargo run --example quickstart
//! ```

use embassy_time::Instant;
use korri_safety::core::{FieldDescriptor, Payload};
use korri_safety::{CanFrame, SafetyContext, SafetyModeId, SafetyOptions};

/// LKAS angle command, 0.01 deg units with a 1310 deg offset.
const LKAS_ANGLE: FieldDescriptor = FieldDescriptor::big_endian(7, 18);
const LKAS_ACTIVE: FieldDescriptor = FieldDescriptor::bit(52);

fn lkas(desired: i32, active: bool) -> CanFrame {
    let mut payload = Payload::new();
    LKAS_ANGLE.insert(&mut payload, (131_000 - desired) as u32);
    LKAS_ACTIVE.insert(&mut payload, active as u32);
    CanFrame::on_bus(0, 0x169, payload.as_bytes()).expect("standard id")
}

fn frame(bus: u8, address: u32, data: &[u8]) -> CanFrame {
    CanFrame::on_bus(bus, address, data).expect("standard id")
}

fn main() {
    println!("=== korri-safety Quickstart ===\n");

    // ======================================================================
    // 1. Select the safety mode
    // ======================================================================
    println!("1. Initialising the Nissan safety mode");

    let mode: u16 = SafetyModeId::Nissan.into();
    let start = Instant::from_millis(0);
    let mut ctx = match SafetyContext::init(mode, 0, 0, SafetyOptions::default(), start) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("   Configuration rejected: {}", e);
            return;
        }
    };
    println!("   Mode: {:?}", ctx.hooks().id());
    println!("   RX check sets: {}", ctx.config().rx_checks.len());
    println!("   TX whitelist entries: {}\n", ctx.config().tx_msgs.len());

    // ======================================================================
    // 2. Receive frames
    // ======================================================================
    println!("2. Feeding vehicle frames");

    // Rear wheels at 0x0100 counts each: about 1.28 km/h
    let wheels = frame(0, 0x285, &[0x01, 0x00, 0x01, 0x00, 0, 0, 0, 0]);
    ctx.rx(&wheels, Instant::from_millis(10));
    println!("   Vehicle moving: {}", ctx.state().vehicle_moving());

    // Cruise state on the camera bus: off, then engaged
    ctx.rx(&frame(2, 0x30f, &[0x00, 0, 0]), Instant::from_millis(20));
    ctx.rx(&frame(2, 0x30f, &[0x08, 0, 0]), Instant::from_millis(30));
    println!("   Controls allowed: {}\n", ctx.controls_allowed());

    // ======================================================================
    // 3. Gate outgoing frames
    // ======================================================================
    println!("3. Checking outgoing commands");

    for (label, command) in [
        ("+3 deg", lkas(300, true)),
        ("+6 deg", lkas(600, true)),
        ("+601 deg", lkas(60_100, true)),
    ] {
        match ctx.check_tx(&command, Instant::from_millis(40)) {
            Ok(()) => println!("   LKAS {}: allowed", label),
            Err(denial) => println!("   LKAS {}: denied ({})", label, denial),
        }
    }

    let cancel = frame(2, 0x20b, &[0, 0x02, 0, 0, 0, 0]);
    let resume = frame(2, 0x20b, &[0, 0x04, 0, 0, 0, 0]);
    println!("   Cancel button: {}", ctx.tx(&cancel, Instant::from_millis(50)));
    println!("   Resume button: {}\n", ctx.tx(&resume, Instant::from_millis(50)));

    // ======================================================================
    // 4. Forward between buses
    // ======================================================================
    println!("4. Forwarding");

    let stock_lkas = lkas(0, false).with_bus(2);
    println!("   Stock LKAS while engaged -> {:?}", ctx.fwd(&stock_lkas));
    println!("   Wheel speeds -> {:?}", ctx.fwd(&wheels));

    // Brake pressed: engagement drops and the camera owns steering again
    ctx.rx(&frame(0, 0x454, &[0, 0, 0x80, 0, 0, 0, 0, 0]), Instant::from_millis(60));
    println!("   Stock LKAS after brake -> {:?}\n", ctx.fwd(&stock_lkas));

    // ======================================================================
    // 5. Periodic staleness check
    // ======================================================================
    println!("5. Ticking two seconds later");

    ctx.tick(Instant::from_millis(2_000));
    println!("   RX checks invalid: {}", ctx.rx_checks_invalid());

    println!("\n=== Done ===");
}
