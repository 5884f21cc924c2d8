//! Frame and clock builders shared by the integration tests.
#![allow(dead_code)]
use embassy_time::Instant;
use korri_safety::core::{FieldDescriptor, Payload};
use korri_safety::CanFrame;

/// Monotonic test clock in milliseconds.
pub fn at(ms: u64) -> Instant {
    Instant::from_millis(ms)
}

pub fn frame(bus: u8, address: u32, data: &[u8]) -> CanFrame {
    CanFrame::on_bus(bus, address, data).expect("valid test frame")
}

/// Frame of `len` bytes with the given raw field values packed in.
pub fn packed(bus: u8, address: u32, len: usize, fields: &[(FieldDescriptor, u32)]) -> CanFrame {
    let mut payload = Payload::new();
    for (field, raw) in fields {
        field.insert(&mut payload, *raw);
    }
    frame(bus, address, &payload.as_bytes()[..len])
}

/// Clock advancing by a fixed step on every call.
pub struct Ticker {
    now_ms: u64,
    step_ms: u64,
}

impl Ticker {
    pub fn new(start_ms: u64, step_ms: u64) -> Self {
        Self {
            now_ms: start_ms,
            step_ms,
        }
    }

    pub fn next(&mut self) -> Instant {
        self.now_ms += self.step_ms;
        at(self.now_ms)
    }

    pub fn now(&self) -> Instant {
        at(self.now_ms)
    }
}
