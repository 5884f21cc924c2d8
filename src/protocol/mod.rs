//! Protocol-facing components: the CAN frame model handed over by the bus driver.
pub mod transport;
