//! Transport layer seen by the safety core: the frame representation shared
//! by the RX and TX hooks.
pub mod can_frame;
