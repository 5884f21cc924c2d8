//! Infrastructure shared by every safety mode: payload bit codec.
pub mod codec;
