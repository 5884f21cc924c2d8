//! Signal codec: bit-level primitives (`bits`) and the descriptor-driven
//! extraction engine (`engine`).
pub mod bits;
pub mod engine;
