//! Shared building blocks: constants, account codec, amounts, blocks, signatures.
//!
//! Everything here is pure computation and compiles for both native and wasm targets.

pub mod address;
pub mod amount;
pub mod block;
pub mod constants;
pub mod message;
pub mod signature;
