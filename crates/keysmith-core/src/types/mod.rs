//! Core types for Keysmith.

mod access;

pub use access::*;
