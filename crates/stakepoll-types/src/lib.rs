//! Stakepoll Types - Core type definitions for the Stakepoll governance engine.
//!
//! This crate provides:
//! - Member addresses (20-byte, Bech32m encoded)
//! - Content hashes (32-byte, blake3 digests)
//! - Fixed-size text labels for poll metadata

pub mod address;
pub mod hash;
pub mod label;
pub mod error;

#[cfg(feature = "serde")]
mod serialization;

pub use address::Address;
pub use hash::ContentHash;
pub use label::Label;
pub use error::TypesError;

/// Share balance and voting weight unit.
pub type Amount = u64;

/// Sequential poll handle.
pub type PollId = u64;
