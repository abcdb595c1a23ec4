//! Helpers shared by the tickrs crates.

#![cfg_attr(not(test), no_std)]

pub mod env;
mod shared;

pub use shared::Shared;
