//! # Granary Support
//!
//! Shared utilities for the Granary container crates.
//!
//! This crate provides:
//! - Text rendering for error messages (creation chains, candidate lists,
//!   short type names, "did you mean" suggestions)
//! - A small `tracing-subscriber` bootstrap for binaries and tests

pub mod logging;
pub mod rendering;
