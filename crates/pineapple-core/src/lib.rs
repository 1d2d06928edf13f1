//! # Pineapple Core
//!
//! Shared types for the Pineapple updater: configuration, errors, release
//! derivation, the progress channel, and update events. No network code
//! lives here.

pub mod config;
pub mod error;
pub mod event;
pub mod progress;
pub mod release;
