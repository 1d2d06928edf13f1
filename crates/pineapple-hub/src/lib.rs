//! # Pineapple Hub
//!
//! The update-and-launch pipeline: version resolver, download engine,
//! archive store, extractor, launcher, and the controller that ties them
//! together behind a single busy guard.

pub mod archive;
pub mod controller;
pub mod downloader;
pub mod extractor;
pub mod launcher;
pub mod resolver;

pub use controller::{Phase, UpdateController, UpdateOutcome};
