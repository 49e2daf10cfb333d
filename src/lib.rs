//! Harvest - HAR recording over browser debugging-protocol sessions
//!
//! Subscribes to page and network events, captures response bodies with
//! bounded retries, and assembles the log into a HAR 1.2 document.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::field_reassign_with_default,
    clippy::multiple_crate_versions
)]

pub mod capture;
pub mod config;
pub mod error;
pub mod event;
pub mod har;
pub mod protocol;
pub mod recording;

pub use config::{Config, StartOptions};
pub use error::{HarvestError, Result};
pub use recording::HarRecorder;
