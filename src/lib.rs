//! Statecap - packet and state capture files
//!
//! Captures record the packets exchanged by a networked application together
//! with periodic full state snapshots, so a session can be replayed from any
//! point in time.

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

pub mod config;
pub mod container;
pub mod error;
pub mod storage;
pub mod view;

pub use error::{CaptureError, Result};
