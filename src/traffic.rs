//! Synthetic traffic generation against the demo server.
//!
//! A `PatternSelector` picks a weighted `TrafficPattern`; the `TrafficClient`
//! plays its actions in order, then sleeps for a random pause.

pub mod actions;
pub mod client;
pub mod patterns;
pub mod payloads;


pub use actions::Action;
pub use client::{ClientSession, TrafficClient};
pub use patterns::{PatternSelector, TrafficPattern};
