//! Party Replication - authority and replication core for networked avatars
//!
//! One process owns each avatar and advances its simulation; every other
//! process receives fixed-order snapshots at the serialization cadence and
//! reconstructs smooth motion from them. The crate covers:
//! - Input sampling and the local motion model (authoritative side)
//! - The versioned snapshot schema and wire framing
//! - Remote reconciliation and animation projection (observer side)
//! - An in-process peer runtime for hosting entities over a broadcast transport

pub mod app;
pub mod config;
pub mod game;
pub mod net;
pub mod util;
