//! Authoritative game simulation: input handling, physics, vehicles, rooms

pub mod input;
pub mod latency;
pub mod physics;
pub mod room;
pub mod shell;
pub mod stats;
pub mod tank;
pub mod world;

pub use room::{RoomCmd, RoomHandle, RoomRegistry};
