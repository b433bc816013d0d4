//! Persistence layer for player profile documents

pub mod client;
pub mod stats;

pub use client::{DocumentClient, StoreError};
pub use stats::StatsStore;
