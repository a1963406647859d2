//! Stores, HTTP surface and runtime bootstrap.

pub mod cache_warmer;
pub mod db;
pub mod error;
pub mod fs;
pub mod http;
pub mod memory;
pub mod telemetry;
