//! Content synchronization and cache coherence for a markdown archive.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
