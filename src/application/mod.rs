//! Application services: content sync, live notification and rendering.

pub mod content;
pub mod error;
pub mod import;
pub mod notify;
pub mod render;
pub mod repos;
pub mod stream;
