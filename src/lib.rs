//! E-ink content rotator: picks a plugin instance from the active playlist,
//! renders it for the panel and pushes it out, with on-demand updates that
//! jump the queue.

pub mod config;
pub mod core;
pub mod display;
pub mod error;
pub mod playlist;
pub mod render;
pub mod services;

pub use error::{PersistenceError, RefreshError};
