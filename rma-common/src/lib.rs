//! # RMA Common Library
//!
//! Shared code for the rock-music automation engine including:
//! - Configuration model and config file resolution
//! - Database schema initialization and catalog models
//! - Event types (AutomationEvent enum) and the event bus
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod time;

pub use config::AutomationConfig;
pub use error::{Error, Result};
