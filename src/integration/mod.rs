//! Integration module for wiring engines to a host
//!
//! This module provides:
//! - Configuration for all reading modes
//! - The cooperative host loop that drives an engine

pub mod config;
pub mod driver;

// Re-export commonly used types
pub use config::{ReaderConfig, ResetPolicy, ScrollConfig, SpeechConfig, SpeedReadConfig};
pub use driver::{DriverCommand, DriverHandle, SessionDriver};
