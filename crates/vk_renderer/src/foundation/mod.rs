//! Foundation module - Core utilities and types
//!
//! Currently only logging setup lives here.

pub mod logging;
