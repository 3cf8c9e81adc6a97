//! Study export schema
//!
//! This module defines the input schema (participants → steps → ordered event
//! logs) and the adapter that turns it into analysable task inputs.

mod adapter;
mod raw_event;

pub use adapter::*;
pub use raw_event::*;
