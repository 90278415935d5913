//! Utility modules

pub mod number;
