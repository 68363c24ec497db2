//! Command-line interface for offline inspection of geodata files

pub mod commands;
pub mod error;
