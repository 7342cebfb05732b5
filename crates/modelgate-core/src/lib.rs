//! Core types, configuration, and utilities shared by the Modelgate crates.

pub mod config;
pub mod types;
pub mod utils;
