//! Core types, errors, and configuration for the keel constraint engine.
//!
//! This crate provides the vocabulary shared by the solver and the layout
//! manager:
//! - Entity and constraint identifiers
//! - Attributes, axes, and constraint variables
//! - Relations and priorities
//! - Error types
//! - Engine configuration

pub mod config;
pub mod errors;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
