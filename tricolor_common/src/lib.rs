//! Common utilities and shared types for the tricolor workspace.
//!
//! This crate provides configuration handling, board revision selection and the
//! external tool runner used by the synthesis and formal backends.

mod artifact;
mod config;
mod tool;

pub use crate::artifact::*;
pub use crate::config::*;
pub use crate::tool::*;
