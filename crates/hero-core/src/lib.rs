//! Core error definitions for the Hero coordinator workspace.
//!
//! Every crate in the workspace reports failures through [`HeroError`], so a
//! caller holding a [`HeroResult`] never needs to know which subsystem
//! produced it.
//!
//! # Main types
//!
//! - [`HeroError`]: Unified error enum for all Hero subsystems.
//! - [`HeroResult`]: Convenience alias for `Result<T, HeroError>`.

/// Error enum and result alias.
pub mod error;

pub use error::{HeroError, HeroResult};
