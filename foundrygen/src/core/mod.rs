//! Foundrygen Core
//!
//! Credential resolution, HTTP transport, configuration and the generative
//! media operations built on top of them.

pub mod credentials;
pub mod generative;
pub mod settings;
pub mod transport;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
