//! Credential models: the access/refresh pair and its redacting secret wrapper.

pub mod pair;
pub mod secret;

pub use pair::*;
pub use secret::*;
