//! Error types for ncli operations

mod builders;
mod conversions;
mod display;
mod extensions;
mod types;

pub use extensions::ResultExt;
pub use types::{Error, NetworkErrorKind, Result};
