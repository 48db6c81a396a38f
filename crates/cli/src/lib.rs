pub mod commands;
pub mod execute;
pub mod runtime;

pub use commands::Commands;
pub use runtime::Runtime;
