// Re-export all types so callers can use `domain::types::X`
// while the code stays organized internally

pub use self::core::*;
pub use self::asset::*;
pub use self::trust::*;
pub use self::config::*;

// Module declarations
mod core;
mod asset;
mod trust;
mod config;
