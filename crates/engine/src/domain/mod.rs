pub mod assertion;
pub mod error;
pub mod manifest;
pub mod manifest_engine;
pub mod registry;
pub mod types;
