// c2pa adapter: global settings, signer bridge and the engine itself

mod engine;
mod settings;
mod signer_bridge;
mod url_validation;

pub use engine::*;
pub use settings::*;
pub use signer_bridge::*;
pub use url_validation::*;
