pub mod callback;
#[cfg(feature = "openssl")]
pub mod chain;
#[cfg(feature = "openssl")]
pub mod local;
pub mod remote;
pub mod signer;
pub mod timestamper;
