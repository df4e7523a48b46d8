pub mod content_detection;
pub mod stream;

#[cfg(feature = "c2pa")]
pub mod c2pa;
