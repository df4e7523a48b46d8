use std::io::{Read, Seek, Write};
use std::path::PathBuf;

// Trait aliases for streaming readers and read/write sinks
pub trait AssetStream: Read + Seek + Send {}

impl<T: Read + Seek + Send> AssetStream for T {}

pub trait AssetSink: Read + Write + Seek + Send {}

impl<T: Read + Write + Seek + Send> AssetSink for T {}

/// Where the bytes of a referenced resource (thumbnail, ingredient asset)
/// come from. Recorded by builder mutators and opened only at sign time.
#[derive(Clone)]
pub enum ResourceSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl ResourceSource {
    /// Open the source as a seekable stream.
    pub fn open(&self) -> std::io::Result<Box<dyn AssetStream>> {
        match self {
            ResourceSource::Path(p) => Ok(Box::new(std::io::BufReader::new(std::fs::File::open(p)?))),
            ResourceSource::Bytes(b) => Ok(Box::new(std::io::Cursor::new(b.clone()))),
        }
    }

    /// True when the source can currently be opened.
    pub fn is_available(&self) -> bool {
        match self {
            ResourceSource::Path(p) => p.is_file(),
            ResourceSource::Bytes(_) => true,
        }
    }
}

impl std::fmt::Debug for ResourceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            ResourceSource::Bytes(data) => f.debug_struct("Bytes")
                .field("data_len", &data.len())
                .finish(),
        }
    }
}

impl From<PathBuf> for ResourceSource {
    fn from(p: PathBuf) -> Self {
        ResourceSource::Path(p)
    }
}

impl From<&std::path::Path> for ResourceSource {
    fn from(p: &std::path::Path) -> Self {
        ResourceSource::Path(p.to_path_buf())
    }
}

impl From<Vec<u8>> for ResourceSource {
    fn from(b: Vec<u8>) -> Self {
        ResourceSource::Bytes(b)
    }
}
