// crates/engine/src/adapters/stream.rs

//! Seekable streams over read/seek/write callbacks, plus the file-backed
//! input and all-or-nothing output used by the builder.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::domain::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
  Start,
  Current,
  End,
}

/// The three stream operations (plus flush) a host must provide.
pub trait StreamCallbacks: Send {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
  /// Returns the new absolute position.
  fn seek(&mut self, offset: i64, origin: SeekOrigin) -> io::Result<u64>;
  fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
  fn flush(&mut self) -> io::Result<()>;
}

fn to_seek_from(offset: i64, origin: SeekOrigin) -> io::Result<SeekFrom> {
  Ok(match origin {
    SeekOrigin::Start => SeekFrom::Start(
      u64::try_from(offset).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "negative seek from start"))?,
    ),
    SeekOrigin::Current => SeekFrom::Current(offset),
    SeekOrigin::End => SeekFrom::End(offset),
  })
}

/// Callbacks backed by a std read/write/seek stream.
#[derive(Debug)]
pub struct IoStream<T>(T);

impl<T> IoStream<T> {
  pub fn new(inner: T) -> Self {
    IoStream(inner)
  }

  pub fn into_inner(self) -> T {
    self.0
  }
}

impl<T: Read + Write + Seek + Send> StreamCallbacks for IoStream<T> {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    self.0.read(buf)
  }

  fn seek(&mut self, offset: i64, origin: SeekOrigin) -> io::Result<u64> {
    self.0.seek(to_seek_from(offset, origin)?)
  }

  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.write(buf)
  }

  fn flush(&mut self) -> io::Result<()> {
    self.0.flush()
  }
}

/// Callbacks for inputs; writes are refused.
#[derive(Debug)]
pub struct ReadOnly<T>(T);

impl<T> ReadOnly<T> {
  pub fn new(inner: T) -> Self {
    ReadOnly(inner)
  }
}

impl<T: Read + Seek + Send> StreamCallbacks for ReadOnly<T> {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    self.0.read(buf)
  }

  fn seek(&mut self, offset: i64, origin: SeekOrigin) -> io::Result<u64> {
    self.0.seek(to_seek_from(offset, origin)?)
  }

  fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
    Err(io::Error::new(io::ErrorKind::PermissionDenied, "stream is read-only"))
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

/// A `Read + Write + Seek` stream driven by [`StreamCallbacks`].
#[derive(Debug)]
pub struct StreamAdapter<C> {
  callbacks: C,
  position: u64,
}

impl<C: StreamCallbacks> StreamAdapter<C> {
  pub fn new(callbacks: C) -> Self {
    Self { callbacks, position: 0 }
  }

  pub fn position(&self) -> u64 {
    self.position
  }

  pub fn into_inner(self) -> C {
    self.callbacks
  }
}

impl StreamAdapter<ReadOnly<BufReader<File>>> {
  /// Open an existing, readable file as a seekable input.
  pub fn open_input(path: impl AsRef<Path>) -> EngineResult<Self> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() || !path.is_file() {
      return Err(EngineError::invalid_path(path));
    }
    let file = File::open(path).map_err(|_| EngineError::invalid_path(path))?;
    Ok(Self::new(ReadOnly::new(BufReader::new(file))))
  }
}

impl<C: StreamCallbacks> Read for StreamAdapter<C> {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    let n = self.callbacks.read(buf)?;
    self.position += n as u64;
    Ok(n)
  }
}

impl<C: StreamCallbacks> Seek for StreamAdapter<C> {
  fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
    let (offset, origin) = match pos {
      SeekFrom::Start(p) => (
        i64::try_from(p).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "seek offset too large"))?,
        SeekOrigin::Start,
      ),
      SeekFrom::Current(p) => (p, SeekOrigin::Current),
      SeekFrom::End(p) => (p, SeekOrigin::End),
    };
    self.position = self.callbacks.seek(offset, origin)?;
    Ok(self.position)
  }
}

impl<C: StreamCallbacks> Write for StreamAdapter<C> {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    let n = self.callbacks.write(buf)?;
    self.position += n as u64;
    Ok(n)
  }

  fn flush(&mut self) -> io::Result<()> {
    self.callbacks.flush()
  }
}

/// Output written to a temporary file next to its destination and moved into
/// place only on [`commit`](PendingOutput::commit). Dropping it uncommitted
/// removes the temporary file and leaves the destination untouched.
#[derive(Debug)]
pub struct PendingOutput {
  temp: NamedTempFile,
  dest: PathBuf,
}

impl PendingOutput {
  pub fn create(dest: impl AsRef<Path>) -> EngineResult<Self> {
    let dest = dest.as_ref();
    if dest.as_os_str().is_empty() || dest.is_dir() {
      return Err(EngineError::invalid_path(dest));
    }
    let parent = match dest.parent() {
      Some(p) if !p.as_os_str().is_empty() => p,
      _ => Path::new("."),
    };
    if !parent.is_dir() {
      return Err(EngineError::invalid_path(dest));
    }
    let temp = tempfile::Builder::new()
      .prefix(".credsign-")
      .suffix(".partial")
      .tempfile_in(parent)?;
    Ok(Self { temp, dest: dest.to_path_buf() })
  }

  pub fn destination(&self) -> &Path {
    &self.dest
  }

  pub fn temp_path(&self) -> &Path {
    self.temp.path()
  }

  /// Flush and atomically move the temporary file onto the destination.
  pub fn commit(mut self) -> EngineResult<PathBuf> {
    self.temp.flush()?;
    self.temp.as_file().sync_all()?;
    self.temp.persist(&self.dest).map_err(|e| EngineError::Io(e.error))?;
    Ok(self.dest)
  }
}

impl Read for PendingOutput {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    self.temp.read(buf)
  }
}

impl Write for PendingOutput {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.temp.write(buf)
  }

  fn flush(&mut self) -> io::Result<()> {
    self.temp.flush()
  }
}

impl Seek for PendingOutput {
  fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
    self.temp.seek(pos)
  }
}
