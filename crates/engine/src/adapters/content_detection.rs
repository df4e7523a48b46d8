use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Extensions c2pa can embed into, with their media types.
const FORMATS: &[(&str, &str)] = &[
  ("jpg", "image/jpeg"),
  ("jpeg", "image/jpeg"),
  ("png", "image/png"),
  ("gif", "image/gif"),
  ("webp", "image/webp"),
  ("tif", "image/tiff"),
  ("tiff", "image/tiff"),
  ("heic", "image/heic"),
  ("heif", "image/heif"),
  ("avif", "image/avif"),
  ("svg", "image/svg+xml"),
  ("dng", "image/x-adobe-dng"),
  ("wav", "audio/wav"),
  ("mp3", "audio/mpeg"),
  ("m4a", "audio/mp4"),
  ("avi", "video/msvideo"),
  ("mp4", "video/mp4"),
  ("mov", "video/quicktime"),
  ("pdf", "application/pdf"),
];

/// Bytes read from the head of a stream when sniffing.
const SNIFF_LEN: usize = 512;

pub fn supported_extensions() -> Vec<String> {
  FORMATS.iter().map(|(ext, _)| ext.to_string()).collect()
}

/// Convert a file extension (any case, leading dot allowed) to its MIME type.
pub fn extension_to_mime_type(extension: &str) -> Option<&'static str> {
  let ext = extension.trim_start_matches('.').to_ascii_lowercase();
  FORMATS.iter().find(|(e, _)| *e == ext).map(|(_, mime)| *mime)
}

/// Format for a path, taken from its extension.
pub fn format_for_path(path: &Path) -> Option<&'static str> {
  path.extension().and_then(|e| e.to_str()).and_then(extension_to_mime_type)
}

pub fn detect_extension_from_bytes(data: &[u8]) -> Option<&'static str> {
  if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
    return Some("jpg");
  }
  if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
    return Some("png");
  }
  if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
    return Some("gif");
  }
  if data.len() >= 12 && data.starts_with(b"RIFF") {
    return match &data[8..12] {
      b"WEBP" => Some("webp"),
      b"WAVE" => Some("wav"),
      b"AVI " => Some("avi"),
      _ => None,
    };
  }
  if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
    return Some("tiff");
  }

  // ISO-BMFF: ftyp box, brand picks the flavor
  if data.len() >= 12 && &data[4..8] == b"ftyp" {
    return Some(match &data[8..12] {
      b"heic" | b"heix" => "heic",
      b"heif" | b"mif1" => "heif",
      b"avif" => "avif",
      b"qt  " => "mov",
      b"M4A " | b"m4af" => "m4a",
      _ => "mp4",
    });
  }

  if data.starts_with(b"%PDF-") {
    return Some("pdf");
  }
  if data.first() == Some(&b'<') {
    let head = &data[..data.len().min(SNIFF_LEN)];
    if let Ok(s) = std::str::from_utf8(head) {
      if s.to_ascii_lowercase().contains("<svg") {
        return Some("svg");
      }
    }
  }
  if data.starts_with(b"ID3") || (data.len() >= 2 && data[0] == 0xFF && (data[1] & 0xE0) == 0xE0) {
    return Some("mp3");
  }

  None
}

pub fn detect_mime_from_bytes(data: &[u8]) -> Option<&'static str> {
  detect_extension_from_bytes(data).and_then(extension_to_mime_type)
}

/// Sniff the MIME type from the head of `stream`, leaving it rewound to the start.
pub fn sniff_format<R: Read + Seek + ?Sized>(stream: &mut R) -> std::io::Result<Option<&'static str>> {
  stream.seek(SeekFrom::Start(0))?;
  let mut head = Vec::with_capacity(SNIFF_LEN);
  Read::take(&mut *stream, SNIFF_LEN as u64).read_to_end(&mut head)?;
  stream.seek(SeekFrom::Start(0))?;
  Ok(detect_mime_from_bytes(&head))
}
