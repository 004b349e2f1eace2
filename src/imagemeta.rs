//! Native image dimensions from a base64 body, without decoding the image.
//!
//! The solve view carries the challenge image as base64; the capture engine
//! needs the native extent before any coordinate mapping. Decoding a bounded
//! prefix is enough: PNG keeps width/height in the IHDR chunk right after
//! the signature, and JPEG keeps them in the first SOF frame header.
//! Anything malformed yields None, never an error.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::solver::geometry::Extent;

/// Padding-indifferent decoder: the sniffed prefix usually cuts the stream
/// before any padding, and short bodies arrive padded.
const B64: GeneralPurpose = GeneralPurpose::new(
  &alphabet::STANDARD,
  GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// How much of the base64 body we look at. Multiple of 4 so the prefix is
/// decodable on its own.
const SNIFF_PREFIX_CHARS: usize = 2000;

/// Best-effort native extent of a base64-encoded PNG or JPEG.
pub fn native_extent(body_b64: &str) -> Option<Extent> {
  let prefix = body_b64.get(..SNIFF_PREFIX_CHARS).unwrap_or(body_b64);
  let data = B64.decode(prefix).ok()?;
  png_extent(&data).or_else(|| jpeg_extent(&data))
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// PNG: signature, then the IHDR chunk whose first 8 data bytes are
/// big-endian width and height.
fn png_extent(data: &[u8]) -> Option<Extent> {
  if data.len() < 24 || data[..8] != PNG_SIGNATURE {
    return None;
  }
  let width = u32::from_be_bytes(data[16..20].try_into().ok()?);
  let height = u32::from_be_bytes(data[20..24].try_into().ok()?);
  if width == 0 || height == 0 {
    return None;
  }
  Some(Extent::new(width, height))
}

/// JPEG: walk the marker stream until a SOF0/SOF2 frame header, which holds
/// big-endian height then width at offsets 5 and 7 past the marker.
fn jpeg_extent(data: &[u8]) -> Option<Extent> {
  if data.len() < 2 || data[..2] != [0xFF, 0xD8] {
    return None;
  }
  let mut i = 2usize;
  while i + 9 < data.len() {
    if data[i] != 0xFF {
      i += 1;
      continue;
    }
    let marker = data[i + 1];
    match marker {
      // Baseline / progressive frame header.
      0xC0 | 0xC2 => {
        let height = u16::from_be_bytes([data[i + 5], data[i + 6]]) as u32;
        let width = u16::from_be_bytes([data[i + 7], data[i + 8]]) as u32;
        if width > 0 && height > 0 {
          return Some(Extent::new(width, height));
        }
        return None;
      }
      // End of image.
      0xD9 => return None,
      // Stuffed byte or restart markers: no segment length follows.
      0x00 | 0xD0..=0xD7 => {
        i += 2;
      }
      _ => {
        let seg_len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        i += 2 + seg_len;
      }
    }
  }
  None
}
