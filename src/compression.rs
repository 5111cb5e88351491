//! Gzip and zlib streams for binary layer payloads.

use std::io::{self, Read, Write};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Stream format of a compressed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// RFC 1952, with gzip header
    Gzip,
    /// RFC 1950
    Zlib,
}

/// Compresses `data`; `level` is 0-9, `None` for the flate2 default.
pub fn compress(data: &[u8], method: CompressionMethod, level: Option<u32>) -> io::Result<Vec<u8>> {
    let level = level.map_or_else(Compression::default, |l| Compression::new(l.min(9)));
    match method {
        CompressionMethod::Gzip => {
            let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), level);
            encoder.write_all(data)?;
            encoder.finish()
        }
        CompressionMethod::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), level);
            encoder.write_all(data)?;
            encoder.finish()
        }
    }
}

/// Inflates a gzip or zlib stream, picking the format from the header.
///
/// At most `expected_size + 1` bytes are produced, so the caller can tell an oversized
/// payload apart without inflating all of it.
pub fn decompress(data: &[u8], expected_size: usize) -> io::Result<Vec<u8>> {
    let limit = expected_size as u64 + 1;
    let mut out = Vec::with_capacity(expected_size);
    if data.starts_with(&GZIP_MAGIC) {
        GzDecoder::new(data).take(limit).read_to_end(&mut out)?;
    } else {
        ZlibDecoder::new(data).take(limit).read_to_end(&mut out)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_method_from_header() {
        let data: Vec<u8> = (0..64u8).cycle().take(1024).collect();
        for method in [CompressionMethod::Gzip, CompressionMethod::Zlib] {
            let packed = compress(&data, method, None).unwrap();
            assert_eq!(packed.starts_with(&GZIP_MAGIC), method == CompressionMethod::Gzip);
            assert_eq!(decompress(&packed, data.len()).unwrap(), data);
        }
    }

    #[test]
    fn output_is_capped_one_past_expected() {
        let data = vec![7u8; 4096];
        let packed = compress(&data, CompressionMethod::Zlib, Some(9)).unwrap();
        assert_eq!(decompress(&packed, 16).unwrap().len(), 17);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(decompress(b"definitely not deflate", 16).is_err());
    }
}
