//! zlib (de)compression for packed archive entries and `ZGRP` image payloads.
use crate::error::{AmiError, ErrorKind};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Inflates a zlib stream in full, then checks the result against
/// `unpacked_size`. Reads straight through to the decoder's own
/// end-of-stream so a stream that is truncated or corrupted before
/// reaching `STREAM_END` surfaces as a decode error rather than silently
/// handing back whatever bytes happened to come out first.
pub fn inflate(data: &[u8], unpacked_size: usize) -> anyhow::Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(unpacked_size);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| {
            anyhow::Error::from(AmiError::with_source(
                ErrorKind::InvalidCompressedStream,
                "zlib decode failed",
                e.into(),
            ))
        })?;
    if out.len() != unpacked_size {
        return Err(AmiError::new(
            ErrorKind::InvalidCompressedStream,
            format!("expected {} bytes, got {}", unpacked_size, out.len()),
        )
        .into());
    }
    Ok(out)
}

/// Deflates `data` at the given zlib compression level (0-9).
pub fn deflate(data: &[u8], level: u32) -> anyhow::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
