//! `GRP` raster image codec, and its round trip through PNG.
//!
//! A `GRP` image is a 12-byte little-endian header followed by bottom-up
//! BGRA pixel rows:
//!
//! ```text
//! magic:    u16 = 0x5247 ("GR")
//! subtype:  u16 = 0x0050 ("P\0")
//! ref_x:    i16
//! ref_y:    i16
//! width:    u16
//! height:   u16
//! ```
//!
//! `ref_x`/`ref_y` are an anchor point used by the engine to position the
//! image relative to a base layer; we round-trip them through the PNG
//! `oFFs` chunk so `extract` then `pack` reproduces the original bytes.
use crate::error::{AmiError, ErrorKind};
use crate::ext::io::{MemReader, ReadExt, WriteExt};
use anyhow::{anyhow, Result};
use std::io::Write;

fn unsupported_image(context: impl Into<String>) -> anyhow::Error {
    AmiError::new(ErrorKind::UnsupportedImage, context).into()
}

const GRP_MAGIC: u16 = 0x5247;
const GRP_SUBTYPE: u16 = 0x0050;
const GRP_HEADER_SIZE: usize = 12;
const MAX_DIMENSION: u16 = 32767;

/// A decoded `GRP` raster: bottom-up BGRA pixels plus the anchor offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrpImage {
    pub ref_x: i16,
    pub ref_y: i16,
    pub width: u16,
    pub height: u16,
    /// Bottom-up, BGRA, 4 bytes per pixel.
    pub pixels: Vec<u8>,
}

impl GrpImage {
    fn check_dimensions(width: u16, height: u16) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(unsupported_image("GRP image has a zero dimension"));
        }
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(unsupported_image(format!(
                "GRP image dimension exceeds {} pixels: {}x{}",
                MAX_DIMENSION, width, height
            )));
        }
        Ok(())
    }

    /// Flips the pixel rows top-to-bottom, converting between the GRP
    /// bottom-up order and PNG's top-down order.
    fn flipped_rows(&self) -> Vec<u8> {
        let stride = self.width as usize * 4;
        let mut out = vec![0u8; self.pixels.len()];
        for (src_row, dst_row) in (0..self.height as usize).rev().zip(0..) {
            let src = &self.pixels[src_row * stride..(src_row + 1) * stride];
            let dst_start = dst_row * stride;
            out[dst_start..dst_start + stride].copy_from_slice(src);
        }
        out
    }
}

/// Parses a raw (already-inflated) `GRP` byte stream.
pub fn decode_grp(data: &[u8]) -> Result<GrpImage> {
    if data.len() < GRP_HEADER_SIZE {
        return Err(unsupported_image("GRP stream shorter than its 12-byte header"));
    }
    let mut r = MemReader::new(data.to_vec());
    let magic = r.read_u16()?;
    let subtype = r.read_u16()?;
    if magic != GRP_MAGIC || subtype != GRP_SUBTYPE {
        return Err(unsupported_image(format!(
            "not a GRP image: expected magic/subtype {:04x}/{:04x}, got {:04x}/{:04x}",
            GRP_MAGIC, GRP_SUBTYPE, magic, subtype
        )));
    }
    let ref_x = r.read_i16()?;
    let ref_y = r.read_i16()?;
    let width = r.read_u16()?;
    let height = r.read_u16()?;
    GrpImage::check_dimensions(width, height)?;
    let expected = width as usize * height as usize * 4;
    let pixels = r.read_exact_vec(expected).map_err(|_| {
        anyhow!(
            "GRP pixel data truncated: expected {} bytes for {}x{}",
            expected,
            width,
            height
        )
    })?;
    Ok(GrpImage {
        ref_x,
        ref_y,
        width,
        height,
        pixels,
    })
}

/// Serializes a `GrpImage` back to raw `GRP` bytes (header + bottom-up BGRA).
pub fn encode_grp(img: &GrpImage) -> Result<Vec<u8>> {
    GrpImage::check_dimensions(img.width, img.height)?;
    let expected = img.width as usize * img.height as usize * 4;
    if img.pixels.len() != expected {
        return Err(unsupported_image(format!(
            "GRP pixel buffer has {} bytes, expected {} for {}x{}",
            img.pixels.len(), expected, img.width, img.height
        )));
    }
    let mut out = Vec::with_capacity(GRP_HEADER_SIZE + img.pixels.len());
    out.write_u16(GRP_MAGIC)?;
    out.write_u16(GRP_SUBTYPE)?;
    out.write_i16(img.ref_x)?;
    out.write_i16(img.ref_y)?;
    out.write_u16(img.width)?;
    out.write_u16(img.height)?;
    out.write_all(&img.pixels)?;
    Ok(out)
}

/// Encodes a `GrpImage` as a PNG, storing the anchor offset in an `oFFs`
/// chunk (unit 0 = pixels) so it survives the round trip back to GRP.
///
/// Drops the alpha channel (emitting RGB) when every pixel is fully
/// opaque; `png_to_grp` synthesizes it back as `0xFF` on the way in.
pub fn grp_to_png<W: Write>(img: &GrpImage, writer: W, compression_level: u32) -> Result<()> {
    GrpImage::check_dimensions(img.width, img.height)?;
    let mut rgba = img.flipped_rows();
    bgra_to_rgba_in_place(&mut rgba);
    let fully_opaque = rgba.chunks_exact(4).all(|px| px[3] == 0xFF);

    let mut encoder = png::Encoder::new(writer, img.width as u32, img.height as u32);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(match compression_level {
        0 => png::Compression::NoCompression,
        1..=3 => png::Compression::Fast,
        4..=6 => png::Compression::Default,
        _ => png::Compression::Best,
    });
    let pixels = if fully_opaque {
        encoder.set_color(png::ColorType::Rgb);
        rgba_to_rgb(&rgba)
    } else {
        encoder.set_color(png::ColorType::Rgba);
        rgba
    };
    let mut writer = encoder.write_header()?;
    if img.ref_x != 0 || img.ref_y != 0 {
        writer.write_chunk(
            png::chunk::ChunkType(*b"oFFs"),
            &offs_chunk(img.ref_x, img.ref_y),
        )?;
    }
    writer.write_image_data(&pixels)?;
    writer.finish()?;
    Ok(())
}

/// Decodes a PNG back into a `GrpImage`. Interlaced PNGs and anything
/// other than 8-bit depth are rejected. Grayscale, grayscale+alpha and
/// indexed sources are normalized to RGBA (palette `tRNS` entries become
/// the alpha channel); RGB sources get a synthesized opaque alpha channel.
///
/// Takes the whole file in memory rather than a generic reader: the
/// `oFFs` chunk carrying the anchor offset isn't surfaced by the `png`
/// crate's decoded `Info`, so we scan the raw chunk stream for it
/// ourselves before handing the bytes to the decoder.
pub fn png_to_grp(data: &[u8]) -> Result<GrpImage> {
    let (ref_x, ref_y) = scan_offs_chunk(data).unwrap_or((0, 0));
    let decoder = png::Decoder::new(std::io::Cursor::new(data));
    let mut reader = decoder.read_info()?;
    let info = reader.info();
    if info.interlaced {
        return Err(unsupported_image("interlaced PNG images are not supported"));
    }
    if info.bit_depth != png::BitDepth::Eight {
        return Err(unsupported_image(format!(
            "unsupported PNG bit depth {:?}, only 8-bit is supported",
            info.bit_depth
        )));
    }
    let color_type = info.color_type;
    let width = info.width as usize;
    let height = info.height as usize;
    GrpImage::check_dimensions(
        u16::try_from(width).map_err(|_| anyhow!("PNG width exceeds GRP's u16 range"))?,
        u16::try_from(height).map_err(|_| anyhow!("PNG height exceeds GRP's u16 range"))?,
    )?;
    let palette = info.palette.as_ref().map(|p| p.to_vec());
    let trns = info.trns.as_ref().map(|t| t.to_vec());
    let mut raw = vec![0u8; reader.output_buffer_size()];
    reader.next_frame(&mut raw)?;
    let mut rgba = match color_type {
        png::ColorType::Rgba => raw,
        png::ColorType::Rgb => rgb_to_rgba(&raw),
        png::ColorType::Grayscale => grayscale_to_rgba(&raw),
        png::ColorType::GrayscaleAlpha => grayscale_alpha_to_rgba(&raw),
        png::ColorType::Indexed => {
            let palette =
                palette.ok_or_else(|| unsupported_image("indexed PNG is missing its palette chunk"))?;
            indexed_to_rgba(&raw, &palette, trns.as_deref(), width, height)?
        }
    };
    rgba_to_bgra_in_place(&mut rgba);
    let mut img = GrpImage {
        ref_x,
        ref_y,
        width: width as u16,
        height: height as u16,
        pixels: rgba,
    };
    img.pixels = img.flipped_rows();
    Ok(img)
}

/// Walks the PNG chunk stream (signature + `{len:u32be, type:[u8;4],
/// data, crc:u32be}` records) looking for `oFFs`, without decoding image
/// data. Stops at `IDAT` since `oFFs` is required to precede it.
fn scan_offs_chunk(data: &[u8]) -> Option<(i16, i16)> {
    const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    if data.len() < 8 || data[0..8] != SIGNATURE {
        return None;
    }
    let mut pos = 8usize;
    while pos + 8 <= data.len() {
        let len = u32::from_be_bytes(data[pos..pos + 4].try_into().ok()?) as usize;
        let chunk_type = &data[pos + 4..pos + 8];
        let data_start = pos + 8;
        if chunk_type == b"IDAT" {
            return None;
        }
        if chunk_type == b"oFFs" && len >= 9 {
            let x = i32::from_be_bytes(data[data_start..data_start + 4].try_into().ok()?);
            let y = i32::from_be_bytes(data[data_start + 4..data_start + 8].try_into().ok()?);
            return Some((
                i16::try_from(x).ok()?,
                i16::try_from(y).ok()?,
            ));
        }
        pos = data_start + len + 4; // skip data + crc
    }
    None
}

fn offs_chunk(ref_x: i16, ref_y: i16) -> Vec<u8> {
    let mut chunk = Vec::with_capacity(9);
    chunk.extend_from_slice(&(ref_x as i32).to_be_bytes());
    chunk.extend_from_slice(&(ref_y as i32).to_be_bytes());
    chunk.push(0); // unit specifier: 0 = pixel
    chunk
}

fn bgra_to_rgba_in_place(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
}

fn rgba_to_bgra_in_place(data: &mut [u8]) {
    bgra_to_rgba_in_place(data);
}

fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgba.len() / 4 * 3);
    for px in rgba.chunks_exact(4) {
        out.extend_from_slice(&px[0..3]);
    }
    out
}

fn rgb_to_rgba(rgb: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgb.len() / 3 * 4);
    for px in rgb.chunks_exact(3) {
        out.extend_from_slice(px);
        out.push(255);
    }
    out
}

fn grayscale_to_rgba(gray: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(gray.len() * 4);
    for &g in gray {
        out.extend_from_slice(&[g, g, g, 255]);
    }
    out
}

fn grayscale_alpha_to_rgba(gray_alpha: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(gray_alpha.len() * 2);
    for px in gray_alpha.chunks_exact(2) {
        out.extend_from_slice(&[px[0], px[0], px[0], px[1]]);
    }
    out
}

/// Expands an indexed PNG's pixel data to RGBA via its palette, promoting
/// any `tRNS` entries to the alpha channel (entries past `tRNS`'s length
/// default to fully opaque, per the PNG specification).
fn indexed_to_rgba(
    indices: &[u8],
    palette: &[u8],
    trns: Option<&[u8]>,
    width: usize,
    height: usize,
) -> Result<Vec<u8>> {
    let color_count = palette.len() / 3;
    let mut out = Vec::with_capacity(width * height * 4);
    for &idx in indices.iter().take(width * height) {
        let idx = idx as usize;
        if idx >= color_count {
            return Err(unsupported_image(format!(
                "palette index {} exceeds palette size {}",
                idx, color_count
            )));
        }
        let base = idx * 3;
        out.extend_from_slice(&palette[base..base + 3]);
        let alpha = trns.and_then(|t| t.get(idx)).copied().unwrap_or(255);
        out.push(alpha);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GrpImage {
        // 2x1 image: one opaque red pixel, one half-transparent blue pixel.
        GrpImage {
            ref_x: 10,
            ref_y: -4,
            width: 2,
            height: 1,
            pixels: vec![0, 0, 255, 255, 255, 0, 0, 128],
        }
    }

    #[test]
    fn grp_round_trips_through_bytes() {
        let img = sample();
        let bytes = encode_grp(&img).unwrap();
        assert_eq!(&bytes[0..2], &GRP_MAGIC.to_le_bytes());
        let decoded = decode_grp(&bytes).unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn grp_round_trips_through_png() {
        let img = sample();
        let mut png_bytes = Vec::new();
        grp_to_png(&img, &mut png_bytes, 6).unwrap();
        let decoded = png_to_grp(&png_bytes).unwrap();
        assert_eq!(decoded.width, img.width);
        assert_eq!(decoded.height, img.height);
        assert_eq!(decoded.pixels, img.pixels);
        assert_eq!(decoded.ref_x, img.ref_x);
        assert_eq!(decoded.ref_y, img.ref_y);
    }

    #[test]
    fn grayscale_png_synthesizes_opaque_alpha() {
        let gray = grayscale_to_rgba(&[10, 200]);
        assert_eq!(gray, vec![10, 10, 10, 255, 200, 200, 200, 255]);
    }

    #[test]
    fn indexed_png_promotes_trns_to_alpha() {
        let palette = [255u8, 0, 0, 0, 255, 0]; // red, green
        let trns = [128u8]; // only the first palette entry is translucent
        let rgba = indexed_to_rgba(&[0, 1], &palette, Some(&trns), 2, 1).unwrap();
        assert_eq!(rgba, vec![255, 0, 0, 128, 0, 255, 0, 255]);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = encode_grp(&sample()).unwrap();
        bytes[0] = 0;
        assert!(decode_grp(&bytes).is_err());
    }

    #[test]
    fn rejects_oversized_dimensions() {
        let mut img = sample();
        img.width = 40000;
        assert!(encode_grp(&img).is_err());
    }

    fn crc32(bytes: &[u8]) -> u32 {
        let mut crc = 0xFFFFFFFFu32;
        for &b in bytes {
            crc ^= b as u32;
            for _ in 0..8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB88320
                } else {
                    crc >> 1
                };
            }
        }
        !crc
    }

    fn png_chunk(out: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(chunk_type);
        out.extend_from_slice(data);
        let mut crc_input = chunk_type.to_vec();
        crc_input.extend_from_slice(data);
        out.extend_from_slice(&crc32(&crc_input).to_be_bytes());
    }

    /// A minimal 1x1 RGB PNG with IHDR's interlace method set to Adam7 (1).
    fn interlaced_png() -> Vec<u8> {
        let mut out = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&1u32.to_be_bytes()); // width
        ihdr.extend_from_slice(&1u32.to_be_bytes()); // height
        ihdr.push(8); // bit depth
        ihdr.push(2); // color type: RGB
        ihdr.push(0); // compression
        ihdr.push(0); // filter
        ihdr.push(1); // interlace method: Adam7
        png_chunk(&mut out, b"IHDR", &ihdr);
        png_chunk(&mut out, b"IDAT", &[]);
        png_chunk(&mut out, b"IEND", &[]);
        out
    }

    #[test]
    fn rejects_interlaced_png() {
        let err = png_to_grp(&interlaced_png()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::error::AmiError>(),
            Some(e) if e.kind == crate::error::ErrorKind::UnsupportedImage
        ));
    }
}
