//! Shift-JIS (CP-932) <-> UTF-8 conversion.
use crate::error::{AmiError, ErrorKind};
use encoding::{ByteWriter, DecoderTrap, EncoderTrap, Encoding as EncodingTrait};

/// Decodes a Shift-JIS (Windows code page 932) byte string to UTF-8.
///
/// `strict` mirrors the "abort on bad byte" contract from `InvalidEncoding`:
/// when true, any byte sequence that cannot be mapped is an error rather
/// than a replacement character.
pub fn sjis_to_utf8(data: &[u8], strict: bool) -> anyhow::Result<String> {
    encoding::codec::japanese::Windows31JEncoding
        .decode(
            data,
            if strict {
                DecoderTrap::Strict
            } else {
                DecoderTrap::Replace
            },
        )
        .map_err(|e| AmiError::new(ErrorKind::InvalidEncoding, format!("invalid Shift-JIS sequence: {}", e)).into())
}

/// Encodes a UTF-8 string to Shift-JIS (Windows code page 932) bytes.
pub fn utf8_to_sjis(data: &str, strict: bool) -> anyhow::Result<Vec<u8>> {
    encoding::codec::japanese::Windows31JEncoding
        .encode(
            data,
            if strict {
                EncoderTrap::Strict
            } else {
                EncoderTrap::Replace
            },
        )
        .map_err(|e| {
            AmiError::new(
                ErrorKind::InvalidEncoding,
                format!("character not representable in Shift-JIS: {}", e),
            )
            .into()
        })
}

/// Detects a leading UTF-8 BOM (`EF BB BF`) and returns the bytes with it
/// stripped along with whether one was present.
pub fn strip_utf8_bom(data: &[u8]) -> (&[u8], bool) {
    if data.len() >= 3 && data[0] == 0xEF && data[1] == 0xBB && data[2] == 0xBF {
        (&data[3..], true)
    } else {
        (data, false)
    }
}
