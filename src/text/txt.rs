//! The `txt` single-language transcript format: one editable line per
//! script line, with a commented-out echo of the same text above it,
//! preceded by a `#FILENAME`/`#TYPE` header. `//`-prefixed comments.
use crate::codec::script::ScrLine;
use crate::config::{Config, TextEncoding};
use crate::error::{AmiError, ErrorKind};
use crate::text::Line;
use crate::utils::encoding::{sjis_to_utf8, strip_utf8_bom, utf8_to_sjis};
use crate::utils::escape::{escape_line, has_unknown_escape, unescape_line};
use anyhow::Result;

/// Emits the `txt` transcript for a decoded `SCR` file's lines.
pub fn write_txt(file_id: u32, type_id: u32, lines: &[ScrLine], config: &Config) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(format!("#FILENAME {:08x}\n#TYPE {}\n\n", file_id, type_id).as_bytes());
    for line in lines {
        let text = match config.text_encoding {
            TextEncoding::ShiftJis => line.bytes.clone(),
            TextEncoding::Utf8 => sjis_to_utf8(&line.bytes, false)?.into_bytes(),
        };
        let escaped = escape_line(&text, false);
        out.extend_from_slice(format!("//<<{:08x}>> ", line.id).as_bytes());
        out.extend_from_slice(&escaped);
        out.push(b'\n');
        out.extend_from_slice(format!("<<{:08x}>> ", line.id).as_bytes());
        out.extend_from_slice(&escaped);
        out.extend_from_slice(b"\n\n");
    }
    Ok(out)
}

/// Header values read while compiling a `txt` transcript: `#FILENAME`
/// sets the output archive entry id, `#TYPE` the SCR type id.
#[derive(Debug, Default)]
pub struct TxtHeader {
    pub file_id: Option<u32>,
    pub type_id: Option<u32>,
}

/// Parses a `txt` transcript back into `Line` records (always `en`-only:
/// the format carries a single language) plus the header directives.
pub fn compile_txt(data: &[u8], config: &Config) -> Result<(TxtHeader, Vec<Line>)> {
    let (data, _had_bom) = strip_utf8_bom(data);
    let mut header = TxtHeader::default();
    let mut lines = Vec::new();

    for (idx, raw_line) in data.split(|&b| b == b'\n').enumerate() {
        let line_no = (idx + 1) as u32;
        let raw_line = strip_cr(raw_line);
        if raw_line.starts_with(b"//") {
            continue;
        }
        let trimmed = trim_ascii(raw_line);
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix(b"#FILENAME") {
            header.file_id = Some(parse_hex_u32(trim_ascii(rest))?);
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix(b"#TYPE") {
            header.type_id = Some(parse_dec_u32(trim_ascii(rest))?);
            continue;
        }
        let Some((id, text)) = parse_txt_record(trimmed) else {
            if config.ignore_script_errors {
                eprintln!(
                    "Warning: skipping malformed txt line {}: {:?}",
                    line_no,
                    String::from_utf8_lossy(trimmed)
                );
                crate::COUNTER.inc_warning();
                continue;
            } else {
                return Err(AmiError::new(
                    ErrorKind::ScriptSyntax,
                    format!("malformed txt line {}: {:?}", line_no, String::from_utf8_lossy(trimmed)),
                )
                .into());
            }
        };
        if has_unknown_escape(text) {
            eprintln!("Warning: unknown escape sequence on txt line {}", line_no);
            crate::COUNTER.inc_warning();
        }
        let unescaped = unescape_line(text, false);
        let raw = if config.text_encoding == TextEncoding::Utf8 {
            let s = String::from_utf8(unescaped).map_err(|e| {
                AmiError::with_source(
                    ErrorKind::InvalidEncoding,
                    format!("invalid UTF-8 on txt line {}", line_no),
                    e.into(),
                )
            })?;
            utf8_to_sjis(&s, false)?
        } else {
            unescaped
        };
        let mut line = Line::new(id, line_no);
        line.en = Some(raw);
        lines.push(line);
    }

    Ok((header, lines))
}

fn parse_txt_record(line: &[u8]) -> Option<(u32, &[u8])> {
    let rest = line.strip_prefix(b"<<")?;
    let close = rest.windows(2).position(|w| w == b">>")?;
    let id_str = std::str::from_utf8(&rest[..close]).ok()?;
    let id = u32::from_str_radix(id_str, 16).ok()?;
    let mut text_start = close + 2;
    if rest.get(text_start) == Some(&b' ') {
        text_start += 1;
    }
    Some((id, &rest[text_start..]))
}

fn parse_hex_u32(s: &[u8]) -> Result<u32> {
    let s = std::str::from_utf8(s)?;
    Ok(u32::from_str_radix(s, 16)?)
}

fn parse_dec_u32(s: &[u8]) -> Result<u32> {
    let s = std::str::from_utf8(s)?;
    Ok(s.parse()?)
}

fn strip_cr(l: &[u8]) -> &[u8] {
    if l.last() == Some(&b'\r') {
        &l[..l.len() - 1]
    } else {
        l
    }
}

fn trim_ascii(s: &[u8]) -> &[u8] {
    let start = s.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(s.len());
    let end = s.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(0, |i| i + 1);
    if start >= end {
        &[]
    } else {
        &s[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            text_encoding: TextEncoding::Utf8,
            ..Config::default()
        }
    }

    #[test]
    fn writer_emits_header_and_commented_echo() {
        let lines = vec![ScrLine {
            id: 0x0A,
            bytes: b"hi".to_vec(),
        }];
        let out = write_txt(0xAABBCCDD, 1, &lines, &config()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("#FILENAME aabbccdd\n#TYPE 1\n\n"));
        assert!(text.contains("//<<0000000a>> hi\n"));
        assert!(text.contains("<<0000000a>> hi\n"));
    }

    #[test]
    fn compiler_reads_header_and_skips_comment_echo() {
        let input = b"#FILENAME 0000000A\n#TYPE 2\n\n//<<0000000A>> hi\n<<0000000A>> hi\n\n";
        let (header, lines) = compile_txt(input, &config()).unwrap();
        assert_eq!(header.file_id, Some(0x0A));
        assert_eq!(header.type_id, Some(2));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].id, 0x0A);
        assert_eq!(lines[0].effective_text(), Some(&b"hi"[..]));
    }

    #[test]
    fn round_trips_through_write_then_compile() {
        let scr_lines = vec![ScrLine {
            id: 0x20,
            bytes: b"round trip".to_vec(),
        }];
        let written = write_txt(0x20, 1, &scr_lines, &config()).unwrap();
        let (_header, compiled) = compile_txt(&written, &config()).unwrap();
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].effective_text(), Some(&b"round trip"[..]));
    }
}
