//! The `mlt` multi-language transcript format: one or two tagged lines
//! (`en`, optionally duplicated as `ru`) per script line, Shift-JIS or
//! UTF-8 encoded, `;`-prefixed comments.
use crate::codec::script::ScrLine;
use crate::config::{Config, TextEncoding};
use crate::error::{AmiError, ErrorKind};
use crate::text::{Lang, Line};
use crate::utils::encoding::{sjis_to_utf8, utf8_to_sjis};
use crate::utils::escape::{escape_line, has_unknown_escape, unescape_line};
use anyhow::Result;

fn encoding_name(encoding: TextEncoding) -> &'static str {
    match encoding {
        TextEncoding::ShiftJis => "Shift-JIS",
        TextEncoding::Utf8 => "UTF-8",
    }
}

/// Emits the `mlt` transcript for a decoded `SCR` file's lines.
pub fn write_mlt(type_id: u32, lines: &[ScrLine], config: &Config) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(
        format!(
            "SCR {} {}\n{}\n",
            type_id,
            encoding_name(config.text_encoding),
            lines.len()
        )
        .as_bytes(),
    );
    for line in lines {
        out.push(b'\n');
        let text = match config.text_encoding {
            TextEncoding::ShiftJis => line.bytes.clone(),
            TextEncoding::Utf8 => sjis_to_utf8(&line.bytes, false)?.into_bytes(),
        };
        let escaped = escape_line(&text, false);
        write_tagged_line(&mut out, line.id, Lang::En, &escaped);
        if config.add_ru_line {
            write_tagged_line(&mut out, line.id, Lang::Ru, &escaped);
        }
    }
    Ok(out)
}

fn write_tagged_line(out: &mut Vec<u8>, id: u32, lang: Lang, text: &[u8]) {
    out.extend_from_slice(format!("[{:06x}|{}] ", id, lang).as_bytes());
    out.extend_from_slice(text);
    out.push(b'\n');
}

/// The `SCR` type id carried on an `mlt` transcript's header line.
#[derive(Debug, Default)]
pub struct MltHeader {
    pub type_id: Option<u32>,
}

/// Parses an `mlt` transcript back into the per-id `Line` records, ready
/// to be collapsed (ru-preferred) into `SCR` bytes by the caller.
pub fn compile_mlt(data: &[u8], config: &Config) -> Result<(MltHeader, Vec<Line>)> {
    let (data, detected_utf8) = crate::utils::encoding::strip_utf8_bom(data);
    let mut lines_by_id: std::collections::BTreeMap<u32, Line> = std::collections::BTreeMap::new();
    let mut order: Vec<u32> = Vec::new();
    let mut is_utf8 = detected_utf8 || config.text_encoding == TextEncoding::Utf8;
    let mut header = MltHeader::default();

    for (line_no, raw_line) in split_lines(data).enumerate() {
        let line_no = (line_no + 1) as u32;
        let trimmed = trim_comment(raw_line, b';');
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix(b"SCR ") {
            let mut parts = rest.split(|&b| b == b' ');
            if let Some(type_str) = parts.next() {
                header.type_id = std::str::from_utf8(type_str).ok().and_then(|s| s.parse().ok());
            }
            if let Some(token) = parts.next() {
                is_utf8 = token.eq_ignore_ascii_case(b"utf-8") || token.eq_ignore_ascii_case(b"utf8");
            }
            continue;
        }
        if trimmed.iter().all(|b| b.is_ascii_digit()) {
            continue; // the line count line
        }
        let Some((id, lang, text)) = parse_mlt_record(trimmed) else {
            if config.ignore_script_errors {
                eprintln!(
                    "Warning: skipping malformed mlt line {}: {:?}",
                    line_no,
                    String::from_utf8_lossy(trimmed)
                );
                crate::COUNTER.inc_warning();
                continue;
            } else {
                return Err(AmiError::new(
                    ErrorKind::ScriptSyntax,
                    format!("malformed mlt line {}: {:?}", line_no, String::from_utf8_lossy(trimmed)),
                )
                .into());
            }
        };

        if has_unknown_escape(text) {
            eprintln!("Warning: unknown escape sequence on mlt line {}", line_no);
            crate::COUNTER.inc_warning();
        }
        let unescaped = unescape_line(text, false);
        let raw = if is_utf8 {
            let s = String::from_utf8(unescaped).map_err(|e| {
                AmiError::with_source(
                    ErrorKind::InvalidEncoding,
                    format!("invalid UTF-8 on mlt line {}", line_no),
                    e.into(),
                )
            })?;
            utf8_to_sjis(&s, false)?
        } else {
            unescaped
        };

        let entry = lines_by_id.entry(id).or_insert_with(|| {
            order.push(id);
            Line::new(id, line_no)
        });
        let slot = entry.slot_mut(lang);
        if slot.is_some() {
            eprintln!(
                "Warning: duplicate ({:#x}, {}) on mlt line {}, dropping the second occurrence",
                id, lang, line_no
            );
            crate::COUNTER.inc_warning();
        } else {
            *slot = Some(raw);
        }
    }

    let lines = order
        .into_iter()
        .map(|id| lines_by_id.remove(&id).unwrap())
        .collect();
    Ok((header, lines))
}

fn parse_mlt_record(line: &[u8]) -> Option<(u32, Lang, &[u8])> {
    if line.first() != Some(&b'[') {
        return None;
    }
    let close = line.iter().position(|&b| b == b']')?;
    let inner = &line[1..close];
    let (id_part, lang) = match inner.iter().position(|&b| b == b'|') {
        Some(pipe) => {
            let lang_str = std::str::from_utf8(&inner[pipe + 1..]).ok()?;
            (&inner[..pipe], Lang::from_str_opt(lang_str)?)
        }
        None => (inner, Lang::Ru),
    };
    let id_str = std::str::from_utf8(id_part).ok()?;
    let id = u32::from_str_radix(id_str, 16).ok()?;
    let mut text_start = close + 1;
    if line.get(text_start) == Some(&b' ') {
        text_start += 1;
    }
    Some((id, lang, &line[text_start..]))
}

fn trim_comment(line: &[u8], marker: u8) -> &[u8] {
    match line.iter().position(|&b| b == marker) {
        Some(idx) => trim_ascii(&line[..idx]),
        None => trim_ascii(line),
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

fn split_lines(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    data.split(|&b| b == b'\n').map(|l| {
        if l.last() == Some(&b'\r') {
            &l[..l.len() - 1]
        } else {
            l
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            add_ru_line: true,
            text_encoding: TextEncoding::Utf8,
            ..Config::default()
        }
    }

    #[test]
    fn writer_emits_en_and_ru_duplicate() {
        let lines = vec![ScrLine {
            id: 0x0A,
            bytes: b"hi".to_vec(),
        }];
        let out = write_mlt(1, &lines, &config()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[00000a|en] hi\n"));
        assert!(text.contains("[00000a|ru] hi\n"));
    }

    #[test]
    fn writer_omits_ru_duplicate_when_disabled() {
        let lines = vec![ScrLine {
            id: 0x0A,
            bytes: b"hi".to_vec(),
        }];
        let mut cfg = config();
        cfg.add_ru_line = false;
        let out = write_mlt(1, &lines, &cfg).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[00000a|en] hi\n"));
        assert!(!text.contains("|ru]"));
    }

    #[test]
    fn scenario_s3_compiles_to_single_line() {
        let input = b"SCR 1 UTF-8\n1\n\n[00000A|ru] hi\n";
        let (header, lines) = compile_mlt(input, &config()).unwrap();
        assert_eq!(header.type_id, Some(1));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].id, 0x0A);
        assert_eq!(lines[0].effective_text(), Some(&b"hi"[..]));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let input = b"SCR 1 UTF-8\n1\n\n; a comment\n\n[000001|en] hello\n";
        let (_header, lines) = compile_mlt(input, &config()).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].en.as_deref(), Some(&b"hello"[..]));
    }

    #[test]
    fn duplicate_id_lang_pair_keeps_first_occurrence() {
        let input = b"SCR 1 UTF-8\n1\n\n[000001|en] first\n[000001|en] second\n";
        let (_header, lines) = compile_mlt(input, &config()).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].en.as_deref(), Some(&b"first"[..]));
    }

    #[test]
    fn second_language_fills_empty_slot_without_new_record() {
        let input = b"SCR 1 UTF-8\n1\n\n[000001|en] hello\n[000001|ru] privet\n";
        let (_header, lines) = compile_mlt(input, &config()).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].en.as_deref(), Some(&b"hello"[..]));
        assert_eq!(lines[0].ru.as_deref(), Some(&b"privet"[..]));
        assert_eq!(lines[0].effective_text(), Some(&b"privet"[..]));
    }

    #[test]
    fn round_trips_through_write_then_compile() {
        let scr_lines = vec![ScrLine {
            id: 0x20,
            bytes: b"round trip".to_vec(),
        }];
        let written = write_mlt(1, &scr_lines, &config()).unwrap();
        let (header, compiled) = compile_mlt(&written, &config()).unwrap();
        assert_eq!(header.type_id, Some(1));
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].id, 0x20);
        assert_eq!(compiled[0].effective_text(), Some(&b"round trip"[..]));
    }
}
