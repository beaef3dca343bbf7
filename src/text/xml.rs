//! The `xml` multi-language transcript format: a `<script>` element
//! wrapping one `<line>` per script line, each carrying an `en` and
//! (optionally) a duplicate `ru` `<text>` child. Entities replace the
//! handful of characters XML reserves; a literal newline is left alone.
use crate::codec::script::ScrLine;
use crate::config::{Config, TextEncoding};
use crate::error::{AmiError, ErrorKind};
use crate::text::{Lang, Line};
use crate::utils::encoding::{sjis_to_utf8, utf8_to_sjis};
use crate::utils::escape::{escape_line, has_unknown_escape, unescape_line};
use anyhow::Result;

fn script_syntax(context: impl Into<String>) -> anyhow::Error {
    AmiError::new(ErrorKind::ScriptSyntax, context).into()
}

/// Emits the `xml` transcript for a decoded `SCR` file's lines. `file_id`
/// is the archive entry's own id, written in hex on the `<script>` root
/// the same way `txt`'s `#FILENAME` header carries it.
pub fn write_xml(file_id: u32, type_id: u32, lines: &[ScrLine], config: &Config) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.extend_from_slice(format!("<script id=\"{:08x}\" type=\"{}\">\n", file_id, type_id).as_bytes());
    for line in lines {
        let text = match config.text_encoding {
            TextEncoding::ShiftJis => line.bytes.clone(),
            TextEncoding::Utf8 => sjis_to_utf8(&line.bytes, false)?.into_bytes(),
        };
        let escaped = escape_line(&text, true);
        out.extend_from_slice(format!("  <line id=\"{:06x}\">\n", line.id).as_bytes());
        write_text_element(&mut out, Lang::En, &escaped);
        if config.add_ru_line {
            write_text_element(&mut out, Lang::Ru, &escaped);
        }
        out.extend_from_slice(b"  </line>\n");
    }
    out.extend_from_slice(b"</script>\n");
    Ok(out)
}

fn write_text_element(out: &mut Vec<u8>, lang: Lang, text: &[u8]) {
    out.extend_from_slice(format!("    <text language=\"{}\">", lang).as_bytes());
    out.extend_from_slice(text);
    out.extend_from_slice(b"</text>\n");
}

/// Parses an `xml` transcript back into the per-id `Line` records. This
/// is a small hand-rolled reader rather than a full XML parser: it only
/// needs to understand the fixed shape this format's writer produces
/// (one `<line>`/`<text>` nesting level, no attributes beyond `id`/`type`/
/// `language`).
pub fn compile_xml(data: &[u8], config: &Config) -> Result<Vec<Line>> {
    let (data, _had_bom) = crate::utils::encoding::strip_utf8_bom(data);
    let mut lines = Vec::new();
    let mut cursor = 0usize;

    while let Some(rel) = find(&data[cursor..], b"<line") {
        let line_start = cursor + rel;
        let tag_end = find(&data[line_start..], b">")
            .map(|i| line_start + i)
            .ok_or_else(|| script_syntax("unterminated <line> tag"))?;
        let id = parse_attr(&data[line_start..tag_end], b"id")
            .ok_or_else(|| script_syntax("missing id attribute on <line>"))?;
        let id = u32::from_str_radix(&id, 16)?;

        let body_end = find(&data[tag_end..], b"</line>")
            .map(|i| tag_end + i)
            .ok_or_else(|| script_syntax(format!("unterminated <line> element for id {:06x}", id)))?;
        let body = &data[tag_end + 1..body_end];

        let mut line = Line::new(id, 0);
        let mut tcursor = 0usize;
        while let Some(rel) = find(&body[tcursor..], b"<text") {
            let tstart = tcursor + rel;
            let topen_end = find(&body[tstart..], b">")
                .map(|i| tstart + i)
                .ok_or_else(|| script_syntax(format!("unterminated <text> tag on line {:06x}", id)))?;
            let lang_str = parse_attr(&body[tstart..topen_end], b"language")
                .unwrap_or_else(|| "en".to_string());
            let Some(lang) = Lang::from_str_opt(&lang_str) else {
                return Err(script_syntax(format!("unknown language {:?} on line {:06x}", lang_str, id)));
            };
            let tclose = find(&body[topen_end..], b"</text>")
                .map(|i| topen_end + i)
                .ok_or_else(|| script_syntax(format!("unterminated <text> element on line {:06x}", id)))?;
            let raw_text = &body[topen_end + 1..tclose];

            if has_unknown_escape(raw_text) {
                eprintln!("Warning: unknown escape sequence on xml line {:06x}", id);
                crate::COUNTER.inc_warning();
            }
            let unescaped = unescape_line(raw_text, true);
            let bytes = if config.text_encoding == TextEncoding::Utf8 {
                let s = String::from_utf8(unescaped).map_err(|e| {
                    AmiError::with_source(
                        ErrorKind::InvalidEncoding,
                        format!("invalid UTF-8 on xml line {:06x}", id),
                        e.into(),
                    )
                })?;
                utf8_to_sjis(&s, false)?
            } else {
                unescaped
            };
            *line.slot_mut(lang) = Some(bytes);
            tcursor = tclose + 7;
        }
        lines.push(line);
        cursor = body_end + 7;
    }

    Ok(lines)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Extracts the value of `attr="..."` from a tag's byte span, assuming
/// double-quoted attribute values (as this format's writer always emits).
fn parse_attr(tag: &[u8], attr: &[u8]) -> Option<String> {
    let mut pattern = attr.to_vec();
    pattern.push(b'=');
    pattern.push(b'"');
    let start = find(tag, &pattern)? + pattern.len();
    let end = find(&tag[start..], b"\"")? + start;
    String::from_utf8(tag[start..end].to_vec()).ok()
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
    fn writer_emits_en_and_ru_duplicate() {
        let lines = vec![ScrLine {
            id: 0x0A,
            bytes: b"hi".to_vec(),
        }];
        let out = write_xml(0x0A, 1, &lines, &config()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("<script id=\"0000000a\" type=\"1\">"));
        assert!(text.contains("<line id=\"00000a\">"));
        assert!(text.contains("<text language=\"en\">hi</text>"));
        assert!(text.contains("<text language=\"ru\">hi</text>"));
    }

    #[test]
    fn entities_and_literal_newline_round_trip() {
        let lines = vec![ScrLine {
            id: 0x01,
            bytes: "<a> & \"b\"\nsecond".as_bytes().to_vec(),
        }];
        let out = write_xml(0x01, 1, &lines, &config()).unwrap();
        let compiled = compile_xml(&out, &config()).unwrap();
        assert_eq!(compiled.len(), 1);
        assert_eq!(
            compiled[0].effective_text(),
            Some("<a> & \"b\"\nsecond".as_bytes())
        );
    }

    #[test]
    fn compiler_reads_ru_preferred_over_en() {
        let input = br#"<?xml version="1.0" encoding="UTF-8"?>
<script id="1" type="1">
  <line id="00000a">
    <text language="en">hello</text>
    <text language="ru">privet</text>
  </line>
</script>
"#;
        let lines = compile_xml(input, &config()).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].id, 0x0A);
        assert_eq!(lines[0].effective_text(), Some(&b"privet"[..]));
    }

    #[test]
    fn round_trips_through_write_then_compile() {
        let scr_lines = vec![ScrLine {
            id: 0x20,
            bytes: b"round trip".to_vec(),
        }];
        let written = write_xml(0x20, 1, &scr_lines, &config()).unwrap();
        let compiled = compile_xml(&written, &config()).unwrap();
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].effective_text(), Some(&b"round trip"[..]));
    }
}
