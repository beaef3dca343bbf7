//! The control-byte escape alphabet used inside script lines, plus the
//! handful of XML entities the `xml` transcript format additionally needs.
//!
//! Binary scripts embed formatting control bytes straight in the text blob
//! (ruby markers, pauses, color changes, ...). Transcripts spell these out
//! as a two-character backslash sequence so a line stays one row in a text
//! editor. The table below is fixed by the archives this format reads, not
//! by us: it must stay stable across `extract`/`pack` round trips.
///
/// Operates byte-wise rather than on `str`: the Shift-JIS output path
/// carries raw CP-932 bytes that are not valid UTF-8, but every byte this
/// table or the XML entity set cares about is plain ASCII, so scanning
/// bytes directly works for both the Shift-JIS and UTF-8 paths without
/// needing to validate or re-decode the surrounding text.
const ESCAPE_PAIRS: &[(u8, u8)] = &[
    (0x01, b'e'),
    (0x02, b'l'),
    (0x03, b'p'),
    (0x05, b'r'),
    (0x12, b'c'),
    (0x13, b'd'),
    (0x1E, b'm'),
];

/// Alternate read-side spelling for 0x02 (`\f` as well as `\l`), per the
/// "both accepted on read" rule.
const ALT_READ_ESCAPES: &[(u8, u8)] = &[(b'f', 0x02)];

fn escape_letter_for(byte: u8) -> Option<u8> {
    ESCAPE_PAIRS.iter().find(|(b, _)| *b == byte).map(|(_, c)| *c)
}

fn byte_for_escape_letter(letter: u8) -> Option<u8> {
    ESCAPE_PAIRS
        .iter()
        .find(|(_, c)| *c == letter)
        .map(|(b, _)| *b)
        .or_else(|| {
            ALT_READ_ESCAPES
                .iter()
                .find(|(c, _)| *c == letter)
                .map(|(_, b)| *b)
        })
}

/// Escapes control bytes in a decoded script line into `\x` sequences.
///
/// The `xml` transcript format additionally escapes `&`, `<`, `>` and `"`
/// as entities, and leaves a literal newline alone rather than turning it
/// into the two-character `\n` sequence the `mlt`/`txt` formats use.
pub fn escape_line(bytes: &[u8], xml: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for &b in bytes {
        if b == b'\n' {
            if xml {
                out.push(b'\n');
            } else {
                out.extend_from_slice(b"\\n");
            }
            continue;
        }
        if b < 0x20 {
            if let Some(letter) = escape_letter_for(b) {
                out.push(b'\\');
                out.push(letter);
                continue;
            }
        }
        if xml {
            match b {
                b'&' => out.extend_from_slice(b"&amp;"),
                b'<' => out.extend_from_slice(b"&lt;"),
                b'>' => out.extend_from_slice(b"&gt;"),
                b'"' => out.extend_from_slice(b"&quot;"),
                _ => out.push(b),
            }
        } else {
            out.push(b);
        }
    }
    out
}

/// Reverses [`escape_line`]: turns `\x` escape sequences (and, for `xml`,
/// entities) back into literal control bytes / characters. Unknown
/// escapes (an unrecognized letter after `\`) are preserved verbatim;
/// the caller is responsible for warning about them. An un-escaped `//`
/// anywhere in the text truncates the line at that point (a trailing
/// comment), independent of any whole-line `//` comment convention the
/// caller applies before this is reached.
pub fn unescape_line(bytes: &[u8], xml: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' && i + 1 < bytes.len() {
            let next = bytes[i + 1];
            if next == b'n' {
                out.push(b'\n');
                i += 2;
                continue;
            }
            if let Some(byte) = byte_for_escape_letter(next) {
                out.push(byte);
                i += 2;
                continue;
            }
            out.push(b);
            i += 1;
            continue;
        }
        if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
            break;
        }
        if xml && b == b'&' {
            let rest = &bytes[i..];
            let entity: Option<(&[u8], u8)> = [
                (&b"amp;"[..], b'&'),
                (&b"lt;"[..], b'<'),
                (&b"gt;"[..], b'>'),
                (&b"quot;"[..], b'"'),
            ]
            .into_iter()
            .find(|(tag, _)| rest[1..].starts_with(tag));
            if let Some((tag, ch)) = entity {
                out.push(ch);
                i += 1 + tag.len();
                continue;
            }
        }
        out.push(b);
        i += 1;
    }
    out
}

/// `true` if `\` is followed by a letter not present in the escape table
/// (used to warn on unrecognized escapes while still preserving them).
pub fn has_unknown_escape(bytes: &[u8]) -> bool {
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'\\' {
            let next = bytes[i + 1];
            if next != b'n' && byte_for_escape_letter(next).is_none() {
                return true;
            }
            i += 2;
        } else {
            i += 1;
        }
    }
    false
}
