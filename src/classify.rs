//! Maps a source filename (plus size and basic attributes) to the entry
//! kind and numeric id the archive builder should use for it. Independent
//! of the archive pipeline proper so it can be unit-tested in isolation.
use fancy_regex::Regex;
use std::sync::LazyLock;

static FILE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(.+)\.(png|mlt|scr|txt|grp|zgrp)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Png,
    Mlt,
    Scr,
    Txt,
    Grp,
    Zgrp,
}

impl Kind {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Kind::Png),
            "mlt" => Some(Kind::Mlt),
            "scr" => Some(Kind::Scr),
            "txt" => Some(Kind::Txt),
            "grp" => Some(Kind::Grp),
            "zgrp" => Some(Kind::Zgrp),
            _ => None,
        }
    }
}

/// Basic filesystem attribute bits the classifier rejects on. On
/// platforms without these concepts (most of Unix), all are `false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileAttrs {
    pub hidden: bool,
    pub system: bool,
    pub is_dir: bool,
}

/// Classifies one candidate source file. `txt_header_id` is the id read
/// from a `#FILENAME` header line, used instead of the basename for
/// `txt` inputs; callers that haven't read the file yet may pass `None`
/// and get `None` back for `txt` entries lacking a parseable basename id.
pub fn classify(filename: &str, attrs: FileAttrs, size: u64, txt_header_id: Option<u32>) -> Option<(u32, Kind)> {
    if attrs.hidden || attrs.system || attrs.is_dir {
        return None;
    }
    if size == 0 || size > u32::MAX as u64 {
        return None;
    }

    let caps = FILE_PATTERN.captures(filename).ok()??;
    let base = caps.get(1)?.as_str();
    let ext = caps.get(2)?.as_str();
    let kind = Kind::from_extension(ext)?;

    let id = if kind == Kind::Txt {
        txt_header_id.or_else(|| u32::from_str_radix(base, 16).ok())?
    } else {
        u32::from_str_radix(base, 16).ok()?
    };
    if id == 0 {
        return None;
    }
    Some((id, kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_extensions_case_insensitively() {
        assert_eq!(
            classify("0000000A.PNG", FileAttrs::default(), 10, None),
            Some((0x0A, Kind::Png))
        );
        assert_eq!(
            classify("0000000a.zgrp", FileAttrs::default(), 10, None),
            Some((0x0A, Kind::Zgrp))
        );
    }

    #[test]
    fn rejects_unknown_extension() {
        assert_eq!(classify("0000000A.bin", FileAttrs::default(), 10, None), None);
    }

    #[test]
    fn rejects_hidden_system_and_directory_entries() {
        let base = FileAttrs::default();
        assert_eq!(
            classify("0000000A.png", FileAttrs { hidden: true, ..base }, 10, None),
            None
        );
        assert_eq!(
            classify("0000000A.png", FileAttrs { system: true, ..base }, 10, None),
            None
        );
        assert_eq!(
            classify("0000000A.png", FileAttrs { is_dir: true, ..base }, 10, None),
            None
        );
    }

    #[test]
    fn rejects_zero_size_and_zero_id() {
        assert_eq!(classify("0000000A.png", FileAttrs::default(), 0, None), None);
        assert_eq!(classify("00000000.png", FileAttrs::default(), 10, None), None);
    }

    #[test]
    fn txt_uses_header_id_over_basename() {
        assert_eq!(
            classify("script.txt", FileAttrs::default(), 10, Some(0x42)),
            Some((0x42, Kind::Txt))
        );
        assert_eq!(
            classify("0000000A.txt", FileAttrs::default(), 10, None),
            Some((0x0A, Kind::Txt))
        );
    }

    #[test]
    fn rejects_oversized_files() {
        assert_eq!(
            classify("0000000A.png", FileAttrs::default(), u32::MAX as u64 + 1, None),
            None
        );
    }
}
