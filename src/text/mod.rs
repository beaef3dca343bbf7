//! Shared line model and language tag for the `mlt`/`txt`/`xml`
//! transcript formats, plus per-format readers and writers.
pub mod mlt;
pub mod txt;
pub mod xml;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lang {
    Ru,
    En,
    Jp,
}

impl Lang {
    pub fn as_str(self) -> &'static str {
        match self {
            Lang::Ru => "ru",
            Lang::En => "en",
            Lang::Jp => "jp",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "ru" => Some(Lang::Ru),
            "en" => Some(Lang::En),
            "jp" => Some(Lang::Jp),
            _ => None,
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One logical line of script text, with up to three language slots.
/// `source_line_no` is the 1-based line the record was parsed from, used
/// to put file/line context in diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub id: u32,
    pub source_line_no: u32,
    pub ru: Option<Vec<u8>>,
    pub en: Option<Vec<u8>>,
    pub jp: Option<Vec<u8>>,
}

impl Line {
    pub fn new(id: u32, source_line_no: u32) -> Self {
        Self {
            id,
            source_line_no,
            ru: None,
            en: None,
            jp: None,
        }
    }

    pub fn slot(&self, lang: Lang) -> &Option<Vec<u8>> {
        match lang {
            Lang::Ru => &self.ru,
            Lang::En => &self.en,
            Lang::Jp => &self.jp,
        }
    }

    pub fn slot_mut(&mut self, lang: Lang) -> &mut Option<Vec<u8>> {
        match lang {
            Lang::Ru => &mut self.ru,
            Lang::En => &mut self.en,
            Lang::Jp => &mut self.jp,
        }
    }

    /// The bytes emitted/read from the binary SCR blob: prefer `ru`, else
    /// `en`. Returns `None` if neither is populated (a `jp`-only line is
    /// not representable in the blob this codec writes).
    pub fn effective_text(&self) -> Option<&[u8]> {
        self.ru.as_deref().or(self.en.as_deref())
    }

    pub fn effective_lang(&self) -> Option<Lang> {
        if self.ru.is_some() {
            Some(Lang::Ru)
        } else if self.en.is_some() {
            Some(Lang::En)
        } else {
            None
        }
    }
}
