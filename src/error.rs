//! The crate-wide error kind. Library functions return `anyhow::Result`
//! throughout (matching the rest of the corpus); this enum exists so the
//! CLI can map a failure to the right exit code and so call sites can
//! attach filename/id context with [`anyhow::Context`].
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    NotAmi,
    BadOffset,
    InvalidCompressedStream,
    UnsupportedImage,
    InvalidEncoding,
    ScriptSyntax,
    ScriptEmpty,
    DuplicateLine,
    MissingRussianLine,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Io => "I/O error",
            ErrorKind::NotAmi => "not an AMI archive",
            ErrorKind::BadOffset => "table-of-contents entry exceeds file bounds",
            ErrorKind::InvalidCompressedStream => "invalid compressed stream",
            ErrorKind::UnsupportedImage => "unsupported image",
            ErrorKind::InvalidEncoding => "invalid text encoding",
            ErrorKind::ScriptSyntax => "script syntax error",
            ErrorKind::ScriptEmpty => "script has no lines",
            ErrorKind::DuplicateLine => "duplicate line id",
            ErrorKind::MissingRussianLine => "missing Russian line",
        };
        write!(f, "{}", s)
    }
}

/// A typed error carrying the kind plus whatever filename/id context was
/// available at the failure site. Wrapped in `anyhow::Error` everywhere
/// except at the CLI's top-level exit-code mapping.
#[derive(Debug)]
pub struct AmiError {
    pub kind: ErrorKind,
    pub context: String,
    pub source: Option<anyhow::Error>,
}

impl AmiError {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Self {
            kind,
            context: context.into(),
            source: None,
        }
    }

    pub fn with_source(kind: ErrorKind, context: impl Into<String>, source: anyhow::Error) -> Self {
        Self {
            kind,
            context: context.into(),
            source: Some(source),
        }
    }

    /// Maps to the CLI exit code described in the external interfaces: 0
    /// success, 1 bad input file, 2 invalid script, 3 output open
    /// failure, 70 unexpected internal error.
    pub fn exit_code(&self) -> i32 {
        match self.kind {
            ErrorKind::NotAmi | ErrorKind::BadOffset | ErrorKind::UnsupportedImage => 1,
            ErrorKind::ScriptSyntax | ErrorKind::ScriptEmpty | ErrorKind::InvalidEncoding => 2,
            ErrorKind::Io => 3,
            ErrorKind::InvalidCompressedStream
            | ErrorKind::DuplicateLine
            | ErrorKind::MissingRussianLine => 70,
        }
    }
}

impl fmt::Display for AmiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.context)
    }
}

impl std::error::Error for AmiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e.as_ref())
    }
}
