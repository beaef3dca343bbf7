//! The per-invocation configuration record. Built once from parsed CLI
//! arguments and threaded by reference through the reader, builder, and
//! codecs — no process-global mutable state.
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TextFormat {
    Mlt,
    Txt,
    Xml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TextEncoding {
    #[value(name = "shift-jis")]
    ShiftJis,
    #[value(name = "utf-8")]
    Utf8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImageFormat {
    Png,
    Grp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub text_format: TextFormat,
    pub text_encoding: TextEncoding,
    pub image_format: ImageFormat,
    /// Whether extraction additionally writes a `ru`-tagged copy of each
    /// line alongside `en`. Default true, matching the original's
    /// compiled-in behavior.
    pub add_ru_line: bool,
    pub extract_texts: bool,
    pub extract_images: bool,
    pub verbosity: Verbosity,
    /// Parse errors within one transcript line are logged and the line
    /// skipped rather than aborting the whole file.
    pub ignore_script_errors: bool,
    pub png_compression_level: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            text_format: TextFormat::Mlt,
            text_encoding: TextEncoding::Utf8,
            image_format: ImageFormat::Png,
            add_ru_line: true,
            extract_texts: true,
            extract_images: true,
            verbosity: Verbosity::Normal,
            ignore_script_errors: true,
            png_compression_level: 6,
        }
    }
}
