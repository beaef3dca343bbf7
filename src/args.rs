//! Command-line argument parsing: global conversion flags plus the
//! `extract`/`pack`/`info` subcommands.
use crate::config::{Config, ImageFormat, TextEncoding, TextFormat, Verbosity};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Converts between `AMI` visual-novel archives and editable text/image
/// transcripts.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Arg {
    #[arg(long, value_enum, global = true, default_value = "mlt")]
    /// Text transcript format used for extract/pack
    pub text_format: TextFormat,
    #[arg(long, value_enum, global = true, default_value = "utf-8")]
    /// Text encoding used inside transcripts
    pub encoding: TextEncoding,
    #[arg(long, value_enum, global = true, default_value = "png")]
    /// Image format used for extract/pack
    pub image_format: ImageFormat,
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    /// Don't emit a duplicate `ru`-tagged line alongside `en` on extract
    pub no_ru_duplicate: bool,
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    /// Skip extracting script text
    pub no_texts: bool,
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    /// Skip extracting images
    pub no_images: bool,
    #[arg(short, long, action = ArgAction::SetTrue, global = true)]
    /// Suppress per-entry progress output
    pub quiet: bool,
    #[arg(short, long, action = ArgAction::SetTrue, global = true)]
    /// Print extra per-entry diagnostics
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Unpack an AMI archive into a destination directory
    Extract {
        /// Path to the source AMI archive
        archive: PathBuf,
        /// Destination directory (defaults to the archive's own directory)
        output: Option<PathBuf>,
    },
    /// Pack a source directory into an AMI archive
    Pack {
        /// Source directory of classified files
        input: PathBuf,
        /// Destination archive path (defaults to `<input>.ami`)
        output: Option<PathBuf>,
        /// Reference archive to merge unchanged entries from
        #[arg(long)]
        merge_from: Option<PathBuf>,
    },
    /// Print an archive's table of contents without extracting it
    Info {
        /// Path to the source AMI archive
        archive: PathBuf,
    },
}

pub fn parse_args() -> Arg {
    Arg::parse()
}

/// Builds the library-facing `Config` from parsed CLI flags.
pub fn config_from_args(arg: &Arg) -> Config {
    Config {
        text_format: arg.text_format,
        text_encoding: arg.encoding,
        image_format: arg.image_format,
        add_ru_line: !arg.no_ru_duplicate,
        extract_texts: !arg.no_texts,
        extract_images: !arg.no_images,
        verbosity: if arg.quiet {
            Verbosity::Quiet
        } else if arg.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        },
        ..Config::default()
    }
}
