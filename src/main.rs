//! Command-line front-end: `extract`, `pack`, and `info` over `AMI`
//! archives.
pub mod archive;
pub mod args;
pub mod classify;
pub mod codec;
pub mod config;
pub mod error;
pub mod ext;
pub mod text;
pub mod utils;

use archive::builder::{build, BuildOptions};
use archive::extractor::{extract, FsWriter};
use archive::reader::AmiReader;
use config::{Config, Verbosity};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

lazy_static::lazy_static! {
    static ref COUNTER: utils::counter::Counter = utils::counter::Counter::new();
}

fn progress_line(verbosity: Verbosity) -> impl FnMut(u32, usize, usize) {
    move |id, done, total| {
        if verbosity != Verbosity::Quiet {
            eprintln!("[{}/{}] {:08x}", done + 1, total, id);
        }
    }
}

fn run_extract(config: &Config, archive: &PathBuf, output: &Option<PathBuf>, aborted: &Arc<AtomicBool>) -> anyhow::Result<()> {
    let bytes = utils::files::read_file(archive)?;
    let reader = AmiReader::open(bytes)?;
    let dest = output
        .clone()
        .unwrap_or_else(|| archive.with_extension(""));
    let mut writer = FsWriter::new(dest.clone(), config)?;
    let done = extract(
        &reader,
        &mut writer,
        progress_line(config.verbosity),
        || aborted.load(Ordering::SeqCst),
    )?;
    eprintln!("Extracted {} entries to {}", done, dest.display());
    eprintln!("{}", *COUNTER);
    Ok(())
}

fn run_pack(
    config: &Config,
    input: &PathBuf,
    output: &Option<PathBuf>,
    merge_from: &Option<PathBuf>,
    aborted: &Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let output = output
        .clone()
        .unwrap_or_else(|| input.with_extension("ami"));
    let options = BuildOptions {
        source_dir: input.clone(),
        output: output.clone(),
        merge_from: merge_from.clone(),
        config,
    };
    let written = build(&options, progress_line(config.verbosity), || aborted.load(Ordering::SeqCst))?;
    eprintln!("Packed {} entries into {}", written, output.display());
    eprintln!("{}", *COUNTER);
    Ok(())
}

fn run_info(archive: &PathBuf) -> anyhow::Result<()> {
    let bytes = utils::files::read_file(archive)?;
    let reader = AmiReader::open(bytes)?;
    println!("{:<10} {:<10} {:<10} {:<10} {}", "id", "offset", "unpacked", "packed", "kind");
    for seq in 0..reader.count() {
        let entry = reader.toc()[seq];
        let kind = match reader.decode(seq) {
            Ok((_, bytes)) if bytes.len() > 12 && &bytes[0..4] == b"GRP\0" => "grp",
            Ok((_, bytes)) if bytes.len() > 12 && &bytes[0..4] == b"SCR\0" => "scr",
            Ok(_) => "raw",
            Err(_) => "?",
        };
        println!(
            "{:<10x} {:<10} {:<10} {:<10} {}",
            entry.id, entry.offset, entry.unpacked_size, entry.packed_size, kind
        );
    }
    Ok(())
}

fn main() {
    let aborted = Arc::new(AtomicBool::new(false));
    {
        let aborted = aborted.clone();
        let _ = ctrlc::try_set_handler(move || {
            eprintln!("Aborted.");
            aborted.store(true, Ordering::SeqCst);
        });
    }

    let arg = args::parse_args();
    let config = args::config_from_args(&arg);

    let result = match &arg.command {
        args::Command::Extract { archive, output } => run_extract(&config, archive, output, &aborted),
        args::Command::Pack {
            input,
            output,
            merge_from,
        } => run_pack(&config, input, output, merge_from, &aborted),
        args::Command::Info { archive } => run_info(archive),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(exit_code_for(&e));
    }
}

/// Maps a top-level failure to the documented exit code. Errors that
/// didn't originate from an `AmiError` (I/O at the top level, CLI
/// plumbing) are treated as unexpected internal errors.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<error::AmiError>() {
        Some(ami_err) => ami_err.exit_code(),
        None => 70,
    }
}
