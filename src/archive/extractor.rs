//! Dispatches each `AMI` entry to a raw, script, or image sink based on
//! its decoded signature, and the two concrete `Writer`s: one that emits
//! files under a destination directory, one that captures in memory for
//! tests.
use crate::archive::reader::AmiReader;
use crate::codec::image::grp_to_png;
use crate::codec::script::read_scr;
use crate::config::{Config, ImageFormat, TextFormat, Verbosity};
use crate::text::{mlt, txt, xml};
use crate::utils::files::write_file;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// A sink for extracted entries. Every method returns `false` to abort
/// the run early (a filesystem error, an operator-requested stop); `true`
/// continues to the next entry.
pub trait Writer {
    fn write_raw(&mut self, id: u32, bytes: &[u8]) -> bool;
    fn write_script(&mut self, id: u32, bytes: &[u8]) -> bool;
    fn write_image(&mut self, id: u32, bytes: &[u8]) -> bool;
}

/// Visits every `AMI` entry in TOC order, classifying each one by its
/// decoded signature and dispatching to the matching `Writer` sink.
/// Returns the number of entries successfully processed. A sink
/// returning `false`, or the abort predicate firing, stops the run early
/// without treating it as an error.
pub fn extract<W: Writer>(
    reader: &AmiReader,
    writer: &mut W,
    mut on_progress: impl FnMut(u32, usize, usize),
    mut is_aborted: impl FnMut() -> bool,
) -> Result<usize> {
    let total = reader.count();
    let mut done = 0;
    for seq in 0..total {
        if is_aborted() {
            break;
        }
        let entry = reader.toc()[seq];
        on_progress(entry.id, seq, total);

        let (id, bytes) = match reader.decode(seq) {
            Ok(v) => v,
            Err(e) => {
                eprintln!("Warning: failed to decode entry {:#x}: {:#}", entry.id, e);
                crate::COUNTER.inc_error();
                continue;
            }
        };

        let continues = if entry.packed_size > 0 {
            if is_grp(&bytes) {
                writer.write_image(id, &bytes)
            } else {
                writer.write_raw(id, &bytes)
            }
        } else if is_scr(&bytes) {
            writer.write_script(id, &bytes)
        } else {
            writer.write_raw(id, &bytes)
        };

        if !continues {
            break;
        }
        done += 1;
    }
    Ok(done)
}

fn is_grp(bytes: &[u8]) -> bool {
    bytes.len() > 12 && &bytes[0..4] == b"GRP\0"
}

fn is_scr(bytes: &[u8]) -> bool {
    bytes.len() > 12 && &bytes[0..4] == b"SCR\0"
}

/// A `Writer` that emits each entry under a destination directory:
/// `<id:08x>.png`/`.grp` for images, `<id:08x>.<mlt|txt|xml>` for
/// scripts, `<id:08x>.dat` for anything else.
pub struct FsWriter<'a> {
    dir: PathBuf,
    config: &'a Config,
}

impl<'a> FsWriter<'a> {
    pub fn new(dir: impl Into<PathBuf>, config: &'a Config) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, config })
    }

    fn path_for(&self, id: u32, ext: &str) -> PathBuf {
        self.dir.join(format!("{:08x}.{}", id, ext))
    }

    fn note(&self, message: impl std::fmt::Display) {
        if self.config.verbosity == Verbosity::Verbose {
            eprintln!("{}", message);
        }
    }

    fn emit_image(&mut self, id: u32, bytes: &[u8]) -> Result<()> {
        let image = png_to_grp_passthrough(bytes)?;
        match self.config.image_format {
            ImageFormat::Grp => {
                let raw = crate::codec::image::encode_grp(&image)?;
                write_file(&self.path_for(id, "grp"))?.write_all(&raw)?;
            }
            ImageFormat::Png => {
                let file = write_file(&self.path_for(id, "png"))?;
                grp_to_png(&image, file, self.config.png_compression_level)?;
            }
        }
        Ok(())
    }

    fn emit_script(&mut self, id: u32, bytes: &[u8]) -> Result<()> {
        let scr = read_scr(bytes)?;
        let out = match self.config.text_format {
            TextFormat::Mlt => mlt::write_mlt(scr.type_id, &scr.lines, self.config)?,
            TextFormat::Txt => txt::write_txt(id, scr.type_id, &scr.lines, self.config)?,
            TextFormat::Xml => xml::write_xml(id, scr.type_id, &scr.lines, self.config)?,
        };
        let ext = match self.config.text_format {
            TextFormat::Mlt => "mlt",
            TextFormat::Txt => "txt",
            TextFormat::Xml => "xml",
        };
        write_file(&self.path_for(id, ext))?.write_all(&out)?;
        Ok(())
    }

    fn emit_raw(&mut self, id: u32, bytes: &[u8]) -> Result<()> {
        write_file(&self.path_for(id, "dat"))?.write_all(bytes)?;
        Ok(())
    }
}

/// GRP bytes are already raw GRP; this just parses the header so the
/// image sink can re-encode through either output format uniformly.
fn png_to_grp_passthrough(bytes: &[u8]) -> Result<crate::codec::image::GrpImage> {
    crate::codec::image::decode_grp(bytes).context("decoding GRP payload")
}

impl<'a> Writer for FsWriter<'a> {
    fn write_raw(&mut self, id: u32, bytes: &[u8]) -> bool {
        if let Err(e) = self.emit_raw(id, bytes) {
            eprintln!("Warning: failed to write raw entry {:#x}: {:#}", id, e);
            crate::COUNTER.inc_error();
        } else {
            self.note(format_args!("wrote raw entry {:#x} ({} bytes)", id, bytes.len()));
            crate::COUNTER.inc_ok();
        }
        true
    }

    fn write_script(&mut self, id: u32, bytes: &[u8]) -> bool {
        if !self.config.extract_texts {
            self.note(format_args!("skipped script entry {:#x} (texts disabled)", id));
            crate::COUNTER.inc_skipped();
            return true;
        }
        if let Err(e) = self.emit_script(id, bytes) {
            eprintln!("Warning: failed to write script entry {:#x}: {:#}", id, e);
            crate::COUNTER.inc_error();
        } else {
            self.note(format_args!("wrote script entry {:#x}", id));
            crate::COUNTER.inc_ok();
        }
        true
    }

    fn write_image(&mut self, id: u32, bytes: &[u8]) -> bool {
        if !self.config.extract_images {
            self.note(format_args!("skipped image entry {:#x} (images disabled)", id));
            crate::COUNTER.inc_skipped();
            return true;
        }
        if let Err(e) = self.emit_image(id, bytes) {
            eprintln!("Warning: failed to write image entry {:#x}: {:#}", id, e);
            crate::COUNTER.inc_error();
        } else {
            self.note(format_args!("wrote image entry {:#x}", id));
            crate::COUNTER.inc_ok();
        }
        true
    }
}

/// An in-memory `Writer` used by tests to capture what would have been
/// written without touching the filesystem.
#[derive(Debug, Default)]
pub struct CaptureWriter {
    pub raw: Vec<(u32, Vec<u8>)>,
    pub scripts: Vec<(u32, Vec<u8>)>,
    pub images: Vec<(u32, Vec<u8>)>,
}

impl Writer for CaptureWriter {
    fn write_raw(&mut self, id: u32, bytes: &[u8]) -> bool {
        self.raw.push((id, bytes.to_vec()));
        true
    }

    fn write_script(&mut self, id: u32, bytes: &[u8]) -> bool {
        self.scripts.push((id, bytes.to_vec()));
        true
    }

    fn write_image(&mut self, id: u32, bytes: &[u8]) -> bool {
        self.images.push((id, bytes.to_vec()));
        true
    }
}

use std::io::Write as _;
