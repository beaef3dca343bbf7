//! The `AMI` archive builder: classifies a source directory, encodes
//! each entry per its kind, and writes a new archive atomically. An
//! optional merge-from-source mode preserves untouched entries from a
//! reference archive verbatim.
use crate::archive::reader::AmiReader;
use crate::classify::{classify, FileAttrs, Kind};
use crate::codec::image::{encode_grp, png_to_grp};
use crate::codec::script::{write_scr, ScrLine};
use crate::codec::zlib::deflate;
use crate::config::Config;
use crate::error::{AmiError, ErrorKind};
use crate::ext::io::WriteExt;
use crate::text::{mlt, txt, Line};
use crate::utils::files::list_dir_entries;
use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const TOC_RECORD_SIZE: u32 = 16;

struct ClassifiedFile {
    path: PathBuf,
    kind: Kind,
    modified: std::time::SystemTime,
}

/// One entry ready to be written: its logical payload length, the bytes
/// to place on disk (already compressed/encoded where applicable), and
/// whether those bytes are compressed.
struct EncodedEntry {
    id: u32,
    unpacked_size: u32,
    bytes: Vec<u8>,
    compressed: bool,
}

fn encoded(id: u32, unpacked_size: u32, bytes: Vec<u8>, compressed: bool) -> EncodedEntry {
    EncodedEntry {
        id,
        unpacked_size,
        bytes,
        compressed,
    }
}

/// Walks `dir` non-recursively and classifies every file found, keeping
/// the later-modified file on an id collision.
fn collect_classified(dir: &Path, config: &Config) -> Result<BTreeMap<u32, ClassifiedFile>> {
    let mut by_id: BTreeMap<u32, ClassifiedFile> = BTreeMap::new();
    for entry in list_dir_entries(dir)? {
        let txt_header_id = if entry.file_name.to_ascii_lowercase().ends_with(".txt") {
            peek_txt_header_id(&entry.path, config)?
        } else {
            None
        };
        let Some((id, kind)) = classify(&entry.file_name, FileAttrs::default(), entry.size, txt_header_id) else {
            continue;
        };
        match by_id.get(&id) {
            Some(existing) if existing.modified >= entry.modified => {}
            _ => {
                by_id.insert(
                    id,
                    ClassifiedFile {
                        path: entry.path,
                        kind,
                        modified: entry.modified,
                    },
                );
            }
        }
    }
    Ok(by_id)
}

fn peek_txt_header_id(path: &Path, config: &Config) -> Result<Option<u32>> {
    let bytes = crate::utils::files::read_file(path)?;
    let (header, _lines) = txt::compile_txt(&bytes, config)?;
    Ok(header.file_id)
}

/// Encodes one classified file into its on-disk entry bytes, per the
/// per-kind emission table.
fn encode_entry(id: u32, kind: Kind, path: &Path, config: &Config) -> Result<EncodedEntry> {
    let bytes = crate::utils::files::read_file(path).with_context(|| format!("reading {}", path.display()))?;
    match kind {
        Kind::Png => {
            let image = png_to_grp(&bytes).with_context(|| format!("decoding PNG {}", path.display()))?;
            let raw = encode_grp(&image)?;
            let packed = deflate(&raw, 9)?;
            Ok(encoded(id, raw.len() as u32, packed, true))
        }
        Kind::Grp => {
            let packed = deflate(&bytes, 9)?;
            Ok(encoded(id, bytes.len() as u32, packed, true))
        }
        Kind::Zgrp => {
            if bytes.len() < 4 {
                bail!("zgrp entry {} is smaller than its 4-byte size prefix", path.display());
            }
            let unpacked_size = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
            Ok(encoded(id, unpacked_size, bytes[4..].to_vec(), true))
        }
        Kind::Mlt => {
            let (header, lines) = mlt::compile_mlt(&bytes, config)?;
            let type_id = header.type_id.unwrap_or(0);
            let scr = lines_to_scr(type_id, &lines)?;
            Ok(encoded(id, scr.len() as u32, scr, false))
        }
        Kind::Txt => {
            let (header, lines) = txt::compile_txt(&bytes, config)?;
            let type_id = header.type_id.unwrap_or(0);
            let scr = lines_to_scr(type_id, &lines)?;
            Ok(encoded(id, scr.len() as u32, scr, false))
        }
        Kind::Scr => Ok(encoded(id, bytes.len() as u32, bytes, false)),
    }
}

fn lines_to_scr(type_id: u32, lines: &[Line]) -> Result<Vec<u8>> {
    if lines.is_empty() {
        return Err(AmiError::new(ErrorKind::ScriptEmpty, "script has no lines").into());
    }
    let mut scr_lines = Vec::with_capacity(lines.len());
    for line in lines {
        let Some(text) = line.effective_text() else {
            return Err(AmiError::new(
                ErrorKind::MissingRussianLine,
                format!("line {:#x} has neither a ru nor en translation", line.id),
            )
            .into());
        };
        if line.ru.is_none() {
            eprintln!("Warning: line {:#x} has no ru translation, using en", line.id);
            crate::COUNTER.inc_warning();
        }
        scr_lines.push(ScrLine {
            id: line.id,
            bytes: text.to_vec(),
        });
    }
    write_scr(type_id, &scr_lines)
}

/// Options controlling one `build` invocation.
pub struct BuildOptions<'a> {
    pub source_dir: PathBuf,
    pub output: PathBuf,
    pub merge_from: Option<PathBuf>,
    pub config: &'a Config,
}

/// Classifies `options.source_dir`, encodes every entry, and writes a
/// new archive to `options.output` via a temp file + atomic rename. If
/// `options.merge_from` is set, entries not present among the classified
/// inputs are copied verbatim from that reference archive instead of
/// being dropped.
pub fn build(
    options: &BuildOptions,
    mut on_progress: impl FnMut(u32, usize, usize),
    mut is_aborted: impl FnMut() -> bool,
) -> Result<usize> {
    let classified = collect_classified(&options.source_dir, options.config)?;

    let dest_dir = options
        .output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dest_dir)?;
    let mut temp = tempfile::NamedTempFile::new_in(dest_dir)?;

    let written = match &options.merge_from {
        Some(reference_path) => {
            let reference_bytes = crate::utils::files::read_file(reference_path)?;
            let reference = AmiReader::open(reference_bytes)?;
            write_merged(temp.as_file_mut(), &reference, &classified, options.config, &mut on_progress, &mut is_aborted)?
        }
        None => write_fresh(temp.as_file_mut(), &classified, options.config, &mut on_progress, &mut is_aborted)?,
    };

    temp.persist(&options.output)
        .with_context(|| format!("committing archive to {}", options.output.display()))?;
    Ok(written)
}

/// Writes every classified entry in ascending id order (no reference
/// archive to merge against).
fn write_fresh(
    file: &mut std::fs::File,
    classified: &BTreeMap<u32, ClassifiedFile>,
    config: &Config,
    on_progress: &mut impl FnMut(u32, usize, usize),
    is_aborted: &mut impl FnMut() -> bool,
) -> Result<usize> {
    let count = classified.len();
    let toc_start = 16u64;
    let payload_start = toc_start + count as u64 * TOC_RECORD_SIZE as u64;
    file.seek(SeekFrom::Start(payload_start))?;

    let mut records = Vec::with_capacity(count);
    let total = count;
    for (i, (&id, entry)) in classified.iter().enumerate() {
        if is_aborted() {
            bail!("build aborted");
        }
        on_progress(id, i, total);
        let encoded = encode_entry(id, entry.kind, &entry.path, config)
            .with_context(|| format!("encoding {}", entry.path.display()))?;
        let offset = file.stream_position()? as u32;
        file.write_all(&encoded.bytes)?;
        records.push(toc_record(
            id,
            offset,
            encoded.unpacked_size,
            if encoded.compressed { encoded.bytes.len() as u32 } else { 0 },
        ));
    }

    write_header(file, &records, payload_start as u32)?;
    Ok(records.len())
}

/// Writes entries in the reference archive's TOC order: a replacement
/// from `classified` where present, else the reference bytes verbatim.
fn write_merged(
    file: &mut std::fs::File,
    reference: &AmiReader,
    classified: &BTreeMap<u32, ClassifiedFile>,
    config: &Config,
    on_progress: &mut impl FnMut(u32, usize, usize),
    is_aborted: &mut impl FnMut() -> bool,
) -> Result<usize> {
    let count = reference.toc().len();
    let toc_start = 16u64;
    let payload_start = toc_start + count as u64 * TOC_RECORD_SIZE as u64;
    file.seek(SeekFrom::Start(payload_start))?;

    let mut records = Vec::with_capacity(count);
    let total = count;
    for (seq, toc_entry) in reference.toc().to_vec().into_iter().enumerate() {
        if is_aborted() {
            bail!("build aborted");
        }
        on_progress(toc_entry.id, seq, total);
        let offset = file.stream_position()? as u32;
        if let Some(entry) = classified.get(&toc_entry.id) {
            let encoded = encode_entry(toc_entry.id, entry.kind, &entry.path, config)
                .with_context(|| format!("encoding {}", entry.path.display()))?;
            file.write_all(&encoded.bytes)?;
            records.push(toc_record(
                toc_entry.id,
                offset,
                encoded.unpacked_size,
                if encoded.compressed { encoded.bytes.len() as u32 } else { 0 },
            ));
        } else {
            reference.copy_raw(seq, &mut *file)?;
            records.push(toc_record(
                toc_entry.id,
                offset,
                toc_entry.unpacked_size,
                toc_entry.packed_size,
            ));
        }
    }

    write_header(file, &records, payload_start as u32)?;
    Ok(records.len())
}

struct TocRecord {
    id: u32,
    offset: u32,
    unpacked_size: u32,
    packed_size: u32,
}

fn toc_record(id: u32, offset: u32, unpacked_size: u32, packed_size: u32) -> TocRecord {
    TocRecord {
        id,
        offset,
        unpacked_size,
        packed_size,
    }
}

fn write_header(file: &mut std::fs::File, records: &[TocRecord], first_payload_offset: u32) -> Result<()> {
    file.seek(SeekFrom::Start(0))?;
    file.write_all(b"AMI\0")?;
    file.write_u32(records.len() as u32)?;
    file.write_u32(first_payload_offset)?;
    file.write_u32(0)?;
    for record in records {
        file.write_u32(record.id)?;
        file.write_u32(record.offset)?;
        file.write_u32(record.unpacked_size)?;
        file.write_u32(record.packed_size)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TextEncoding;

    fn write_temp(dir: &Path, name: &str, bytes: &[u8]) {
        std::fs::write(dir.join(name), bytes).unwrap();
    }

    #[test]
    fn builds_minimum_archive_from_one_mlt_file() {
        let src = tempfile::tempdir().unwrap();
        write_temp(src.path(), "0000000a.mlt", b"SCR 1 UTF-8\n1\n\n[00000a|ru] hi\n");
        let out = tempfile::NamedTempFile::new().unwrap();
        let out_path = out.path().to_path_buf();
        drop(out);

        let config = Config {
            text_encoding: TextEncoding::Utf8,
            ..Config::default()
        };
        let options = BuildOptions {
            source_dir: src.path().to_path_buf(),
            output: out_path.clone(),
            merge_from: None,
            config: &config,
        };
        let written = build(&options, |_, _, _| {}, || false).unwrap();
        assert_eq!(written, 1);

        let bytes = std::fs::read(&out_path).unwrap();
        let reader = AmiReader::open(bytes).unwrap();
        assert_eq!(reader.count(), 1);
        let (id, scr_bytes) = reader.decode(0).unwrap();
        assert_eq!(id, 0x0A);
        let scr = crate::codec::script::read_scr(&scr_bytes).unwrap();
        assert_eq!(scr.lines[0].bytes, b"hi");
        let _ = std::fs::remove_file(&out_path);
    }

    #[test]
    fn zgrp_passes_through_prefix_stripped() {
        let src = tempfile::tempdir().unwrap();
        let mut zgrp = Vec::new();
        zgrp.extend_from_slice(&42u32.to_le_bytes());
        zgrp.extend_from_slice(b"already-deflated-bytes");
        write_temp(src.path(), "00000001.zgrp", &zgrp);
        let out = tempfile::NamedTempFile::new().unwrap();
        let out_path = out.path().to_path_buf();
        drop(out);

        let config = Config::default();
        let options = BuildOptions {
            source_dir: src.path().to_path_buf(),
            output: out_path.clone(),
            merge_from: None,
            config: &config,
        };
        build(&options, |_, _, _| {}, || false).unwrap();

        let bytes = std::fs::read(&out_path).unwrap();
        let reader = AmiReader::open(bytes).unwrap();
        assert_eq!(reader.toc()[0].unpacked_size, 42);
        assert_eq!(reader.toc()[0].packed_size, 23);
        let mut raw = Vec::new();
        reader.copy_raw(0, &mut raw).unwrap();
        assert_eq!(raw, b"already-deflated-bytes");
        let _ = std::fs::remove_file(&out_path);
    }

    #[test]
    fn later_modified_file_wins_on_id_collision() {
        let src = tempfile::tempdir().unwrap();
        write_temp(src.path(), "00000001.scr", b"SCR\0\0\0\0\0\0\0\0\0");
        std::thread::sleep(std::time::Duration::from_millis(10));
        write_temp(src.path(), "00000001.grp", &{
            let mut v = Vec::new();
            v.extend_from_slice(&0x5247u16.to_le_bytes());
            v.extend_from_slice(&0x0050u16.to_le_bytes());
            v.extend_from_slice(&0i16.to_le_bytes());
            v.extend_from_slice(&0i16.to_le_bytes());
            v.extend_from_slice(&1u16.to_le_bytes());
            v.extend_from_slice(&1u16.to_le_bytes());
            v.extend_from_slice(&[1, 2, 3, 255]);
            v
        });
        let config = Config::default();
        let classified = collect_classified(src.path(), &config).unwrap();
        assert_eq!(classified.len(), 1);
        assert_eq!(classified[&1].kind, Kind::Grp);
    }

    #[test]
    fn merge_from_source_keeps_untouched_entries_verbatim() {
        let config = Config::default();

        // Build a two-entry reference archive directly.
        let reference_src = tempfile::tempdir().unwrap();
        write_temp(reference_src.path(), "00000001.mlt", b"SCR 1 UTF-8\n1\n\n[000001|ru] one\n");
        write_temp(reference_src.path(), "00000002.mlt", b"SCR 1 UTF-8\n1\n\n[000002|ru] two\n");
        let reference_path = tempfile::NamedTempFile::new().unwrap().path().to_path_buf();
        build(
            &BuildOptions {
                source_dir: reference_src.path().to_path_buf(),
                output: reference_path.clone(),
                merge_from: None,
                config: &config,
            },
            |_, _, _| {},
            || false,
        )
        .unwrap();

        // A merge source that only supplies a replacement for id 1.
        let merge_src = tempfile::tempdir().unwrap();
        write_temp(merge_src.path(), "00000001.mlt", b"SCR 1 UTF-8\n1\n\n[000001|ru] ONE-REPLACED\n");
        let out_path = tempfile::NamedTempFile::new().unwrap().path().to_path_buf();

        let written = build(
            &BuildOptions {
                source_dir: merge_src.path().to_path_buf(),
                output: out_path.clone(),
                merge_from: Some(reference_path.clone()),
                config: &config,
            },
            |_, _, _| {},
            || false,
        )
        .unwrap();
        assert_eq!(written, 2);

        let bytes = std::fs::read(&out_path).unwrap();
        let reader = AmiReader::open(bytes).unwrap();
        assert_eq!(reader.count(), 2);

        let seq1 = reader.find(1).unwrap();
        let (_, scr1) = reader.decode(seq1).unwrap();
        let scr1 = crate::codec::script::read_scr(&scr1).unwrap();
        assert_eq!(scr1.lines[0].bytes, b"ONE-REPLACED");

        let seq2 = reader.find(2).unwrap();
        let (_, scr2) = reader.decode(seq2).unwrap();
        let scr2 = crate::codec::script::read_scr(&scr2).unwrap();
        assert_eq!(scr2.lines[0].bytes, b"two");

        let _ = std::fs::remove_file(&reference_path);
        let _ = std::fs::remove_file(&out_path);
    }
}
