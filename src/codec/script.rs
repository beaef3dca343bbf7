//! The `SCR` binary script container: a small header, a directory of
//! `(offset, length, id)` records, and a blob of NUL-terminated lines.
use crate::error::{AmiError, ErrorKind};
use crate::ext::io::{MemReader, ReadExt, WriteExt};
use anyhow::Result;

const SCR_MAGIC: &[u8; 4] = b"SCR\0";
const SCR_HEADER_SIZE: usize = 12;
const SCR_RECORD_SIZE: usize = 12;

fn script_syntax(context: impl Into<String>) -> anyhow::Error {
    AmiError::new(ErrorKind::ScriptSyntax, context).into()
}

/// One decoded `(id, raw_bytes)` pair in on-disk order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrLine {
    pub id: u32,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ScrFile {
    pub type_id: u32,
    pub lines: Vec<ScrLine>,
}

/// Parses a raw (already-inflated, if applicable) `SCR` byte stream.
pub fn read_scr(data: &[u8]) -> Result<ScrFile> {
    if data.len() < SCR_HEADER_SIZE || &data[0..4] != SCR_MAGIC {
        return Err(script_syntax("not an SCR script: bad magic"));
    }
    let mut r = MemReader::new(data.to_vec());
    r.read_exact_vec(4)?; // magic, already checked
    let type_id = r.read_u32()?;
    let count = r.read_u32()? as usize;

    let dir_end = SCR_HEADER_SIZE
        .checked_add(
            count
                .checked_mul(SCR_RECORD_SIZE)
                .ok_or_else(|| script_syntax("directory record count overflows available space"))?,
        )
        .ok_or_else(|| script_syntax("directory extends past the entry"))?;
    if dir_end > data.len() {
        return Err(script_syntax(format!(
            "directory ({} records) extends past the entry ({} bytes)",
            count,
            data.len()
        )));
    }

    let total = data.len();
    let mut lines = Vec::with_capacity(count);
    for _ in 0..count {
        let offset = r.read_u32()? as usize;
        let length = r.read_u32()? as usize;
        let id = r.read_u32()?;
        let end = offset
            .checked_add(length)
            .ok_or_else(|| script_syntax("record offset+length overflows"))?;
        if offset < total && length <= total && end <= total {
            lines.push(ScrLine {
                id,
                bytes: data[offset..end].to_vec(),
            });
        } else {
            return Err(script_syntax(format!(
                "record id {:#x} is out of bounds: offset={}, length={}, entry size={}",
                id, offset, length, total
            )));
        }
    }
    Ok(ScrFile { type_id, lines })
}

/// Serializes an `SCR` file: header, directory, then the NUL-terminated
/// blob, in the same order the lines were supplied in.
pub fn write_scr(type_id: u32, lines: &[ScrLine]) -> Result<Vec<u8>> {
    let count = lines.len();
    let dir_size = count * SCR_RECORD_SIZE;
    let blob_start = SCR_HEADER_SIZE + dir_size;

    let mut offsets = Vec::with_capacity(count);
    let mut blob = Vec::new();
    for line in lines {
        offsets.push(blob_start + blob.len());
        blob.extend_from_slice(&line.bytes);
        blob.push(0);
    }

    let mut out = Vec::with_capacity(blob_start + blob.len());
    out.extend_from_slice(SCR_MAGIC);
    out.write_u32(type_id)?;
    out.write_u32(count as u32)?;
    for (line, offset) in lines.iter().zip(&offsets) {
        out.write_u32(*offset as u32)?;
        out.write_u32(line.bytes.len() as u32)?;
        out.write_u32(line.id)?;
    }
    out.extend_from_slice(&blob);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let lines = vec![
            ScrLine {
                id: 0x0A,
                bytes: b"hi".to_vec(),
            },
            ScrLine {
                id: 0x0B,
                bytes: b"there".to_vec(),
            },
        ];
        let bytes = write_scr(1, &lines).unwrap();
        let parsed = read_scr(&bytes).unwrap();
        assert_eq!(parsed.type_id, 1);
        assert_eq!(parsed.lines, lines);
    }

    #[test]
    fn matches_scenario_s3_layout() {
        // S3: "SCR 1 UTF-8\n1\n\n[00000A|ru] hi\n" compiles to a single
        // line "hi" with id 0x0A, directory offset 24, length 2.
        let lines = vec![ScrLine {
            id: 0x0A,
            bytes: b"hi".to_vec(),
        }];
        let bytes = write_scr(1, &lines).unwrap();
        assert_eq!(&bytes[0..4], b"SCR\0");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 1);
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), 1);
        assert_eq!(u32::from_le_bytes(bytes[12..16].try_into().unwrap()), 24);
        assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(bytes[20..24].try_into().unwrap()), 0x0A);
        assert_eq!(&bytes[24..27], b"hi\0");
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(read_scr(b"XXXX\0\0\0\0\0\0\0\0").is_err());
    }

    #[test]
    fn rejects_out_of_bounds_record() {
        let mut bytes = write_scr(
            1,
            &[ScrLine {
                id: 1,
                bytes: b"x".to_vec(),
            }],
        )
        .unwrap();
        // Corrupt the record's length to run past the entry.
        bytes[16..20].copy_from_slice(&999u32.to_le_bytes());
        assert!(read_scr(&bytes).is_err());
    }
}
