//! The `AMI` container reader: magic/TOC validation plus per-entry
//! verbatim copy and inflate-on-demand decode.
use crate::codec::zlib::inflate;
use crate::error::{AmiError, ErrorKind};
use crate::ext::io::ReadExt;
use anyhow::{Context, Result};
use std::io::Write;

const AMI_MAGIC: &[u8; 4] = b"AMI\0";
const TOC_START: u64 = 16;
const TOC_RECORD_SIZE: u64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocEntry {
    pub id: u32,
    pub offset: u32,
    pub unpacked_size: u32,
    pub packed_size: u32,
}

/// A read-only view over an in-memory `AMI` archive. Holds the whole
/// archive as an owned buffer rather than a memory mapping: nothing
/// downstream needs random page-in, and an owned `Vec<u8>` keeps every
/// subview's lifetime trivial.
#[derive(Debug)]
pub struct AmiReader {
    data: Vec<u8>,
    toc: Vec<TocEntry>,
}

impl AmiReader {
    pub fn open(data: Vec<u8>) -> Result<Self> {
        if data.len() < 16 || &data[0..4] != AMI_MAGIC {
            return Err(AmiError::new(ErrorKind::NotAmi, "bad magic").into());
        }
        let count = u32::from_le_bytes(data[4..8].try_into().unwrap()) as usize;
        let toc_end = TOC_START as usize + count * TOC_RECORD_SIZE as usize;
        if toc_end > data.len() {
            return Err(AmiError::new(
                ErrorKind::BadOffset,
                format!(
                    "table of contents ({} records) extends past the file ({} bytes)",
                    count,
                    data.len()
                ),
            )
            .into());
        }

        let mut toc = Vec::with_capacity(count);
        let mut cursor = &data[TOC_START as usize..toc_end];
        for _ in 0..count {
            let id = cursor.read_u32()?;
            let offset = cursor.read_u32()?;
            let unpacked_size = cursor.read_u32()?;
            let packed_size = cursor.read_u32()?;
            let stored_size = if packed_size > 0 { packed_size } else { unpacked_size };
            let end = (offset as u64)
                .checked_add(stored_size as u64)
                .context("AMI entry offset+size overflows")?;
            if end > data.len() as u64 {
                return Err(AmiError::new(
                    ErrorKind::BadOffset,
                    format!(
                        "entry {:#x} exceeds the file: offset={}, size={}, file size={}",
                        id,
                        offset,
                        stored_size,
                        data.len()
                    ),
                )
                .into());
            }
            toc.push(TocEntry {
                id,
                offset,
                unpacked_size,
                packed_size,
            });
        }

        Ok(Self { data, toc })
    }

    pub fn count(&self) -> usize {
        self.toc.len()
    }

    pub fn toc(&self) -> &[TocEntry] {
        &self.toc
    }

    pub fn find(&self, id: u32) -> Option<usize> {
        self.toc.iter().position(|e| e.id == id)
    }

    fn stored_bytes(&self, seq: usize) -> &[u8] {
        let entry = &self.toc[seq];
        let stored_size = if entry.packed_size > 0 {
            entry.packed_size
        } else {
            entry.unpacked_size
        };
        let start = entry.offset as usize;
        &self.data[start..start + stored_size as usize]
    }

    /// Writes the entry's on-disk bytes verbatim, no decompression.
    pub fn copy_raw<W: Write>(&self, seq: usize, mut writer: W) -> Result<()> {
        writer.write_all(self.stored_bytes(seq))?;
        Ok(())
    }

    /// Inflates a compressed entry, or returns the stored bytes as-is.
    pub fn decode(&self, seq: usize) -> Result<(u32, Vec<u8>)> {
        let entry = self.toc[seq];
        let stored = self.stored_bytes(seq);
        let bytes = if entry.packed_size > 0 {
            inflate(stored, entry.unpacked_size as usize)?
        } else {
            stored.to_vec()
        };
        Ok((entry.id, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::zlib::deflate;

    fn build(entries: &[(u32, &[u8], bool)]) -> Vec<u8> {
        let mut payload = Vec::new();
        let mut toc = Vec::new();
        for &(id, bytes, compress) in entries {
            let offset = TOC_START as usize + entries.len() * 16 + payload.len();
            if compress {
                let packed = deflate(bytes, 6).unwrap();
                toc.push((id, offset as u32, bytes.len() as u32, packed.len() as u32));
                payload.extend_from_slice(&packed);
            } else {
                toc.push((id, offset as u32, bytes.len() as u32, 0u32));
                payload.extend_from_slice(bytes);
            }
        }
        let mut out = Vec::new();
        out.extend_from_slice(AMI_MAGIC);
        out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        out.extend_from_slice(&(TOC_START as u32 + entries.len() as u32 * 16).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        for (id, offset, unpacked, packed) in toc {
            out.extend_from_slice(&id.to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
            out.extend_from_slice(&unpacked.to_le_bytes());
            out.extend_from_slice(&packed.to_le_bytes());
        }
        out.extend_from_slice(&payload);
        out
    }

    #[test]
    fn reads_stored_and_compressed_entries() {
        let bytes = build(&[(1, b"hello", false), (2, b"compressed payload", true)]);
        let reader = AmiReader::open(bytes).unwrap();
        assert_eq!(reader.count(), 2);
        let (id, decoded) = reader.decode(0).unwrap();
        assert_eq!((id, decoded), (1, b"hello".to_vec()));
        let (id, decoded) = reader.decode(1).unwrap();
        assert_eq!((id, decoded), (2, b"compressed payload".to_vec()));
    }

    #[test]
    fn find_resolves_first_matching_id() {
        let bytes = build(&[(7, b"a", false), (9, b"b", false)]);
        let reader = AmiReader::open(bytes).unwrap();
        assert_eq!(reader.find(9), Some(1));
        assert_eq!(reader.find(42), None);
    }

    #[test]
    fn copy_raw_preserves_stored_bytes_verbatim() {
        let bytes = build(&[(1, b"literal bytes", false)]);
        let reader = AmiReader::open(bytes).unwrap();
        let mut out = Vec::new();
        reader.copy_raw(0, &mut out).unwrap();
        assert_eq!(out, b"literal bytes");
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(AmiReader::open(b"XXXX\0\0\0\0\0\0\0\0\0\0\0\0".to_vec()).is_err());
    }

    #[test]
    fn rejects_toc_past_eof() {
        let mut bytes = build(&[(1, b"hello", false)]);
        bytes[4..8].copy_from_slice(&99u32.to_le_bytes());
        assert!(AmiReader::open(bytes).is_err());
    }
}
