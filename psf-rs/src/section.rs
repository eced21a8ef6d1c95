use std::collections::HashMap;
use std::io::{Read, Seek};

use crate::error::{PsfError, Result};
use crate::ext::cursor_ext::PsfCursorExt;

pub(crate) const CHUNK_MAJOR_SECTION: u32 = 0x15;
pub(crate) const CHUNK_MINOR_SECTION: u32 = 0x16;

const FOOTER_MARKER: &[u8; 8] = b"Clarissa";

/// Identifies one of the five top-level sections a PSF file carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum SectionId {
    Header,
    Type,
    Sweep,
    Trace,
    Value,
}

impl SectionId {
    fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(SectionId::Header),
            1 => Some(SectionId::Type),
            2 => Some(SectionId::Sweep),
            3 => Some(SectionId::Trace),
            4 => Some(SectionId::Value),
            _ => None,
        }
    }
}

/// A section's position and extent within the file, as declared by the
/// table of contents (footer path) or inferred while streaming
/// (no-footer path).
#[derive(Debug, Clone, Copy)]
pub(crate) struct SectionInfo {
    pub offset: u32,
    pub size: u32,
}

/// The result of probing a file's layout: which sections exist and
/// where, plus whether a footer TOC was present at all (the single
/// ingredient of `is_wellformed()`).
pub(crate) struct SectionTable {
    pub sections: HashMap<SectionId, SectionInfo>,
    pub has_footer: bool,
    /// The first four bytes of the file. Historically a `0x0400` marker,
    /// read but never validated upstream; kept around in case a future
    /// consumer wants it.
    pub version_marker: u32,
}

impl SectionTable {
    /// Probes the file layout: reads the leading marker, checks for the
    /// `Clarissa` footer, and either reads the TOC at the tail or streams
    /// sections sequentially from offset 4.
    pub(crate) fn probe<R: Read + Seek>(cursor: &mut R) -> Result<Self> {
        cursor.seek_absolute(0)?;
        let version_marker = cursor.read_u32_be()?;

        let file_size = cursor.file_size()?;
        if file_size < 12 {
            return Self::stream_sections(cursor, file_size)
                .map(|sections| SectionTable {
                    sections,
                    has_footer: false,
                    version_marker,
                })
                .map_err(|_| PsfError::NotPsf);
        }

        cursor.seek_absolute(file_size - 12)?;
        let mut marker = [0u8; 8];
        cursor.read_exact(&mut marker)?;

        if &marker == FOOTER_MARKER {
            let sections = Self::read_footer_toc(cursor, file_size)?;
            Ok(SectionTable {
                sections,
                has_footer: true,
                version_marker,
            })
        } else {
            let sections = Self::stream_sections(cursor, file_size)?;
            if sections.is_empty() {
                return Err(PsfError::NotPsf);
            }
            Ok(SectionTable {
                sections,
                has_footer: false,
                version_marker,
            })
        }
    }

    fn read_footer_toc<R: Read + Seek>(
        cursor: &mut R,
        file_size: u64,
    ) -> Result<HashMap<SectionId, SectionInfo>> {
        cursor.seek_absolute(file_size - 4)?;
        let data_size = cursor.read_u32_be()? as u64;

        let count = (file_size - data_size - 12) / 8;
        let toc_start = file_size - 12 - 8 * count;

        cursor.seek_absolute(toc_start)?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let section_id = cursor.read_u32_be()?;
            let section_offset = cursor.read_u32_be()?;
            entries.push((section_id, section_offset));
        }

        let mut sections = HashMap::new();
        for (index, (id, offset)) in entries.iter().copied().enumerate() {
            let size = if index + 1 < entries.len() {
                entries[index + 1].1 - offset
            } else {
                file_size as u32 - offset
            };
            if let Some(section_id) = SectionId::from_wire(id) {
                sections.insert(section_id, SectionInfo { offset, size });
            }
        }

        Ok(sections)
    }

    /// Streams sections sequentially from offset 4, each fronted by its
    /// id and a `MAJOR_SECTION` chunk preamble. Stops at the first
    /// unrecognized section id.
    fn stream_sections<R: Read + Seek>(
        cursor: &mut R,
        file_size: u64,
    ) -> Result<HashMap<SectionId, SectionInfo>> {
        let mut sections = HashMap::new();
        cursor.seek_absolute(4)?;

        loop {
            let position = cursor.tell()?;
            if position >= file_size {
                break;
            }
            let raw_id = match cursor.read_u32_be() {
                Ok(v) => v,
                Err(_) => break,
            };
            let section_id = match SectionId::from_wire(raw_id) {
                Some(id) => id,
                None => {
                    cursor.unread_u32().ok();
                    break;
                }
            };

            let offset = cursor.tell()? as u32;
            let end_offset = read_chunk_preamble(cursor, CHUNK_MAJOR_SECTION)?;
            sections.insert(
                section_id,
                SectionInfo {
                    offset,
                    size: end_offset as u32 - offset,
                },
            );
            cursor.seek_absolute(end_offset)?;
        }

        Ok(sections)
    }
}

/// Reads a `(tag, end_offset)` chunk preamble and checks the tag against
/// `expected`.
pub(crate) fn read_chunk_preamble<R: Read + Seek>(cursor: &mut R, expected: u32) -> Result<u64> {
    let tag = cursor.read_u32_be()?;
    if tag != expected {
        return Err(PsfError::BadChunkTag {
            expected,
            found: tag,
        });
    }
    Ok(cursor.read_u32_be()? as u64)
}

/// Seeks to a section's declared offset and reads its `MAJOR_SECTION`
/// preamble, returning the section's absolute end offset.
pub(crate) fn enter_section<R: Read + Seek>(cursor: &mut R, info: &SectionInfo) -> Result<u64> {
    cursor.seek_absolute(info.offset as u64)?;
    read_chunk_preamble(cursor, CHUNK_MAJOR_SECTION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn footer_file(sections: &[(u32, u32)], data_size: u32, total_len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; total_len];
        bytes[0..4].copy_from_slice(&0x0400u32.to_be_bytes());
        let toc_start = total_len - 12 - sections.len() * 8;
        for (i, (id, offset)) in sections.iter().enumerate() {
            let pos = toc_start + i * 8;
            bytes[pos..pos + 4].copy_from_slice(&id.to_be_bytes());
            bytes[pos + 4..pos + 8].copy_from_slice(&offset.to_be_bytes());
        }
        bytes[total_len - 12..total_len - 4].copy_from_slice(FOOTER_MARKER);
        bytes[total_len - 4..total_len].copy_from_slice(&data_size.to_be_bytes());
        bytes
    }

    #[test]
    fn footer_toc_is_discovered_with_correct_sizes() {
        // 3 sections at offsets 4, 20, 40; file length 100, data_size such
        // that num_sections = (100 - data_size - 12) / 8 == 3
        let total_len = 100usize;
        let data_size = total_len as u32 - 12 - 3 * 8;
        let bytes = footer_file(&[(0, 4), (1, 20), (3, 40)], data_size, total_len);

        let mut cursor = Cursor::new(bytes);
        let table = SectionTable::probe(&mut cursor).unwrap();
        assert!(table.has_footer);
        assert_eq!(table.sections.len(), 3);
        assert_eq!(table.sections[&SectionId::Header].offset, 4);
        assert_eq!(table.sections[&SectionId::Header].size, 16);
        assert_eq!(table.sections[&SectionId::Type].offset, 20);
        assert_eq!(table.sections[&SectionId::Type].size, 20);
        assert_eq!(table.sections[&SectionId::Trace].offset, 40);
        assert_eq!(table.sections[&SectionId::Trace].size, total_len as u32 - 40);
    }

    #[test]
    fn missing_footer_falls_back_to_streaming_scan() {
        let mut bytes = vec![0u8; 4]; // version marker
        bytes.extend_from_slice(&0u32.to_be_bytes()); // SectionId::Header
        bytes.extend_from_slice(&CHUNK_MAJOR_SECTION.to_be_bytes());
        bytes.extend_from_slice(&20u32.to_be_bytes()); // end offset
        bytes.resize(20, 0);

        let mut cursor = Cursor::new(bytes);
        let table = SectionTable::probe(&mut cursor).unwrap();
        assert!(!table.has_footer);
        assert_eq!(table.sections.len(), 1);
        assert!(table.sections.contains_key(&SectionId::Header));
    }

    #[test]
    fn neither_footer_nor_recognizable_section_is_not_psf() {
        let mut bytes = vec![0u8; 4];
        bytes.extend_from_slice(&0xDEADBEEFu32.to_be_bytes());
        bytes.resize(16, 0xAB);

        let mut cursor = Cursor::new(bytes);
        match SectionTable::probe(&mut cursor) {
            Err(PsfError::NotPsf) => {}
            other => panic!("expected NotPsf, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn bad_chunk_tag_is_reported_with_both_values() {
        let bytes = vec![0u8, 0, 0, 0x99, 0, 0, 0, 1];
        let mut cursor = Cursor::new(bytes);
        match read_chunk_preamble(&mut cursor, CHUNK_MAJOR_SECTION) {
            Err(PsfError::BadChunkTag { expected, found }) => {
                assert_eq!(expected, CHUNK_MAJOR_SECTION);
                assert_eq!(found, 0x99);
            }
            other => panic!("expected BadChunkTag, got {other:?}"),
        }
    }
}
