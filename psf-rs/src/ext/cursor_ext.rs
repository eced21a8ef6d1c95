use byteorder::{BigEndian, ReadBytesExt};
use std::io::{self, Read, Seek, SeekFrom};

/// Big-endian primitive reads and bounded seeking over the in-memory
/// buffer a [`crate::section::SectionTable`] walks.
///
/// PSF is big-endian throughout and its table of contents sits at the
/// tail of the file, so every primitive read here is paired with the
/// seek/tell operations needed to hop around a `Cursor<Vec<u8>>` freely.
pub(crate) trait PsfCursorExt: Read + Seek {
    /// Reads a big-endian `u32`.
    fn read_u32_be(&mut self) -> io::Result<u32> {
        self.read_u32::<BigEndian>()
    }

    /// Reads a big-endian `i32`. PSF does not distinguish signed and
    /// unsigned 32-bit integers on the wire; this is `read_u32_be`
    /// reinterpreted.
    fn read_i32_be(&mut self) -> io::Result<i32> {
        self.read_i32::<BigEndian>()
    }

    /// Reads a big-endian `f64`.
    fn read_f64_be(&mut self) -> io::Result<f64> {
        self.read_f64::<BigEndian>()
    }

    /// Reads a `u32`-length-prefixed UTF-8 string, consuming the
    /// zero-padding that rounds the read up to a 4-byte boundary.
    fn read_psf_string(&mut self) -> io::Result<String> {
        let length = self.read_u32_be()? as usize;
        let mut bytes = vec![0u8; length];
        self.read_exact(&mut bytes)?;

        let padding = (4 - (length % 4)) % 4;
        if padding > 0 {
            let mut pad = [0u8; 3];
            self.read_exact(&mut pad[..padding])?;
        }

        String::from_utf8(bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    /// Rewinds the cursor by 4 bytes, pushing back a tag word that turned
    /// out to belong to the next record rather than this one.
    fn unread_u32(&mut self) -> io::Result<u64> {
        self.seek(SeekFrom::Current(-4))
    }

    /// Seeks to an absolute byte offset.
    fn seek_absolute(&mut self, offset: u64) -> io::Result<u64> {
        self.seek(SeekFrom::Start(offset))
    }

    /// Seeks by a signed byte delta relative to the current position.
    fn seek_relative(&mut self, delta: i64) -> io::Result<u64> {
        self.seek(SeekFrom::Current(delta))
    }

    /// Returns the current byte offset.
    fn tell(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    /// Returns the total length of the underlying stream, restoring the
    /// current position afterwards.
    fn file_size(&mut self) -> io::Result<u64> {
        let current = self.stream_position()?;
        let size = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(current))?;
        Ok(size)
    }
}

impl<T: Read + Seek> PsfCursorExt for T {}
