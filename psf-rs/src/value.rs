use std::io::{Cursor, Read, Seek};

use crate::error::{PsfError, Result};
use crate::ext::cursor_ext::PsfCursorExt;
use crate::property::PropertyDict;
use crate::trace::{FlatColumn, Trace};
use crate::types::{sample_size, type_id, TypeRegistry};

const ELEMENT_DATA: u32 = 0x10;
const ELEMENT_GROUP: u32 = 0x11;
const ELEMENT_ZEROPAD: u32 = 0x14;
const NON_SWEPT_ENTRY_CODE: u32 = 16;

/// A complex sample: two consecutive big-endian doubles, real then
/// imaginary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Complex64 {
    pub re: f64,
    pub im: f64,
}

/// A dense, typed column of decoded samples.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalArray {
    Int32(Vec<i32>),
    Double(Vec<f64>),
    Complex(Vec<Complex64>),
}

impl SignalArray {
    pub fn len(&self) -> usize {
        match self {
            SignalArray::Int32(v) => v.len(),
            SignalArray::Double(v) => v.len(),
            SignalArray::Complex(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single named output column together with the metadata needed to
/// answer `signal_type`/`signal_units` queries: the registry id whose
/// `Type` carries its `units` property, and its scalar wire type.
#[derive(Debug, Clone)]
pub(crate) struct SampleColumn {
    pub name: String,
    pub type_id: u32,
    pub data_type: u32,
    pub data: SignalArray,
}

impl SampleColumn {
    fn empty(column: &FlatColumn) -> Result<Self> {
        let data = match column.data_type {
            type_id::INT8 | type_id::INT32 => SignalArray::Int32(Vec::new()),
            type_id::DOUBLE => SignalArray::Double(Vec::new()),
            type_id::COMPLEX_DOUBLE => SignalArray::Complex(Vec::new()),
            other => return Err(PsfError::UnsupportedDataType(other)),
        };
        Ok(Self {
            name: column.name.clone(),
            type_id: column.type_id,
            data_type: column.data_type,
            data,
        })
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    /// Decodes `count` consecutive samples from a raw byte block (already
    /// fully read via `read_exact`, so this never observes a short read)
    /// and appends them.
    fn append_from_bytes(&mut self, bytes: &[u8], count: usize) -> Result<()> {
        let mut src = Cursor::new(bytes);
        match &mut self.data {
            SignalArray::Int32(v) => {
                for _ in 0..count {
                    v.push(src.read_i32_be()?);
                }
            }
            SignalArray::Double(v) => {
                for _ in 0..count {
                    v.push(src.read_f64_be()?);
                }
            }
            SignalArray::Complex(v) => {
                for _ in 0..count {
                    let re = src.read_f64_be()?;
                    let im = src.read_f64_be()?;
                    v.push(Complex64 { re, im });
                }
            }
        }
        Ok(())
    }

    /// Reads and appends a single sample directly from the cursor
    /// (non-windowed path, one row at a time).
    fn append_one<R: Read + Seek>(&mut self, cursor: &mut R) -> Result<()> {
        match &mut self.data {
            SignalArray::Int32(v) => v.push(cursor.read_i32_be()?),
            SignalArray::Double(v) => v.push(cursor.read_f64_be()?),
            SignalArray::Complex(v) => {
                let re = cursor.read_f64_be()?;
                let im = cursor.read_f64_be()?;
                v.push(Complex64 { re, im });
            }
        }
        Ok(())
    }
}

/// The decoded value section: either a dense, swept set of arrays or a
/// flat name-to-scalar mapping when the file declares no sweep variable.
pub(crate) enum ValueData {
    Swept {
        sweep: SampleColumn,
        signals: Vec<SampleColumn>,
        read_points: usize,
        completed: bool,
    },
    NonSwept(Vec<SampleColumn>),
}

/// Reads a fully-framed byte block of `len` bytes, returning `None`
/// (rather than propagating the error) on any failure. Every caller in
/// this module treats a short read here as the normal end-of-stream
/// outcome the spec calls truncation.
fn try_read_exact<R: Read + Seek>(cursor: &mut R, len: usize) -> Option<Vec<u8>> {
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf).ok()?;
    Some(buf)
}

fn try_u32<R: Read + Seek>(cursor: &mut R) -> Option<u32> {
    cursor.read_u32_be().ok()
}

/// Windowed sweep-value decoder. Operates directly on the flattened leaf
/// column list: each column occupies its own padded run inside every
/// window, in flatten order.
pub(crate) fn read_windowed<R: Read + Seek>(
    cursor: &mut R,
    win_size: u32,
    npoints: usize,
    sweep_column: &FlatColumn,
    signal_columns: &[FlatColumn],
) -> Result<ValueData> {
    let mut sweep = SampleColumn::empty(sweep_column)?;
    let mut signals = signal_columns
        .iter()
        .map(SampleColumn::empty)
        .collect::<Result<Vec<_>>>()?;

    let sweep_sample_size =
        sample_size(sweep_column.data_type).ok_or(PsfError::UnsupportedDataType(sweep_column.data_type))?;
    let signal_sample_sizes = signal_columns
        .iter()
        .map(|c| sample_size(c.data_type).ok_or(PsfError::UnsupportedDataType(c.data_type)))
        .collect::<Result<Vec<_>>>()?;

    let mut read_points = 0usize;
    let mut completed = true;

    while read_points < npoints {
        let block_id = match try_u32(cursor) {
            Some(v) => v,
            None => {
                completed = false;
                break;
            }
        };

        match block_id {
            ELEMENT_DATA => {
                let count = match try_u32(cursor) {
                    Some(v) => v,
                    None => {
                        completed = false;
                        break;
                    }
                };
                let size = ((count & 0xFFFF) as usize).min(npoints - read_points);

                let sweep_bytes = match try_read_exact(cursor, size * sweep_sample_size) {
                    Some(b) => b,
                    None => {
                        completed = false;
                        break;
                    }
                };

                let skip = win_size as i64 - (sweep_sample_size * size) as i64;
                let mut signal_bytes = Vec::with_capacity(signals.len());
                let mut truncated = false;
                for sample_size_bytes in &signal_sample_sizes {
                    if cursor.seek_relative(skip).is_err() {
                        truncated = true;
                        break;
                    }
                    match try_read_exact(cursor, size * sample_size_bytes) {
                        Some(b) => signal_bytes.push(b),
                        None => {
                            truncated = true;
                            break;
                        }
                    }
                }
                if truncated {
                    completed = false;
                    break;
                }

                sweep.append_from_bytes(&sweep_bytes, size)?;
                for (signal, bytes) in signals.iter_mut().zip(signal_bytes.iter()) {
                    signal.append_from_bytes(bytes, size)?;
                }
                read_points += size;
            }
            ELEMENT_ZEROPAD => {
                let pad = match try_u32(cursor) {
                    Some(v) => v,
                    None => {
                        completed = false;
                        break;
                    }
                };
                if cursor.seek_relative(pad as i64).is_err() {
                    completed = false;
                    break;
                }
            }
            _ => {
                // Unrecognized block id: stop, keep the partial prefix.
                cursor.unread_u32().ok();
                completed = false;
                break;
            }
        }
    }

    debug_assert_eq!(sweep.len(), read_points);
    debug_assert!(signals.iter().all(|s| s.len() == read_points));

    Ok(ValueData::Swept {
        sweep,
        signals,
        read_points,
        completed,
    })
}

/// Non-windowed sweep-value decoder. Each row is `(DATA, sweep_id,
/// sweep_sample)` followed by one `(tag, trace_id, ...samples...)` frame
/// per declared trace, where `tag` is `DATA` for a scalar/struct
/// `Variable` and `GROUP` for a `Group`; the samples for a frame are its
/// flattened leaf columns read contiguously, with no further per-member
/// framing.
pub(crate) fn read_non_windowed<R: Read + Seek>(
    cursor: &mut R,
    npoints: usize,
    sweep_var_id: u32,
    sweep_column: &FlatColumn,
    traces: &[Trace],
    registry: &TypeRegistry,
) -> Result<ValueData> {
    let mut sweep = SampleColumn::empty(sweep_column)?;

    let mut trace_frames: Vec<(u32, u32, Vec<SampleColumn>)> = Vec::with_capacity(traces.len());
    for trace in traces {
        let (tag, id) = match trace {
            Trace::Variable(v) => (ELEMENT_DATA, v.id),
            Trace::Group(g) => (ELEMENT_GROUP, g.id),
        };
        let columns = trace
            .flatten(registry)?
            .iter()
            .map(SampleColumn::empty)
            .collect::<Result<Vec<_>>>()?;
        trace_frames.push((tag, id, columns));
    }

    let mut read_points = 0usize;
    let mut completed = true;

    'rows: while read_points < npoints {
        let element_id = match try_u32(cursor) {
            Some(v) => v,
            None => {
                completed = false;
                break;
            }
        };
        if element_id != ELEMENT_DATA {
            completed = false;
            break;
        }
        let announced_id = match try_u32(cursor) {
            Some(v) => v,
            None => {
                completed = false;
                break;
            }
        };
        if announced_id != sweep_var_id {
            completed = false;
            break;
        }
        match sweep.append_one(cursor) {
            Ok(()) => {}
            Err(_) => {
                completed = false;
                break;
            }
        }

        for (tag, id, columns) in trace_frames.iter_mut() {
            let frame_tag = match try_u32(cursor) {
                Some(v) => v,
                None => {
                    completed = false;
                    break 'rows;
                }
            };
            if frame_tag != *tag {
                completed = false;
                break 'rows;
            }
            let frame_id = match try_u32(cursor) {
                Some(v) => v,
                None => {
                    completed = false;
                    break 'rows;
                }
            };
            if frame_id != *id {
                completed = false;
                break 'rows;
            }
            for column in columns.iter_mut() {
                if column.append_one(cursor).is_err() {
                    completed = false;
                    break 'rows;
                }
            }
        }

        read_points += 1;
    }

    let signals = trace_frames
        .into_iter()
        .flat_map(|(_, _, columns)| columns.into_iter())
        .collect();

    Ok(ValueData::Swept {
        sweep,
        signals,
        read_points,
        completed,
    })
}

/// Reads `(code=16, var_id, name, type_id, scalar, property dict)`
/// tuples for a file with no sweep variable, producing one
/// single-sample column per entry.
pub(crate) fn read_non_swept<R: Read + Seek>(
    cursor: &mut R,
    end_offset: u64,
    registry: &TypeRegistry,
) -> Result<ValueData> {
    let mut entries = Vec::new();

    while cursor.tell()? < end_offset {
        let code = cursor.read_u32_be()?;
        if code != NON_SWEPT_ENTRY_CODE {
            cursor.unread_u32()?;
            break;
        }
        let _var_id = cursor.read_u32_be()?;
        let name = cursor.read_psf_string()?;
        let psf_type_id = cursor.read_u32_be()?;
        let data_type = registry.resolve(psf_type_id)?.data_type;

        let column = FlatColumn {
            name,
            type_id: psf_type_id,
            data_type,
        };
        let mut sample = SampleColumn::empty(&column)?;
        sample.append_one(cursor)?;

        let _properties: PropertyDict = crate::property::read_dictionary(cursor)?;
        entries.push(sample);
    }

    Ok(ValueData::NonSwept(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::Variable;
    use crate::types::TypeRegistry;
    use std::io::Cursor;

    fn double_column(name: &str) -> FlatColumn {
        FlatColumn {
            name: name.to_string(),
            type_id: 1,
            data_type: type_id::DOUBLE,
        }
    }

    fn complex_column(name: &str) -> FlatColumn {
        FlatColumn {
            name: name.to_string(),
            type_id: 2,
            data_type: type_id::COMPLEX_DOUBLE,
        }
    }

    #[test]
    fn windowed_decode_reads_full_block_and_truncates_on_unknown_tag() {
        let win_size = 32u32;
        let sweep_col = double_column("time");
        let signal_col = complex_column("x");

        let mut bytes = vec![];
        bytes.extend_from_slice(&ELEMENT_DATA.to_be_bytes());
        let count = 2u32;
        bytes.extend_from_slice(&count.to_be_bytes());
        // sweep: 2 doubles
        bytes.extend_from_slice(&1.0f64.to_be_bytes());
        bytes.extend_from_slice(&2.0f64.to_be_bytes());
        // skip = win_size - 8*2 = 16 bytes, then 2 complex samples (32 bytes)
        bytes.extend(std::iter::repeat(0u8).take(16));
        bytes.extend_from_slice(&10.0f64.to_be_bytes());
        bytes.extend_from_slice(&11.0f64.to_be_bytes());
        bytes.extend_from_slice(&20.0f64.to_be_bytes());
        bytes.extend_from_slice(&21.0f64.to_be_bytes());
        // unexpected tag, should stop here
        bytes.extend_from_slice(&0x99u32.to_be_bytes());

        let mut cursor = Cursor::new(bytes);
        let result = read_windowed(&mut cursor, win_size, 5, &sweep_col, &[signal_col]).unwrap();

        match result {
            ValueData::Swept {
                sweep,
                signals,
                read_points,
                completed,
            } => {
                assert_eq!(read_points, 2);
                assert!(!completed);
                assert_eq!(sweep.data, SignalArray::Double(vec![1.0, 2.0]));
                assert_eq!(
                    signals[0].data,
                    SignalArray::Complex(vec![
                        Complex64 { re: 10.0, im: 11.0 },
                        Complex64 { re: 20.0, im: 21.0 }
                    ])
                );
            }
            _ => panic!("expected swept result"),
        }
    }

    #[test]
    fn windowed_decode_truncates_on_early_eof() {
        let win_size = 16u32;
        let sweep_col = double_column("time");

        let mut bytes = vec![];
        bytes.extend_from_slice(&ELEMENT_DATA.to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&1.0f64.to_be_bytes());
        // file ends here, before declared npoints reached

        let mut cursor = Cursor::new(bytes);
        let result = read_windowed(&mut cursor, win_size, 10, &sweep_col, &[]).unwrap();
        match result {
            ValueData::Swept {
                read_points,
                completed,
                sweep,
                ..
            } => {
                assert_eq!(read_points, 1);
                assert!(!completed);
                assert_eq!(sweep.len(), 1);
            }
            _ => panic!("expected swept result"),
        }
    }

    #[test]
    fn windowed_decode_skips_zeropad_blocks() {
        let win_size = 8u32;
        let sweep_col = double_column("time");

        let mut bytes = vec![];
        bytes.extend_from_slice(&ELEMENT_ZEROPAD.to_be_bytes());
        bytes.extend_from_slice(&16u32.to_be_bytes());
        bytes.extend(std::iter::repeat(0xAAu8).take(16));

        bytes.extend_from_slice(&ELEMENT_DATA.to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&42.0f64.to_be_bytes());

        let mut cursor = Cursor::new(bytes);
        let result = read_windowed(&mut cursor, win_size, 1, &sweep_col, &[]).unwrap();
        match result {
            ValueData::Swept {
                read_points,
                completed,
                sweep,
                ..
            } => {
                assert_eq!(read_points, 1);
                assert!(completed);
                assert_eq!(sweep.data, SignalArray::Double(vec![42.0]));
            }
            _ => panic!("expected swept result"),
        }
    }

    #[test]
    fn non_windowed_decode_reads_interleaved_rows() {
        let sweep_col = double_column("time");
        let var = Variable {
            id: 5,
            name: "vout".into(),
            type_id: 1,
            properties: PropertyDict::new(),
        };
        let registry = {
            let mut bytes = vec![];
            bytes.extend_from_slice(&ELEMENT_DATA.to_be_bytes());
            bytes.extend_from_slice(&1u32.to_be_bytes());
            bytes.extend_from_slice(&4u32.to_be_bytes());
            bytes.extend_from_slice(b"type");
            bytes.extend_from_slice(&0u32.to_be_bytes());
            bytes.extend_from_slice(&type_id::DOUBLE.to_be_bytes());
            bytes.extend_from_slice(&0u32.to_be_bytes());
            let end = bytes.len() as u64;
            let mut cursor = Cursor::new(bytes);
            let mut registry = TypeRegistry::new();
            registry.parse_all(&mut cursor, end).unwrap();
            registry
        };
        let traces = vec![Trace::Variable(var)];

        let mut bytes = vec![];
        for (t, v) in [(0.0f64, 1.0f64), (1.0, 2.0)] {
            bytes.extend_from_slice(&ELEMENT_DATA.to_be_bytes());
            bytes.extend_from_slice(&0u32.to_be_bytes()); // sweep_var_id
            bytes.extend_from_slice(&t.to_be_bytes());

            bytes.extend_from_slice(&ELEMENT_DATA.to_be_bytes());
            bytes.extend_from_slice(&5u32.to_be_bytes());
            bytes.extend_from_slice(&v.to_be_bytes());
        }

        let mut cursor = Cursor::new(bytes);
        let result =
            read_non_windowed(&mut cursor, 2, 0, &sweep_col, &traces, &registry).unwrap();
        match result {
            ValueData::Swept {
                sweep,
                signals,
                read_points,
                completed,
            } => {
                assert_eq!(read_points, 2);
                assert!(completed);
                assert_eq!(sweep.data, SignalArray::Double(vec![0.0, 1.0]));
                assert_eq!(signals[0].data, SignalArray::Double(vec![1.0, 2.0]));
            }
            _ => panic!("expected swept result"),
        }
    }

    #[test]
    fn non_swept_reader_builds_name_to_scalar_map() {
        let registry = {
            let mut bytes = vec![];
            bytes.extend_from_slice(&ELEMENT_DATA.to_be_bytes());
            bytes.extend_from_slice(&9u32.to_be_bytes());
            bytes.extend_from_slice(&4u32.to_be_bytes());
            bytes.extend_from_slice(b"type");
            bytes.extend_from_slice(&0u32.to_be_bytes());
            bytes.extend_from_slice(&type_id::DOUBLE.to_be_bytes());
            bytes.extend_from_slice(&0u32.to_be_bytes());
            let end = bytes.len() as u64;
            let mut cursor = Cursor::new(bytes);
            let mut registry = TypeRegistry::new();
            registry.parse_all(&mut cursor, end).unwrap();
            registry
        };

        let mut bytes = vec![];
        bytes.extend_from_slice(&16u32.to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes()); // var_id
        bytes.extend_from_slice(&4u32.to_be_bytes());
        bytes.extend_from_slice(b"gain");
        bytes.extend_from_slice(&9u32.to_be_bytes()); // psf_type_id
        bytes.extend_from_slice(&3.5f64.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes()); // empty property dict
        let end = bytes.len() as u64;
        bytes.extend_from_slice(&0xFFu32.to_be_bytes());

        let mut cursor = Cursor::new(bytes);
        let result = read_non_swept(&mut cursor, end, &registry).unwrap();
        match result {
            ValueData::NonSwept(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].name, "gain");
                assert_eq!(entries[0].data, SignalArray::Double(vec![3.5]));
            }
            _ => panic!("expected non-swept result"),
        }
    }
}
