use std::io::Cursor;
use std::path::Path;

use crate::error::{PsfError, Result};
use crate::ext::cursor_ext::PsfCursorExt;
use crate::property::{self, PropertyDict};
use crate::section::{self, SectionId, SectionTable};
use crate::trace::{self, FlatColumn, Trace, Variable};
use crate::types::TypeRegistry;
use crate::value::{self, SignalArray, ValueData};

const WINDOW_SIZE_PROPERTY: &str = "PSF window size";
const SWEEP_POINTS_PROPERTY: &str = "PSF sweep points";
const UNITS_PROPERTY: &str = "units";

/// A parsed PSF file: resolved types, trace declarations, and the
/// decoded value stream, queryable by signal name.
pub struct PsfReader {
    registry: TypeRegistry,
    sweep_variable: Option<Variable>,
    sweep_column: Option<FlatColumn>,
    columns: Vec<FlatColumn>,
    data: ValueData,
    has_footer: bool,
    declared_sweep_points: usize,
}

impl PsfReader {
    /// Reads the whole file into memory and parses it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(bytes)
    }

    /// Parses an already-loaded PSF byte buffer. The entry point used by
    /// tests, and by callers that already hold the file in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let table = SectionTable::probe(&mut cursor)?;

        // The Header section carries the file-global property dictionary
        // (`"PSF sweep points"`, `"PSF window size"`, `"PSF sweeps"`,
        // ...), read once up front. Unlike Type/Trace/Value it has no
        // nested MINOR_SECTION: the property dictionary starts right
        // after the MAJOR_SECTION preamble. `PSF sweep points` and
        // `PSF window size` are the two entries this reader acts on; the
        // rest are parsed (so the dictionary terminates correctly on the
        // next section's leading tag) and then dropped.
        let header_properties = if let Some(info) = table.sections.get(&SectionId::Header) {
            section::enter_section(&mut cursor, info)?;
            property::read_dictionary(&mut cursor)?
        } else {
            PropertyDict::new()
        };

        let mut registry = TypeRegistry::new();
        if let Some(info) = table.sections.get(&SectionId::Type) {
            let end = section::enter_section(&mut cursor, info)?;
            registry.parse_all(&mut cursor, end)?;
        }

        let sweep_variables = if let Some(info) = table.sections.get(&SectionId::Sweep) {
            let end = section::enter_section(&mut cursor, info)?;
            let mut vars = Vec::new();
            while cursor.tell()? < end {
                match trace::read_sweep_variable(&mut cursor)? {
                    Some(var) => vars.push(var),
                    None => break,
                }
            }
            vars
        } else {
            Vec::new()
        };

        let traces = if let Some(info) = table.sections.get(&SectionId::Trace) {
            let _major_end = section::enter_section(&mut cursor, info)?;
            let minor_end = section::read_chunk_preamble(&mut cursor, section::CHUNK_MINOR_SECTION)?;
            trace::read_all(&mut cursor, minor_end)?
        } else {
            Vec::new()
        };

        let mut columns = Vec::new();
        for t in &traces {
            columns.extend(t.flatten(&registry)?);
        }

        // A multi-sweep file is only rejected once the value phase is
        // reached, after trace parsing has already run (spec.md scenario
        // 6): a file with no Value section never fails this check at all.
        let sweep_variable = sweep_variables.first().cloned();
        let sweep_column = match &sweep_variable {
            Some(var) => Some(var.flatten(&registry)?.into_iter().next().ok_or(PsfError::UnknownType(var.type_id))?),
            None => None,
        };

        let declared_sweep_points = header_properties
            .get(SWEEP_POINTS_PROPERTY)
            .and_then(|p| p.value.as_i32())
            .unwrap_or(0)
            .max(0) as usize;
        let win_size = header_properties
            .get(WINDOW_SIZE_PROPERTY)
            .and_then(|p| p.value.as_i32())
            .unwrap_or(0);

        let data = if let Some(info) = table.sections.get(&SectionId::Value) {
            let _major_end = section::enter_section(&mut cursor, info)?;
            let minor_end = section::read_chunk_preamble(&mut cursor, section::CHUNK_MINOR_SECTION)?;

            match (&sweep_variable, &sweep_column) {
                (None, _) => value::read_non_swept(&mut cursor, minor_end, &registry)?,
                (Some(_), _) if sweep_variables.len() > 1 => {
                    return Err(PsfError::UnsupportedMultipleSweeps)
                }
                (Some(sweep_var), Some(sweep_col)) => {
                    if win_size > 0 {
                        value::read_windowed(&mut cursor, win_size as u32, declared_sweep_points, sweep_col, &columns)?
                    } else {
                        value::read_non_windowed(
                            &mut cursor,
                            declared_sweep_points,
                            sweep_var.id,
                            sweep_col,
                            &traces,
                            &registry,
                        )?
                    }
                }
                (Some(_), None) => value::read_non_swept(&mut cursor, minor_end, &registry)?,
            }
        } else {
            ValueData::NonSwept(Vec::new())
        };

        Ok(PsfReader {
            registry,
            sweep_variable,
            sweep_column,
            columns,
            data,
            has_footer: table.has_footer,
            declared_sweep_points,
        })
    }

    /// True when exactly one sweep variable was declared.
    pub fn is_swept(&self) -> bool {
        self.sweep_variable.is_some()
    }

    /// Flattened output column names, in declaration order. Does not
    /// include the sweep axis itself.
    pub fn signal_names(&self) -> Vec<&str> {
        match &self.data {
            ValueData::Swept { signals, .. } => signals.iter().map(|c| c.name.as_str()).collect(),
            ValueData::NonSwept(entries) => entries.iter().map(|c| c.name.as_str()).collect(),
        }
    }

    /// The leaf wire type id for a signal, searching the sweep variable
    /// first and then the traced columns.
    pub fn signal_type(&self, name: &str) -> Option<u32> {
        if let Some(col) = &self.sweep_column {
            if col.name == name {
                return Some(col.data_type);
            }
        }
        self.find_column(name).map(|c| c.data_type)
    }

    /// The `"units"` property for a signal: read off the sweep variable
    /// itself for the sweep axis, or off the trace column's own type for
    /// everything else.
    pub fn signal_units(&self, name: &str) -> Option<String> {
        if let Some(var) = &self.sweep_variable {
            if self
                .sweep_column
                .as_ref()
                .map(|c| c.name == name)
                .unwrap_or(false)
            {
                return property_units(&var.properties);
            }
        }
        let column = self.find_column(name)?;
        let ty = self.registry.get(column.type_id)?;
        property_units(&ty.properties)
    }

    /// A borrowed view of the dense array for a signal.
    pub fn signal(&self, name: &str) -> Option<&SignalArray> {
        match &self.data {
            ValueData::Swept { signals, .. } => {
                signals.iter().find(|c| c.name == name).map(|c| &c.data)
            }
            ValueData::NonSwept(entries) => {
                entries.iter().find(|c| c.name == name).map(|c| &c.data)
            }
        }
    }

    /// The sweep axis vector.
    pub fn sweep_values(&self) -> Option<&SignalArray> {
        match &self.data {
            ValueData::Swept { sweep, .. } => Some(&sweep.data),
            ValueData::NonSwept(_) => None,
        }
    }

    /// The single sweep variable's name.
    pub fn sweep_param_name(&self) -> Option<&str> {
        self.sweep_variable.as_ref().map(|v| v.name.as_str())
    }

    /// The declared point count from property `"PSF sweep points"`.
    pub fn sweep_npoints(&self) -> usize {
        self.declared_sweep_points
    }

    /// The number of samples actually decoded.
    pub fn read_npoints(&self) -> usize {
        match &self.data {
            ValueData::Swept { read_points, .. } => *read_points,
            ValueData::NonSwept(_) => 0,
        }
    }

    /// True iff the footer was present and the value stream ran to
    /// declared length without early termination.
    pub fn is_wellformed(&self) -> bool {
        match &self.data {
            ValueData::Swept {
                completed,
                read_points,
                ..
            } => self.has_footer && *completed && *read_points == self.declared_sweep_points,
            ValueData::NonSwept(_) => self.has_footer,
        }
    }

    fn find_column(&self, name: &str) -> Option<&FlatColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

fn property_units(properties: &PropertyDict) -> Option<String> {
    properties
        .get(UNITS_PROPERTY)
        .and_then(|p| p.value.as_str())
        .map(|s| s.to_string())
}
