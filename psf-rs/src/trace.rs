use std::io::{Read, Seek};

use crate::error::{PsfError, Result};
use crate::ext::cursor_ext::PsfCursorExt;
use crate::property::{self, PropertyDict};
use crate::types::TypeRegistry;

const ELEMENT_DATA: u32 = 0x10;
const ELEMENT_GROUP: u32 = 0x11;

/// A leaf trace entry: a declared output column backed by a resolvable
/// type id.
#[derive(Debug, Clone)]
pub struct Variable {
    pub id: u32,
    pub name: String,
    pub type_id: u32,
    pub properties: PropertyDict,
}

impl Variable {
    /// Reads a single `Variable` entry, or pushes the tag back and
    /// returns `None` if this isn't one.
    fn read<R: Read + Seek>(cursor: &mut R) -> Result<Option<Self>> {
        let tag = cursor.read_u32_be()?;
        if tag != ELEMENT_DATA {
            cursor.unread_u32()?;
            return Ok(None);
        }

        let id = cursor.read_u32_be()?;
        let name = cursor.read_psf_string()?;
        let type_id = cursor.read_u32_be()?;
        let properties = property::read_dictionary(cursor)?;

        Ok(Some(Variable {
            id,
            name,
            type_id,
            properties,
        }))
    }

    /// Expands this variable into its leaf output columns: one column per
    /// struct member if its type is a struct, otherwise a single column
    /// named after the variable itself.
    pub(crate) fn flatten(&self, registry: &TypeRegistry) -> Result<Vec<FlatColumn>> {
        let ty = registry.resolve(self.type_id)?;
        if ty.is_struct() {
            Ok(ty
                .members
                .iter()
                .map(|member| FlatColumn {
                    name: member.name.clone(),
                    type_id: member.id,
                    data_type: member.data_type,
                })
                .collect())
        } else {
            Ok(vec![FlatColumn {
                name: self.name.clone(),
                type_id: ty.id,
                data_type: ty.data_type,
            }])
        }
    }
}

/// A composite trace entry: a fixed-length, declared list of member
/// variables.
#[derive(Debug, Clone)]
pub struct Group {
    pub id: u32,
    pub name: String,
    pub members: Vec<Variable>,
}

impl Group {
    /// Reads a single `Group` entry, or pushes the tag back and returns
    /// `None` if this isn't one. A short member list is structural
    /// corruption, not truncation, and fails fatally.
    fn read<R: Read + Seek>(cursor: &mut R) -> Result<Option<Self>> {
        let tag = cursor.read_u32_be()?;
        if tag != ELEMENT_GROUP {
            cursor.unread_u32()?;
            return Ok(None);
        }

        let id = cursor.read_u32_be()?;
        let name = cursor.read_psf_string()?;
        let declared_len = cursor.read_u32_be()?;

        let mut members = Vec::with_capacity(declared_len as usize);
        for parsed in 0..declared_len {
            match Variable::read(cursor)? {
                Some(var) => members.push(var),
                None => {
                    return Err(PsfError::MalformedGroup {
                        declared: declared_len,
                        parsed,
                    })
                }
            }
        }

        Ok(Some(Group { id, name, members }))
    }

    pub(crate) fn flatten(&self, registry: &TypeRegistry) -> Result<Vec<FlatColumn>> {
        let mut columns = Vec::new();
        for member in &self.members {
            columns.extend(member.flatten(registry)?);
        }
        Ok(columns)
    }
}

/// A declared output column: scalar `Variable` or composite `Group`.
#[derive(Debug, Clone)]
pub enum Trace {
    Variable(Variable),
    Group(Group),
}

impl Trace {
    pub(crate) fn flatten(&self, registry: &TypeRegistry) -> Result<Vec<FlatColumn>> {
        match self {
            Trace::Variable(v) => v.flatten(registry),
            Trace::Group(g) => g.flatten(registry),
        }
    }
}

/// A single leaf output column resolved from the trace list: its output
/// name, the type id that carries its `units` property (a struct
/// member's own id, or the scalar variable's type id), and its scalar
/// wire data type.
#[derive(Debug, Clone)]
pub(crate) struct FlatColumn {
    pub name: String,
    pub type_id: u32,
    pub data_type: u32,
}

/// Reads alternating `Group` and `Variable` records until neither parses
/// or the subsection end is reached.
pub(crate) fn read_all<R: Read + Seek>(cursor: &mut R, end_offset: u64) -> Result<Vec<Trace>> {
    let mut traces = Vec::new();

    loop {
        if cursor.tell()? >= end_offset {
            break;
        }
        if let Some(group) = Group::read(cursor)? {
            traces.push(Trace::Group(group));
            continue;
        }
        if let Some(var) = Variable::read(cursor)? {
            traces.push(Trace::Variable(var));
            continue;
        }
        break;
    }

    Ok(traces)
}

/// Reads a single leaf `Variable` record for the sweep section, which
/// uses the same shape as a trace `Variable`.
pub(crate) fn read_sweep_variable<R: Read + Seek>(cursor: &mut R) -> Result<Option<Variable>> {
    Variable::read(cursor)
}
