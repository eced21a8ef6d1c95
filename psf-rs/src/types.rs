use std::collections::HashMap;
use std::io::{Read, Seek};

use crate::error::{PsfError, Result};
use crate::ext::cursor_ext::PsfCursorExt;
use crate::property::{self, PropertyDict};

/// Wire-value discriminants for PSF's compact type system. INT8 is
/// encoded as a 32-bit integer on the wire despite its name.
pub mod type_id {
    pub const INT8: u32 = 0x01;
    pub const STRING: u32 = 0x02;
    pub const ARRAY: u32 = 0x03;
    pub const INT32: u32 = 0x05;
    pub const DOUBLE: u32 = 0x0b;
    pub const COMPLEX_DOUBLE: u32 = 0x0c;
    pub const STRUCT: u32 = 0x10;
    pub const TUPLE: u32 = 0x12;
}

const ELEMENT_DATA: u32 = 0x10;

/// Returns the per-sample byte size of a scalar type in the value stream,
/// or `None` for a type the value decoder cannot materialize.
pub(crate) fn sample_size(data_type: u32) -> Option<usize> {
    match data_type {
        type_id::INT8 => Some(4),
        type_id::INT32 => Some(4),
        type_id::DOUBLE => Some(8),
        type_id::COMPLEX_DOUBLE => Some(16),
        _ => None,
    }
}

/// A parsed `PSF_Type` record. `members` is populated only when
/// `data_type == STRUCT`; each member is itself a fully-formed `Type`
/// and was registered in the global type map during its own parse.
#[derive(Debug, Clone)]
pub struct Type {
    pub id: u32,
    pub name: String,
    pub array_kind: u32,
    pub data_type: u32,
    pub members: Vec<Type>,
    pub properties: PropertyDict,
}

impl Type {
    pub fn is_struct(&self) -> bool {
        self.data_type == type_id::STRUCT
    }
}

/// Stores every `Type` parsed from the Type section by numeric id,
/// including struct members, which are flattened into the same map as
/// their parent so a `Variable` can reference either directly.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<u32, Type>,
}

impl TypeRegistry {
    pub(crate) fn new() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    pub fn get(&self, id: u32) -> Option<&Type> {
        self.types.get(&id)
    }

    pub(crate) fn resolve(&self, id: u32) -> Result<&Type> {
        self.get(id).ok_or(PsfError::UnknownType(id))
    }

    /// Parses every Type record in the Type minor section, up to
    /// `end_offset`. Stops as soon as a non-`DATA` tag is encountered,
    /// pushing it back for the caller.
    pub(crate) fn parse_all<R: Read + Seek>(&mut self, cursor: &mut R, end_offset: u64) -> Result<()> {
        while cursor.tell()? < end_offset {
            match self.read_one(cursor)? {
                Some(_) => continue,
                None => break,
            }
        }
        Ok(())
    }

    /// Reads a single Type record (top-level or nested struct member),
    /// registering it and any struct members by id as it goes.
    fn read_one<R: Read + Seek>(&mut self, cursor: &mut R) -> Result<Option<Type>> {
        let tag = cursor.read_u32_be()?;
        if tag != ELEMENT_DATA {
            cursor.unread_u32()?;
            return Ok(None);
        }

        let id = cursor.read_u32_be()?;
        let name = cursor.read_psf_string()?;
        let array_kind = cursor.read_u32_be()?;
        let data_type = cursor.read_u32_be()?;

        let mut members = Vec::new();
        if data_type == type_id::STRUCT {
            loop {
                let marker = cursor.read_u32_be()?;
                if marker != type_id::TUPLE {
                    cursor.unread_u32()?;
                    break;
                }
                match self.read_one(cursor)? {
                    Some(member) => members.push(member),
                    None => break,
                }
            }
        }

        let properties = property::read_dictionary(cursor)?;

        let parsed = Type {
            id,
            name,
            array_kind,
            data_type,
            members,
            properties,
        };
        self.types.insert(id, parsed.clone());
        Ok(Some(parsed))
    }
}
