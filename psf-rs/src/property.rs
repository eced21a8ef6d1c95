use std::collections::HashMap;
use std::io::{Read, Seek};

use crate::error::Result;
use crate::ext::cursor_ext::PsfCursorExt;

const PROPERTY_STRING: u32 = 0x21;
const PROPERTY_INT: u32 = 0x22;
const PROPERTY_DOUBLE: u32 = 0x23;

/// A typed property value. PSF properties are few and small, so a plain
/// tagged enum is all the representation this needs.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Str(String),
    Int(i32),
    Double(f64),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Double(v) => Some(*v),
            _ => None,
        }
    }
}

/// A single `(name, value)` entry read from a property dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
}

pub type PropertyDict = HashMap<String, Property>;

/// Reads successive `(tag, name, value)` triples until a tag outside the
/// property range is encountered, then pushes that tag back and returns.
///
/// An empty dictionary (the very first tag read is the terminator) is a
/// valid and common result.
pub(crate) fn read_dictionary<R: Read + Seek>(cursor: &mut R) -> Result<PropertyDict> {
    let mut dict = PropertyDict::new();

    loop {
        let tag = cursor.read_u32_be()?;
        let property = match tag {
            PROPERTY_STRING => {
                let name = cursor.read_psf_string()?;
                let value = PropertyValue::Str(cursor.read_psf_string()?);
                Property { name, value }
            }
            PROPERTY_INT => {
                let name = cursor.read_psf_string()?;
                let value = PropertyValue::Int(cursor.read_i32_be()?);
                Property { name, value }
            }
            PROPERTY_DOUBLE => {
                let name = cursor.read_psf_string()?;
                let value = PropertyValue::Double(cursor.read_f64_be()?);
                Property { name, value }
            }
            _ => {
                cursor.unread_u32()?;
                break;
            }
        };
        // Later duplicates overwrite earlier ones.
        dict.insert(property.name.clone(), property);
    }

    Ok(dict)
}
