/// Represents all possible errors that can occur while reading a PSF file.
///
/// This enum is used throughout the crate to provide detailed error
/// information for operations that may fail, such as section dispatch,
/// type resolution, and value decoding.
#[derive(Debug)]
pub enum PsfError {
    /// The file has neither a `Clarissa` footer nor a recognizable
    /// streaming section at offset 4.
    NotPsf,
    /// A chunk preamble carried a tag other than the one expected.
    BadChunkTag { expected: u32, found: u32 },
    /// A `Variable` referenced a `type_id` absent from the type registry.
    UnknownType(u32),
    /// A `Group` declared a member count the trace stream could not
    /// supply in full.
    MalformedGroup { declared: u32, parsed: u32 },
    /// More than one sweep variable was declared; this reader supports
    /// exactly one.
    UnsupportedMultipleSweeps,
    /// Value decoding was requested for a type outside
    /// `{INT8, INT32, DOUBLE, COMPLEX_DOUBLE}`.
    UnsupportedDataType(u32),
    /// A primitive read ran past the end of the buffer. Recoverable during
    /// value decoding; fatal everywhere else.
    Truncated,
    /// Any other I/O failure surfaced by the underlying cursor.
    Io(std::io::Error),
}

/// Provides a user-friendly string representation for each error variant.
impl std::fmt::Display for PsfError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PsfError::NotPsf => write!(
                f,
                "not a PSF file: missing footer and no recognizable streaming section"
            ),
            PsfError::BadChunkTag { expected, found } => write!(
                f,
                "unexpected chunk tag: expected {expected:#x}, found {found:#x}"
            ),
            PsfError::UnknownType(id) => write!(f, "unknown type id: {id}"),
            PsfError::MalformedGroup { declared, parsed } => write!(
                f,
                "group declared {declared} members but only {parsed} parsed"
            ),
            PsfError::UnsupportedMultipleSweeps => {
                write!(f, "unsupported file format: more than one sweep variable")
            }
            PsfError::UnsupportedDataType(id) => write!(f, "unsupported data type id: {id}"),
            PsfError::Truncated => write!(f, "read past end of file"),
            PsfError::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

/// Implements the standard error trait for `PsfError`, allowing it to be
/// used with error chaining and other error handling utilities.
impl std::error::Error for PsfError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PsfError::Io(err) => Some(err),
            _ => None,
        }
    }
}

/// Allows automatic conversion from `std::io::Error` to `PsfError`.
///
/// An unexpected-EOF read is the one I/O failure the value decoder treats
/// as a normal outcome, so it collapses straight to `Truncated` here
/// instead of being wrapped.
impl From<std::io::Error> for PsfError {
    fn from(error: std::io::Error) -> Self {
        if error.kind() == std::io::ErrorKind::UnexpectedEof {
            PsfError::Truncated
        } else {
            PsfError::Io(error)
        }
    }
}

pub type Result<T> = std::result::Result<T, PsfError>;
