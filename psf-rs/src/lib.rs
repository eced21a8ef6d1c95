//! # psf-rs
//!
//! `psf-rs` is a pure Rust reader for the Parameter Storage Format (PSF), a
//! proprietary big-endian binary container used by circuit simulators to
//! record swept signal data (transient, AC, DC sweeps).
//!
//! ## Features
//! - Parse PSF's chunked section layout, with or without the trailing
//!   `Clarissa` table of contents
//! - Resolve the compact type system, including struct flattening into
//!   multiple named output columns
//! - Decode both on-disk value encodings (windowed and non-windowed)
//!   into dense, typed arrays
//! - Tolerate truncated files: a partial read still returns its decoded
//!   prefix, with `is_wellformed()` reporting whether the stream ran to
//!   completion
//!
//! ## PsfReader
//! The main entry point is [`PsfReader`](crate::reader::PsfReader). Open
//! a file with `PsfReader::open`, or parse an in-memory buffer with
//! `PsfReader::from_bytes`, then query it by signal name.
//!
//! ## Error Handling
//! All fallible operations return a [`PsfError`](crate::error::PsfError),
//! describing structural corruption, unresolvable types, or unsupported
//! file shapes. A short read during value decoding is not an error: it
//! is surfaced as `is_wellformed() == false` on an otherwise-usable
//! reader.
//!
//! ## Usage
//! Add to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! psf-rs = "0.1"
//! ```
//!
//! ### Example: reading a swept signal
//! ```rust,no_run
//! use psf_rs::PsfReader;
//!
//! let reader = PsfReader::open("transient.psf").unwrap();
//! println!("sweep: {}", reader.sweep_param_name().unwrap_or("?"));
//! for name in reader.signal_names() {
//!     println!("{name}: {:?}", reader.signal(name).unwrap());
//! }
//! ```

mod error;
mod ext;
mod property;
mod reader;
mod section;
mod trace;
mod types;
mod value;

pub use error::{PsfError, Result};
pub use property::{Property, PropertyDict, PropertyValue};
pub use reader::PsfReader;
pub use trace::{Group, Trace, Variable};
pub use types::{type_id, Type, TypeRegistry};
pub use value::{Complex64, SignalArray};
