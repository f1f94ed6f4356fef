//! The DMAP tagged binary format: a 4-byte code, a 4-byte big-endian
//! length, then that many value bytes, nested recursively for
//! containers. This crate owns the static code table and the
//! encode/decode routines; it knows nothing about DAAP's library model
//! or HTTP surface.

pub mod codes;
pub mod error;
pub mod object;
pub mod types;

pub use codes::{lookup_code, lookup_name, CodeEntry, CODE_TABLE};
pub use error::{Error, Result};
pub use object::DaapObject;
pub use types::{int_from_code, DataType, DaapValue};
