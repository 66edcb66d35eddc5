//! A small DER codec driven by *walk programs*: compact instruction
//! sequences that steer a packer/unpacker through one specific ASN.1
//! structure. Parsing stores non-owning [`Cursor`] views of the input
//! buffer instead of building a tree; packing reassembles the same bytes
//! from a cursor array. This keeps the codec allocation-free and lets
//! callers hold on to parsed fields for exactly as long as the backing
//! buffer lives.

pub mod cursor;
pub mod parse;
pub mod walk;
pub mod write;

pub use cursor::Cursor;
pub use parse::{parse_header, parse_length, parse_tag, parse_uint};
pub use walk::{field_count, pack_len, pack_tail, unpack, Walk, WalkError};
pub use write::{header_len, pack_int32, put_header};
