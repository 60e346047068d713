//! # marshal-buffer
//!
//! Type-driven binary codec for composite values.
//!
//! This crate provides:
//! - Little-endian primitive encoding for a closed set of scalar kinds
//! - An append-only resolver registry for fixed-width and managed
//!   (variable-length) custom types
//! - Buffer schemas, bounds-checked readers and writers
//! - The managed two-segment wire format (length header, then body)
//! - A [`Codec`] facade with slice and async stream entry points
//!
//! ```
//! use marshal_buffer::{decode_managed, encode_managed};
//!
//! let bytes = encode_managed(&(42i32, "hello".to_string())).unwrap();
//! assert_eq!(bytes.len(), 4 + 4 + 5);
//!
//! let (value, _) = decode_managed::<(i32, String)>(&bytes).unwrap();
//! assert_eq!(value.1, "hello");
//! ```

pub mod codec;
pub mod error;
pub mod identity;
pub mod managed;
pub mod primitive;
pub mod reader;
pub mod registry;
pub mod resolvers;
pub mod schema;
pub mod shape;
pub mod stream;
pub mod writer;

pub use codec::{
    decode, decode_managed, decode_value, encode, encode_managed, encode_value, read,
    read_managed, write, write_managed, Codec, DEFAULT_MAX_MANAGED_LENGTH,
};
pub use error::BufferError;
pub use identity::TypeIdentity;
pub use managed::{ManagedMessage, ManagedReader, ManagedSchema, ManagedWriter, Slot};
pub use primitive::{Char16, Primitive, PrimitiveKind, PrimitiveValue};
pub use reader::BufferReader;
pub use registry::{FixedResolver, ManagedResolver, Registry, Resolver};
pub use resolvers::{Timestamp, TimestampKind, TIMESTAMP_WIDTH, UUID_WIDTH};
pub use schema::{BufferSchema, SchemaEntry};
pub use shape::{Composite, CompositeShape, Member, MemberValues};
pub use stream::{read_string, read_string_exact, write_string};
pub use writer::BufferWriter;

/// Result alias for codec operations.
pub type Result<T, E = BufferError> = std::result::Result<T, E>;
