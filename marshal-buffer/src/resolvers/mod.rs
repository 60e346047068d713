//! Built-in resolvers.
//!
//! | Type                 | Kind    | Width                  |
//! |----------------------|---------|------------------------|
//! | `uuid::Uuid`         | fixed   | 16 bytes               |
//! | [`Timestamp`]        | fixed   | 12 bytes (i64 + i32)   |
//! | [`String`]           | managed | UTF-8 byte length      |

mod identifier;
mod text;
mod timestamp;

pub use self::identifier::{UuidResolver, UUID_WIDTH};
pub use self::text::TextResolver;
pub use self::timestamp::{Timestamp, TimestampKind, TimestampResolver, TIMESTAMP_WIDTH};
