//! Buffer schemas.
//!
//! A schema is the ordered list of member types of one message together with
//! the byte size they occupy. It only grows: there is no API to remove or
//! reorder entries, so the order used to size a buffer is the order used to
//! fill it. Allocating a buffer consumes the schema.

use crate::error::BufferError;
use crate::identity::TypeIdentity;
use crate::reader::BufferReader;
use crate::registry::Registry;
use crate::shape::{Composite, CompositeShape};
use crate::writer::BufferWriter;
use bytes::{Bytes, BytesMut};
use std::any::Any;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// One laid-out member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaEntry {
    pub identity: TypeIdentity,
    pub offset: usize,
    pub width: usize,
}

/// Ordered buffer layout bound to a resolver registry.
#[derive(Debug, Clone)]
pub struct BufferSchema<'r> {
    registry: &'r Registry,
    entries: Vec<SchemaEntry>,
    size: usize,
}

impl BufferSchema<'static> {
    /// Creates an empty schema over the global registry.
    pub fn new() -> Self {
        Self::with_registry(Registry::global())
    }
}

impl Default for BufferSchema<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> BufferSchema<'r> {
    pub fn with_registry(registry: &'r Registry) -> Self {
        Self {
            registry,
            entries: Vec::new(),
            size: 0,
        }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Appends a fixed type: a primitive or a type with a fixed resolver.
    pub fn add<T: Any>(&mut self) -> Result<&mut Self, BufferError> {
        self.add_identity(TypeIdentity::of::<T>())
    }

    pub fn add_identity(&mut self, identity: TypeIdentity) -> Result<&mut Self, BufferError> {
        let width = self.registry.fixed_width(identity)?;
        self.push(identity, width)?;
        Ok(self)
    }

    /// Appends every member of `shape` in order.
    pub fn add_shape(&mut self, shape: &CompositeShape) -> Result<&mut Self, BufferError> {
        for identity in shape.members() {
            self.add_identity(*identity)?;
        }
        Ok(self)
    }

    pub fn add_composite<C: Composite>(&mut self) -> Result<&mut Self, BufferError> {
        self.add_shape(&C::shape())
    }

    /// Appends a span of `length` bytes owned by a managed member.
    pub fn reserve(&mut self, identity: TypeIdentity, length: usize) -> Result<(), BufferError> {
        self.push(identity, length)
    }

    fn push(&mut self, identity: TypeIdentity, width: usize) -> Result<(), BufferError> {
        let size = self
            .size
            .checked_add(width)
            .ok_or(BufferError::LengthTooLarge {
                length: width as u64,
                max: (usize::MAX - self.size) as u64,
            })?;

        self.entries.push(SchemaEntry {
            identity,
            offset: self.size,
            width,
        });
        self.size = size;
        Ok(())
    }

    /// Total byte size.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn entries(&self) -> &[SchemaEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Allocates a buffer of exactly `size()` bytes and fills it with `fill`.
    ///
    /// Fails with `BufferUnderrun` if `fill` leaves part of the buffer unwritten.
    pub fn encode<F>(self, fill: F) -> Result<Bytes, BufferError>
    where
        F: FnOnce(&mut BufferWriter<'_>) -> Result<(), BufferError>,
    {
        let mut buf = BytesMut::zeroed(self.size);
        let mut writer = BufferWriter::new(&mut buf[..], self.registry);
        fill(&mut writer)?;
        writer.finish()?;
        Ok(buf.freeze())
    }

    /// Binds a reader to the first `size()` bytes of `bytes`.
    pub fn reader<'b>(self, bytes: &'b [u8]) -> Result<BufferReader<'b>, BufferError>
    where
        'r: 'b,
    {
        if bytes.len() < self.size {
            return Err(BufferError::Incomplete {
                needed: self.size - bytes.len(),
            });
        }
        Ok(BufferReader::new(&bytes[..self.size], self.registry))
    }

    /// Reads exactly `size()` bytes from `stream`.
    pub async fn read_from<S>(self, stream: &mut S) -> Result<Bytes, BufferError>
    where
        S: AsyncRead + Unpin,
    {
        let mut buf = BytesMut::zeroed(self.size);
        stream.read_exact(&mut buf[..]).await?;
        Ok(buf.freeze())
    }

    /// Encodes with `fill`, then writes and flushes the buffer to `stream`.
    pub async fn write_to<S, F>(self, stream: &mut S, fill: F) -> Result<(), BufferError>
    where
        S: AsyncWrite + Unpin,
        F: FnOnce(&mut BufferWriter<'_>) -> Result<(), BufferError>,
    {
        let bytes = self.encode(fill)?;
        stream.write_all(&bytes).await?;
        stream.flush().await?;
        Ok(())
    }
}
