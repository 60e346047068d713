//! Codec facade.
//!
//! [`Codec`] binds a registry and a managed length limit and offers the
//! slice-based and stream-based entry points. The free functions at the bottom
//! forward to a codec over the global registry.

use crate::error::BufferError;
use crate::managed::{ManagedReader, ManagedWriter};
use crate::registry::Registry;
use crate::schema::BufferSchema;
use crate::shape::Composite;
use bytes::Bytes;
use std::any::Any;
use tokio::io::{AsyncRead, AsyncWrite};

/// Default limit for one managed length and for a managed body (16 MiB).
pub const DEFAULT_MAX_MANAGED_LENGTH: u32 = 16 * 1024 * 1024;

/// Encoder and decoder bound to one registry.
#[derive(Debug, Clone, Copy)]
pub struct Codec<'r> {
    registry: &'r Registry,
    max_managed_length: u32,
}

impl Codec<'static> {
    /// Creates a codec over the global registry.
    pub fn new() -> Self {
        Self::with_registry(Registry::global())
    }
}

impl Default for Codec<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> Codec<'r> {
    pub fn with_registry(registry: &'r Registry) -> Self {
        Self {
            registry,
            max_managed_length: DEFAULT_MAX_MANAGED_LENGTH,
        }
    }

    pub fn with_max_managed_length(mut self, max: u32) -> Self {
        self.max_managed_length = max;
        self
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn max_managed_length(&self) -> u32 {
        self.max_managed_length
    }

    pub fn schema(&self) -> BufferSchema<'r> {
        BufferSchema::with_registry(self.registry)
    }

    pub fn managed_writer<'a>(&self) -> ManagedWriter<'a>
    where
        'r: 'a,
    {
        ManagedWriter::with_registry(self.registry).with_max_length(self.max_managed_length)
    }

    pub fn managed_reader(&self) -> ManagedReader<'r> {
        ManagedReader::with_registry(self.registry).with_max_length(self.max_managed_length)
    }

    /// Encodes a single primitive or fixed-resolver value.
    pub fn encode_value<T: Any>(&self, value: &T) -> Result<Bytes, BufferError> {
        let mut schema = self.schema();
        schema.add::<T>()?;
        schema.encode(|w| w.write(value))
    }

    pub fn decode_value<T: Any + Send>(&self, bytes: &[u8]) -> Result<(T, usize), BufferError> {
        let mut schema = self.schema();
        schema.add::<T>()?;
        let size = schema.size();
        let value = schema.reader(bytes)?.read::<T>()?;
        Ok((value, size))
    }

    /// Encodes a composite whose members are all fixed.
    pub fn encode<C: Composite>(&self, value: &C) -> Result<Bytes, BufferError> {
        let mut schema = self.schema();
        schema.add_composite::<C>()?;
        schema.encode(|w| w.write_composite(value))
    }

    pub fn decode<C: Composite>(&self, bytes: &[u8]) -> Result<(C, usize), BufferError> {
        let mut schema = self.schema();
        schema.add_composite::<C>()?;
        let size = schema.size();
        let value = schema.reader(bytes)?.read_composite::<C>()?;
        Ok((value, size))
    }

    /// Encodes a composite as header followed by body.
    pub fn encode_managed<C: Composite>(&self, value: &C) -> Result<Bytes, BufferError> {
        let mut writer = self.managed_writer();
        writer.write_composite(value)?;
        Ok(writer.finish()?.to_bytes())
    }

    pub fn decode_managed<C: Composite>(&self, bytes: &[u8]) -> Result<(C, usize), BufferError> {
        let mut reader = self.managed_reader();
        reader.add_composite::<C>()?;
        reader.decode_composite(bytes)
    }

    /// Writes a fixed composite to `stream` and flushes.
    pub async fn write<S, C>(&self, stream: &mut S, value: &C) -> Result<(), BufferError>
    where
        S: AsyncWrite + Unpin,
        C: Composite,
    {
        let mut schema = self.schema();
        schema.add_composite::<C>()?;
        schema.write_to(stream, |w| w.write_composite(value)).await
    }

    /// Reads exactly one fixed composite from `stream`.
    pub async fn read<S, C>(&self, stream: &mut S) -> Result<C, BufferError>
    where
        S: AsyncRead + Unpin,
        C: Composite,
    {
        let mut schema = self.schema();
        schema.add_composite::<C>()?;
        let bytes = schema.clone().read_from(stream).await?;
        schema.reader(&bytes)?.read_composite::<C>()
    }

    /// Writes a managed message to `stream` and flushes.
    pub async fn write_managed<S, C>(&self, stream: &mut S, value: &C) -> Result<(), BufferError>
    where
        S: AsyncWrite + Unpin,
        C: Composite,
    {
        let message = {
            let mut writer = self.managed_writer();
            writer.write_composite(value)?;
            writer.finish()?
        };
        message.write_to(stream).await
    }

    /// Reads one managed message from `stream`.
    pub async fn read_managed<S, C>(&self, stream: &mut S) -> Result<C, BufferError>
    where
        S: AsyncRead + Unpin,
        C: Composite,
    {
        let mut reader = self.managed_reader();
        reader.add_composite::<C>()?;
        reader.read_from(stream).await?.construct::<C>()
    }
}

/// Encodes a single value with the global registry.
pub fn encode_value<T: Any>(value: &T) -> Result<Bytes, BufferError> {
    Codec::new().encode_value(value)
}

pub fn decode_value<T: Any + Send>(bytes: &[u8]) -> Result<(T, usize), BufferError> {
    Codec::new().decode_value(bytes)
}

/// Encodes a fixed composite with the global registry.
pub fn encode<C: Composite>(value: &C) -> Result<Bytes, BufferError> {
    Codec::new().encode(value)
}

pub fn decode<C: Composite>(bytes: &[u8]) -> Result<(C, usize), BufferError> {
    Codec::new().decode(bytes)
}

/// Encodes a managed message with the global registry.
pub fn encode_managed<C: Composite>(value: &C) -> Result<Bytes, BufferError> {
    Codec::new().encode_managed(value)
}

pub fn decode_managed<C: Composite>(bytes: &[u8]) -> Result<(C, usize), BufferError> {
    Codec::new().decode_managed(bytes)
}

pub async fn write<S, C>(stream: &mut S, value: &C) -> Result<(), BufferError>
where
    S: AsyncWrite + Unpin,
    C: Composite,
{
    Codec::new().write(stream, value).await
}

pub async fn read<S, C>(stream: &mut S) -> Result<C, BufferError>
where
    S: AsyncRead + Unpin,
    C: Composite,
{
    Codec::new().read(stream).await
}

pub async fn write_managed<S, C>(stream: &mut S, value: &C) -> Result<(), BufferError>
where
    S: AsyncWrite + Unpin,
    C: Composite,
{
    Codec::new().write_managed(stream, value).await
}

pub async fn read_managed<S, C>(stream: &mut S) -> Result<C, BufferError>
where
    S: AsyncRead + Unpin,
    C: Composite,
{
    Codec::new().read_managed(stream).await
}
