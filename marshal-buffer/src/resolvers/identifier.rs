//! 16-byte identifier resolver.

use crate::error::BufferError;
use crate::reader::BufferReader;
use crate::registry::FixedResolver;
use crate::writer::BufferWriter;
use uuid::Uuid;

/// Encoded width of a [`Uuid`].
pub const UUID_WIDTH: usize = 16;

/// Writes a [`Uuid`] as its 16 raw bytes, most significant first.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidResolver;

impl FixedResolver<Uuid> for UuidResolver {
    fn width(&self) -> usize {
        UUID_WIDTH
    }

    fn write(&self, writer: &mut BufferWriter<'_>, value: &Uuid) -> Result<(), BufferError> {
        writer.write_bytes(value.as_bytes())
    }

    fn read(&self, reader: &mut BufferReader<'_>) -> Result<Uuid, BufferError> {
        let bytes = reader.read_bytes(UUID_WIDTH)?;
        Uuid::from_slice(bytes).map_err(|e| BufferError::InvalidEncoding {
            type_name: std::any::type_name::<Uuid>(),
            reason: e.to_string(),
        })
    }
}
