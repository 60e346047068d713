//! UTF-8 text resolver.

use crate::error::BufferError;
use crate::reader::BufferReader;
use crate::registry::ManagedResolver;
use crate::writer::BufferWriter;

/// Managed resolver for [`String`]: the body holds the raw UTF-8 bytes, the
/// header holds their count. No terminator is written.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextResolver;

impl ManagedResolver<String> for TextResolver {
    type Intermediate = Vec<u8>;

    fn convert(&self, value: &String) -> Result<(Vec<u8>, u32), BufferError> {
        let length = u32::try_from(value.len()).map_err(|_| BufferError::LengthTooLarge {
            length: value.len() as u64,
            max: u32::MAX as u64,
        })?;
        Ok((value.as_bytes().to_vec(), length))
    }

    fn write(&self, writer: &mut BufferWriter<'_>, bytes: &Vec<u8>) -> Result<(), BufferError> {
        writer.write_bytes(bytes)
    }

    fn read(&self, reader: &mut BufferReader<'_>, length: u32) -> Result<String, BufferError> {
        let bytes = reader.read_bytes(length as usize)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|e| BufferError::InvalidEncoding {
                type_name: std::any::type_name::<String>(),
                reason: e.to_string(),
            })
    }
}
