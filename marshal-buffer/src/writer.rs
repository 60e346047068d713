//! Buffer writer.

use crate::error::BufferError;
use crate::identity::TypeIdentity;
use crate::primitive::{PrimitiveKind, PrimitiveValue};
use crate::registry::Registry;
use crate::shape::{check_members, Composite, Member};
use std::any::Any;

/// Bounds-checked cursor over one fixed-size output buffer.
pub struct BufferWriter<'a> {
    buf: &'a mut [u8],
    position: usize,
    registry: &'a Registry,
}

impl<'a> BufferWriter<'a> {
    pub fn new(buf: &'a mut [u8], registry: &'a Registry) -> Self {
        Self {
            buf,
            position: 0,
            registry,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.position
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Claims the next `len` bytes, advancing the cursor.
    fn claim(&mut self, len: usize) -> Result<&mut [u8], BufferError> {
        if len > self.remaining() {
            return Err(BufferError::overrun(self.position, len, self.buf.len()));
        }
        let start = self.position;
        self.position += len;
        Ok(&mut self.buf[start..start + len])
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), BufferError> {
        self.claim(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    pub fn write_primitive(&mut self, value: PrimitiveValue) -> Result<(), BufferError> {
        value.encode(self.claim(value.kind().width())?);
        Ok(())
    }

    /// Writes a primitive or fixed-resolver value.
    pub fn write<T: Any>(&mut self, value: &T) -> Result<(), BufferError> {
        self.write_resolved(TypeIdentity::of::<T>(), value)
    }

    /// Writes a type-erased value of type `identity`.
    pub fn write_resolved(
        &mut self,
        identity: TypeIdentity,
        value: &dyn Any,
    ) -> Result<(), BufferError> {
        if let Some(kind) = PrimitiveKind::classify(identity)? {
            let value = PrimitiveValue::from_any(kind, value).ok_or_else(|| {
                BufferError::shape(
                    identity.name(),
                    format!("member value is not a {}", identity.short_name()),
                )
            })?;
            return self.write_primitive(value);
        }

        let resolver = self
            .registry
            .resolve_fixed(identity)
            .ok_or(BufferError::UnsupportedType {
                type_name: identity.name(),
            })?;
        resolver.write_any(self, value)
    }

    /// Writes one borrowed member; absent members are rejected.
    pub fn write_member(&mut self, member: &Member<'_>) -> Result<(), BufferError> {
        let value = member.value().ok_or(BufferError::NullValue {
            type_name: member.identity().name(),
        })?;
        self.write_resolved(member.identity(), value)
    }

    /// Writes every member of a fixed-layout composite in shape order.
    pub fn write_composite<C: Composite>(&mut self, value: &C) -> Result<(), BufferError> {
        let shape = C::shape();
        let members = value.members();
        check_members(&shape, &members)?;

        for member in &members {
            self.write_member(member)?;
        }
        Ok(())
    }

    /// Completes the pass, requiring the buffer to be exactly filled.
    pub fn finish(self) -> Result<(), BufferError> {
        if self.position != self.buf.len() {
            return Err(BufferError::BufferUnderrun {
                written: self.position,
                expected: self.buf.len(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for BufferWriter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferWriter")
            .field("position", &self.position)
            .field("len", &self.buf.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Timestamp;
    use uuid::Uuid;

    #[test]
    fn test_sequential_writes() {
        let registry = Registry::with_builtins();
        let mut buf = [0u8; 7];
        let mut writer = BufferWriter::new(&mut buf, &registry);

        writer.write(&1u8).unwrap();
        writer.write(&-1i16).unwrap();
        writer.write_bytes(&[9, 8, 7, 6]).unwrap();
        assert_eq!(writer.position(), 7);
        assert_eq!(writer.remaining(), 0);
        writer.finish().unwrap();

        assert_eq!(buf, [1, 0xFF, 0xFF, 9, 8, 7, 6]);
    }

    #[test]
    fn test_overrun_does_not_advance() {
        let registry = Registry::with_builtins();
        let mut buf = [0u8; 3];
        let mut writer = BufferWriter::new(&mut buf, &registry);

        writer.write(&0x11u8).unwrap();
        let err = writer.write(&0x2233_4455u32).unwrap_err();
        assert!(matches!(
            err,
            BufferError::BufferOverrun {
                position: 1,
                requested: 4,
                capacity: 3
            }
        ));
        assert_eq!(writer.position(), 1);

        // Nothing past the failed write was touched
        writer.write(&0x6677u16).unwrap();
        assert_eq!(buf, [0x11, 0x77, 0x66]);
    }

    #[test]
    fn test_write_bytes_overrun() {
        let registry = Registry::with_builtins();
        let mut buf = [0u8; 2];
        let mut writer = BufferWriter::new(&mut buf, &registry);
        assert!(matches!(
            writer.write_bytes(&[1, 2, 3]),
            Err(BufferError::BufferOverrun { .. })
        ));
    }

    #[test]
    fn test_write_resolved_types() {
        let registry = Registry::with_builtins();
        let id = Uuid::from_bytes([7u8; 16]);
        let ts = Timestamp::from_ticks(1234);
        let mut buf = [0u8; 28];
        let mut writer = BufferWriter::new(&mut buf, &registry);

        writer.write(&id).unwrap();
        writer.write(&ts).unwrap();
        writer.finish().unwrap();

        assert_eq!(&buf[..16], &[7u8; 16]);
        assert_eq!(&buf[16..24], &1234i64.to_le_bytes());
    }

    #[test]
    fn test_write_unsupported() {
        let registry = Registry::with_builtins();
        let mut buf = [0u8; 16];
        let mut writer = BufferWriter::new(&mut buf, &registry);

        assert!(matches!(
            writer.write(&vec![1u8]),
            Err(BufferError::UnsupportedType { .. })
        ));
        assert!(matches!(
            writer.write(&3usize),
            Err(BufferError::ReservedType { .. })
        ));
        // Managed types cannot be written into a fixed buffer
        assert!(matches!(
            writer.write(&"text".to_string()),
            Err(BufferError::UnsupportedType { .. })
        ));
        assert_eq!(writer.position(), 0);
    }

    #[test]
    fn test_write_resolved_type_mismatch() {
        let registry = Registry::with_builtins();
        let mut buf = [0u8; 4];
        let mut writer = BufferWriter::new(&mut buf, &registry);

        let err = writer
            .write_resolved(TypeIdentity::of::<i32>(), &5u32)
            .unwrap_err();
        assert!(matches!(err, BufferError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_write_absent_member() {
        let registry = Registry::with_builtins();
        let mut buf = [0u8; 4];
        let mut writer = BufferWriter::new(&mut buf, &registry);

        let err = writer.write_member(&Member::absent::<i32>()).unwrap_err();
        assert!(matches!(err, BufferError::NullValue { .. }));
    }

    #[test]
    fn test_write_composite_tuple() {
        let registry = Registry::with_builtins();
        let mut buf = [0u8; 12];
        let mut writer = BufferWriter::new(&mut buf, &registry);

        writer.write_composite(&(1i32, 1.0f64)).unwrap();
        writer.finish().unwrap();

        assert_eq!(&buf[..4], &[1, 0, 0, 0]);
        assert_eq!(&buf[4..], &1.0f64.to_le_bytes());
    }
}
