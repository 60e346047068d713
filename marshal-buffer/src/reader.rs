//! Buffer reader.

use crate::error::BufferError;
use crate::identity::TypeIdentity;
use crate::primitive::{PrimitiveKind, PrimitiveValue};
use crate::registry::Registry;
use crate::shape::{Composite, MemberValues};
use std::any::Any;

/// Bounds-checked cursor over one fixed-size input buffer.
pub struct BufferReader<'a> {
    buf: &'a [u8],
    position: usize,
    registry: &'a Registry,
}

impl<'a> BufferReader<'a> {
    pub fn new(buf: &'a [u8], registry: &'a Registry) -> Self {
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

    /// Reads the next `len` bytes, advancing the cursor.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], BufferError> {
        if len > self.remaining() {
            return Err(BufferError::overrun(self.position, len, self.buf.len()));
        }
        let start = self.position;
        self.position += len;
        Ok(&self.buf[start..start + len])
    }

    pub fn read_primitive(&mut self, kind: PrimitiveKind) -> Result<PrimitiveValue, BufferError> {
        let bytes = self.read_bytes(kind.width())?;
        Ok(PrimitiveValue::decode(kind, bytes))
    }

    /// Reads a primitive or fixed-resolver value.
    pub fn read<T: Any + Send>(&mut self) -> Result<T, BufferError> {
        let identity = TypeIdentity::of::<T>();
        let value = self.read_resolved(identity)?;
        value.downcast::<T>().map(|v| *v).map_err(|_| {
            BufferError::shape(
                identity.name(),
                format!("resolver did not produce a {}", identity.short_name()),
            )
        })
    }

    /// Reads a type-erased value of type `identity`.
    pub fn read_resolved(
        &mut self,
        identity: TypeIdentity,
    ) -> Result<Box<dyn Any + Send>, BufferError> {
        if let Some(kind) = PrimitiveKind::classify(identity)? {
            return Ok(self.read_primitive(kind)?.into_any());
        }

        let resolver = self
            .registry
            .resolve_fixed(identity)
            .ok_or(BufferError::UnsupportedType {
                type_name: identity.name(),
            })?;
        resolver.read_any(self)
    }

    /// Reads every member of a fixed-layout composite and constructs it.
    ///
    /// Members are decoded into a side list first; the composite only comes
    /// into existence once every member decoded.
    pub fn read_composite<C: Composite>(&mut self) -> Result<C, BufferError> {
        let shape = C::shape();
        let mut values = MemberValues::with_capacity(shape.name(), shape.len());

        for identity in shape.members() {
            values.push(*identity, self.read_resolved(*identity)?);
        }

        values.construct::<C>()
    }
}

impl std::fmt::Debug for BufferReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferReader")
            .field("position", &self.position)
            .field("len", &self.buf.len())
            .finish()
    }
}
