//! Managed (variable-length) messages.
//!
//! A managed message is split into two segments:
//!
//! ```text
//! +-------------------------------------+----------------------------------+
//! |               Header                |               Body               |
//! +-------------------------------------+----------------------------------+
//! | u32 LE length per managed member    | every member in order: fixed     |
//! | (member order, 4 * header_length)   | members at static width, managed |
//! |                                     | members at their header length   |
//! +-------------------------------------+----------------------------------+
//! ```
//!
//! There is no outer length prefix and no type tags: the reader derives the
//! header size from the member types it expects. Both directions walk one
//! canonical slot list, so convert, header, body layout and body passes can
//! never disagree on member order.

use crate::codec::DEFAULT_MAX_MANAGED_LENGTH;
use crate::error::BufferError;
use crate::identity::TypeIdentity;
use crate::primitive::PrimitiveKind;
use crate::registry::{Converted, DynManagedResolver, Registry};
use crate::schema::BufferSchema;
use crate::shape::{check_members, Composite, CompositeShape, Member, MemberValues};
use bytes::{Bytes, BytesMut};
use std::any::Any;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// Width of one header slot.
pub const HEADER_SLOT_WIDTH: usize = 4;

/// One classified member.
#[derive(Clone)]
pub enum Slot {
    /// Primitive or fixed-resolver member.
    Fixed { identity: TypeIdentity },
    /// Member framed by a header length.
    Managed {
        identity: TypeIdentity,
        resolver: Arc<dyn DynManagedResolver>,
    },
}

impl Slot {
    /// Classifies `identity`: primitive, then managed resolver, then fixed
    /// resolver.
    fn classify(registry: &Registry, identity: TypeIdentity) -> Result<Slot, BufferError> {
        if PrimitiveKind::classify(identity)?.is_some() {
            return Ok(Slot::Fixed { identity });
        }
        if let Some(resolver) = registry.resolve_managed(identity) {
            return Ok(Slot::Managed { identity, resolver });
        }
        registry.fixed_width(identity)?;
        Ok(Slot::Fixed { identity })
    }

    pub fn identity(&self) -> TypeIdentity {
        match self {
            Slot::Fixed { identity } | Slot::Managed { identity, .. } => *identity,
        }
    }

    pub fn is_managed(&self) -> bool {
        matches!(self, Slot::Managed { .. })
    }
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Fixed { identity } => write!(f, "Fixed({})", identity),
            Slot::Managed { identity, .. } => write!(f, "Managed({})", identity),
        }
    }
}

/// Canonical member list of a managed message.
#[derive(Debug, Clone)]
pub struct ManagedSchema<'r> {
    registry: &'r Registry,
    name: &'static str,
    slots: Vec<Slot>,
    header_length: usize,
}

impl<'r> ManagedSchema<'r> {
    pub fn with_registry(registry: &'r Registry) -> Self {
        Self {
            registry,
            name: "managed message",
            slots: Vec::new(),
            header_length: 0,
        }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Classifies and appends a member, returning its slot.
    pub fn add_identity(&mut self, identity: TypeIdentity) -> Result<&Slot, BufferError> {
        let slot = Slot::classify(self.registry, identity)?;
        Ok(self.push(slot))
    }

    fn push(&mut self, slot: Slot) -> &Slot {
        if slot.is_managed() {
            self.header_length += 1;
        }
        self.slots.push(slot);
        &self.slots[self.slots.len() - 1]
    }

    /// Appends every member of `shape`. The first shape added names the
    /// message in diagnostics.
    pub fn add_shape(&mut self, shape: &CompositeShape) -> Result<(), BufferError> {
        if self.slots.is_empty() {
            self.name = shape.name();
        }
        for identity in shape.members() {
            self.add_identity(*identity)?;
        }
        Ok(())
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Number of managed members, i.e. header slots.
    pub fn header_length(&self) -> usize {
        self.header_length
    }

    /// Byte size of the header segment.
    pub fn header_size(&self) -> usize {
        self.header_length * HEADER_SLOT_WIDTH
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Header layout: one u32 per managed member.
    pub fn header(&self) -> Result<BufferSchema<'r>, BufferError> {
        let mut schema = BufferSchema::with_registry(self.registry);
        for _ in 0..self.header_length {
            schema.add::<u32>()?;
        }
        Ok(schema)
    }

    /// Body layout. `managed` receives the slot position and resolver of
    /// every managed member in order and adds its contribution.
    fn body<F>(&self, mut managed: F) -> Result<BufferSchema<'r>, BufferError>
    where
        F: FnMut(usize, &dyn DynManagedResolver, &mut BufferSchema<'r>) -> Result<(), BufferError>,
    {
        let mut schema = BufferSchema::with_registry(self.registry);
        for (position, slot) in self.slots.iter().enumerate() {
            match slot {
                Slot::Fixed { identity } => {
                    schema.add_identity(*identity)?;
                }
                Slot::Managed { resolver, .. } => managed(position, resolver.as_ref(), &mut schema)?,
            }
        }
        Ok(schema)
    }
}

fn check_length(length: u64, max: u32) -> Result<(), BufferError> {
    if length > max as u64 {
        return Err(BufferError::LengthTooLarge {
            length,
            max: max as u64,
        });
    }
    Ok(())
}

/// An encoded managed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedMessage {
    header: Bytes,
    body: Bytes,
}

impl ManagedMessage {
    pub fn header(&self) -> &Bytes {
        &self.header
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Header lengths in member order.
    pub fn lengths(&self) -> Vec<u32> {
        self.header
            .chunks_exact(HEADER_SLOT_WIDTH)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    /// Total wire size.
    pub fn len(&self) -> usize {
        self.header.len() + self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Header immediately followed by body.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len());
        buf.extend_from_slice(&self.header);
        buf.extend_from_slice(&self.body);
        buf.freeze()
    }

    pub fn into_parts(self) -> (Bytes, Bytes) {
        (self.header, self.body)
    }

    /// Writes header then body to `stream` and flushes.
    pub async fn write_to<S>(&self, stream: &mut S) -> Result<(), BufferError>
    where
        S: AsyncWrite + Unpin,
    {
        stream.write_all(&self.header).await?;
        stream.write_all(&self.body).await?;
        stream.flush().await?;
        Ok(())
    }
}

enum Pending<'a> {
    Fixed(&'a dyn Any),
    Managed(Converted),
}

/// Collects borrowed members, converting managed ones as they arrive.
pub struct ManagedWriter<'a> {
    schema: ManagedSchema<'a>,
    values: Vec<Pending<'a>>,
    max_length: u32,
}

impl ManagedWriter<'static> {
    /// Creates a writer over the global registry.
    pub fn new() -> Self {
        Self::with_registry(Registry::global())
    }
}

impl Default for ManagedWriter<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ManagedWriter<'a> {
    pub fn with_registry(registry: &'a Registry) -> Self {
        Self {
            schema: ManagedSchema::with_registry(registry),
            values: Vec::new(),
            max_length: DEFAULT_MAX_MANAGED_LENGTH,
        }
    }

    /// Limits each managed length and the body size.
    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn schema(&self) -> &ManagedSchema<'a> {
        &self.schema
    }

    pub fn write<T: Any>(&mut self, value: &'a T) -> Result<&mut Self, BufferError> {
        self.write_member(Member::of(value))
    }

    /// Appends one member. Absent members fail with `NullValue` and leave the
    /// writer unchanged.
    pub fn write_member(&mut self, member: Member<'a>) -> Result<&mut Self, BufferError> {
        let (slot, pending) = self.prepare(member)?;
        self.schema.push(slot);
        self.values.push(pending);
        Ok(self)
    }

    /// Classifies and converts one member without committing it.
    fn prepare(&self, member: Member<'a>) -> Result<(Slot, Pending<'a>), BufferError> {
        let identity = member.identity();
        let slot = Slot::classify(self.schema.registry(), identity)?;
        let value = member.value().ok_or(BufferError::NullValue {
            type_name: identity.name(),
        })?;

        let pending = match &slot {
            Slot::Fixed { .. } => Pending::Fixed(value),
            Slot::Managed { resolver, .. } => {
                let converted = resolver.convert_any(value)?;
                check_length(converted.length() as u64, self.max_length)?;
                Pending::Managed(converted)
            }
        };
        Ok((slot, pending))
    }

    /// Appends every member of `value` in shape order. Nothing is appended
    /// unless every member is accepted.
    pub fn write_composite<C: Composite>(&mut self, value: &'a C) -> Result<&mut Self, BufferError> {
        let shape = C::shape();
        let members = value.members();
        check_members(&shape, &members)?;

        let prepared = members
            .into_iter()
            .map(|member| self.prepare(member))
            .collect::<Result<Vec<_>, _>>()?;

        if self.schema.is_empty() {
            self.schema.name = shape.name();
        }
        for (slot, pending) in prepared {
            self.schema.push(slot);
            self.values.push(pending);
        }
        Ok(self)
    }

    fn converted(&self, position: usize) -> Result<&Converted, BufferError> {
        match self.values.get(position) {
            Some(Pending::Managed(converted)) => Ok(converted),
            _ => Err(BufferError::shape(
                self.schema.name(),
                format!("member {} has no converted value", position),
            )),
        }
    }

    /// Lays out and writes the header and body segments.
    pub fn finish(self) -> Result<ManagedMessage, BufferError> {
        let lengths: Vec<u32> = self
            .values
            .iter()
            .filter_map(|v| match v {
                Pending::Managed(c) => Some(c.length()),
                Pending::Fixed(_) => None,
            })
            .collect();

        let header = self.schema.header()?.encode(|w| {
            for length in &lengths {
                w.write(length)?;
            }
            Ok(())
        })?;

        let body_schema = self.schema.body(|position, resolver, body| {
            resolver.write_add_any(body, self.converted(position)?)
        })?;
        check_length(body_schema.size() as u64, self.max_length)?;

        let body = body_schema.encode(|w| {
            for (slot, value) in self.schema.slots().iter().zip(&self.values) {
                match (slot, value) {
                    (Slot::Fixed { identity }, Pending::Fixed(value)) => {
                        w.write_resolved(*identity, *value)?
                    }
                    (Slot::Managed { resolver, .. }, Pending::Managed(converted)) => {
                        resolver.write_any(w, converted)?
                    }
                    (slot, _) => {
                        return Err(BufferError::shape(
                            self.schema.name(),
                            format!("slot {:?} paired with the wrong value kind", slot),
                        ))
                    }
                }
            }
            Ok(())
        })?;

        tracing::trace!(
            message = self.schema.name(),
            members = self.schema.len(),
            header_length = lengths.len(),
            body_size = body.len(),
            "assembled managed message"
        );

        Ok(ManagedMessage { header, body })
    }

    /// Finishes the message and writes it to `stream`.
    pub async fn write_to<S>(self, stream: &mut S) -> Result<(), BufferError>
    where
        S: AsyncWrite + Unpin,
    {
        let message = self.finish()?;
        message.write_to(stream).await
    }
}

impl std::fmt::Debug for ManagedWriter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedWriter")
            .field("schema", &self.schema)
            .field("max_length", &self.max_length)
            .finish()
    }
}

/// Reads managed messages of a known member list.
#[derive(Debug, Clone)]
pub struct ManagedReader<'r> {
    schema: ManagedSchema<'r>,
    max_length: u32,
}

impl ManagedReader<'static> {
    /// Creates a reader over the global registry.
    pub fn new() -> Self {
        Self::with_registry(Registry::global())
    }
}

impl Default for ManagedReader<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> ManagedReader<'r> {
    pub fn with_registry(registry: &'r Registry) -> Self {
        Self {
            schema: ManagedSchema::with_registry(registry),
            max_length: DEFAULT_MAX_MANAGED_LENGTH,
        }
    }

    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn schema(&self) -> &ManagedSchema<'r> {
        &self.schema
    }

    pub fn add<T: Any>(&mut self) -> Result<&mut Self, BufferError> {
        self.add_identity(TypeIdentity::of::<T>())
    }

    pub fn add_identity(&mut self, identity: TypeIdentity) -> Result<&mut Self, BufferError> {
        self.schema.add_identity(identity)?;
        Ok(self)
    }

    pub fn add_shape(&mut self, shape: &CompositeShape) -> Result<&mut Self, BufferError> {
        self.schema.add_shape(shape)?;
        Ok(self)
    }

    pub fn add_composite<C: Composite>(&mut self) -> Result<&mut Self, BufferError> {
        self.add_shape(&C::shape())
    }

    /// Parses header lengths in member order.
    fn lengths(&self, header: &[u8]) -> Result<Vec<u32>, BufferError> {
        let mut reader = self.schema.header()?.reader(header)?;
        let mut lengths = Vec::with_capacity(self.schema.header_length());
        for _ in 0..self.schema.header_length() {
            let length = reader.read::<u32>()?;
            check_length(length as u64, self.max_length)?;
            lengths.push(length);
        }
        Ok(lengths)
    }

    fn body_schema(&self, lengths: &[u32]) -> Result<BufferSchema<'r>, BufferError> {
        let mut queue = lengths.iter().copied();
        let schema = self.schema.body(|_, resolver, body| {
            let length = queue
                .next()
                .ok_or_else(|| BufferError::shape(self.schema.name(), "header ran out of lengths"))?;
            resolver.read_add_any(body, length)
        })?;
        check_length(schema.size() as u64, self.max_length)?;
        Ok(schema)
    }

    fn read_body(
        &self,
        body_schema: BufferSchema<'_>,
        body: &[u8],
        lengths: &[u32],
    ) -> Result<MemberValues, BufferError> {
        let mut reader = body_schema.reader(body)?;
        let mut queue = lengths.iter().copied();
        let mut values = MemberValues::with_capacity(self.schema.name(), self.schema.len());

        for slot in self.schema.slots() {
            let value = match slot {
                Slot::Fixed { identity } => reader.read_resolved(*identity)?,
                Slot::Managed { resolver, .. } => {
                    let length = queue.next().ok_or_else(|| {
                        BufferError::shape(self.schema.name(), "header ran out of lengths")
                    })?;
                    resolver.read_any(&mut reader, length)?
                }
            };
            values.push(slot.identity(), value);
        }
        Ok(values)
    }

    /// Decodes one message from the front of `bytes`, returning the members
    /// and the number of bytes consumed.
    pub fn decode(&self, bytes: &[u8]) -> Result<(MemberValues, usize), BufferError> {
        let header_size = self.schema.header_size();
        if bytes.len() < header_size {
            return Err(BufferError::Incomplete {
                needed: header_size - bytes.len(),
            });
        }

        let lengths = self.lengths(&bytes[..header_size])?;
        let body_schema = self.body_schema(&lengths)?;
        let body_size = body_schema.size();
        let values = self.read_body(body_schema, &bytes[header_size..], &lengths)?;

        tracing::trace!(
            message = self.schema.name(),
            header_length = lengths.len(),
            body_size,
            "disassembled managed message"
        );

        Ok((values, header_size + body_size))
    }

    /// Decodes one message and constructs a `C` from its members.
    pub fn decode_composite<C: Composite>(&self, bytes: &[u8]) -> Result<(C, usize), BufferError> {
        let (values, consumed) = self.decode(bytes)?;
        Ok((values.construct::<C>()?, consumed))
    }

    /// Reads one message from `stream`: the header first, then exactly the
    /// body it describes.
    pub async fn read_from<S>(&self, stream: &mut S) -> Result<MemberValues, BufferError>
    where
        S: AsyncRead + Unpin,
    {
        let header = self.schema.header()?.read_from(stream).await?;
        let lengths = self.lengths(&header)?;
        let body_schema = self.body_schema(&lengths)?;
        let body = body_schema.clone().read_from(stream).await?;

        tracing::trace!(
            message = self.schema.name(),
            header_length = lengths.len(),
            body_size = body.len(),
            "read managed message"
        );

        self.read_body(body_schema, &body, &lengths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Timestamp, TimestampKind};
    use uuid::Uuid;

    fn encode<C: Composite>(registry: &Registry, value: &C) -> ManagedMessage {
        let mut writer = ManagedWriter::with_registry(registry);
        writer.write_composite(value).unwrap();
        writer.finish().unwrap()
    }

    fn decode<C: Composite>(registry: &Registry, bytes: &[u8]) -> Result<(C, usize), BufferError> {
        let mut reader = ManagedReader::with_registry(registry);
        reader.add_composite::<C>()?;
        reader.decode_composite(bytes)
    }

    #[derive(Debug, PartialEq)]
    struct Profile {
        id: Uuid,
        nickname: Option<String>,
        score: i32,
    }

    impl Composite for Profile {
        fn shape() -> CompositeShape {
            CompositeShape::new("Profile")
                .with::<Uuid>()
                .with::<String>()
                .with::<i32>()
        }

        fn members(&self) -> Vec<Member<'_>> {
            vec![
                Member::of(&self.id),
                Member::optional(&self.nickname),
                Member::of(&self.score),
            ]
        }

        fn construct(values: &mut MemberValues) -> Result<Self, BufferError> {
            Ok(Self {
                id: values.take()?,
                nickname: Some(values.take()?),
                score: values.take()?,
            })
        }
    }

    #[test]
    fn test_int_and_text() {
        let registry = Registry::with_builtins();
        let value = (42i32, "hello".to_string());
        let message = encode(&registry, &value);

        assert_eq!(message.lengths(), vec![5]);
        assert_eq!(message.header().as_ref(), &[5, 0, 0, 0]);
        assert_eq!(message.body().len(), 9);
        assert_eq!(&message.body()[..4], &42i32.to_le_bytes());
        assert_eq!(&message.body()[4..], b"hello");

        let bytes = message.to_bytes();
        assert_eq!(bytes.len(), 13);

        let (decoded, consumed) = decode::<(i32, String)>(&registry, &bytes).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(consumed, 13);
    }

    #[test]
    fn test_empty_text() {
        let registry = Registry::with_builtins();
        let value = (String::new(),);
        let message = encode(&registry, &value);

        assert_eq!(message.lengths(), vec![0]);
        assert!(message.body().is_empty());
        assert_eq!(message.len(), 4);

        let (decoded, consumed) = decode::<(String,)>(&registry, &message.to_bytes()).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(consumed, 4);
    }

    #[test]
    fn test_multiple_texts_in_order() {
        let registry = Registry::with_builtins();
        let value = ("Hello".to_string(), "World".to_string(), "!".to_string());
        let message = encode(&registry, &value);

        assert_eq!(message.lengths(), vec![5, 5, 1]);
        assert_eq!(message.body().as_ref(), b"HelloWorld!");

        let (decoded, _) =
            decode::<(String, String, String)>(&registry, &message.to_bytes()).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_no_managed_members() {
        let registry = Registry::with_builtins();
        let value = (1u8, 2u16);
        let message = encode(&registry, &value);

        assert!(message.header().is_empty());
        assert_eq!(message.body().as_ref(), &[1, 2, 0]);

        let (decoded, _) = decode::<(u8, u16)>(&registry, &message.to_bytes()).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_mixed_fixed_resolvers() {
        let registry = Registry::with_builtins();
        let value = (
            Uuid::new_v4(),
            "name".to_string(),
            Timestamp::new(638_400_000_000_000_000, TimestampKind::Local),
            "".to_string(),
            true,
        );
        let message = encode(&registry, &value);
        assert_eq!(message.lengths(), vec![4, 0]);
        assert_eq!(message.body().len(), 16 + 4 + 12 + 0 + 1);

        let (decoded, consumed) = decode::<(Uuid, String, Timestamp, String, bool)>(
            &registry,
            &message.to_bytes(),
        )
        .unwrap();
        assert_eq!(decoded, value);
        assert_eq!(consumed, message.len());
    }

    #[test]
    fn test_trailing_bytes_not_consumed() {
        let registry = Registry::with_builtins();
        let message = encode(&registry, &(7i32, "ab".to_string()));

        let mut bytes = message.to_bytes().to_vec();
        bytes.extend_from_slice(&[0xAA, 0xBB]);

        let (_, consumed) = decode::<(i32, String)>(&registry, &bytes).unwrap();
        assert_eq!(consumed, message.len());
    }

    #[test]
    fn test_struct_with_optional_member() {
        let registry = Registry::with_builtins();
        let profile = Profile {
            id: Uuid::from_bytes([3u8; 16]),
            nickname: Some("rook".to_string()),
            score: -10,
        };
        let message = encode(&registry, &profile);
        let (decoded, _) = decode::<Profile>(&registry, &message.to_bytes()).unwrap();
        assert_eq!(decoded, profile);

        let missing = Profile {
            nickname: None,
            ..profile
        };
        let mut writer = ManagedWriter::with_registry(&registry);
        let err = writer.write_composite(&missing).unwrap_err();
        assert!(matches!(err, BufferError::NullValue { .. }));
        assert!(writer.schema().is_empty());
    }

    #[test]
    fn test_failed_composite_leaves_earlier_members_intact() {
        let registry = Registry::with_builtins();
        let first = 7u32;
        let missing = Profile {
            id: Uuid::from_bytes([1u8; 16]),
            nickname: None,
            score: 3,
        };

        let mut writer = ManagedWriter::with_registry(&registry);
        writer.write(&first).unwrap();
        assert!(writer.write_composite(&missing).is_err());
        assert_eq!(writer.schema().len(), 1);

        let message = writer.finish().unwrap();
        assert!(message.header().is_empty());
        assert_eq!(message.body().as_ref(), &7u32.to_le_bytes());
    }

    #[test]
    fn test_swapped_order_detected() {
        let registry = Registry::with_builtins();
        let message = encode(&registry, &("hello".to_string(), 42i32));

        // Same header length, different body interpretation
        let (decoded, _) = decode::<(i32, String)>(&registry, &message.to_bytes()).unwrap();
        assert_ne!(decoded, (42, "hello".to_string()));

        // Wider member than was written
        let message = encode(&registry, &(1i32, "hi".to_string()));
        assert!(decode::<(i64, String)>(&registry, &message.to_bytes()).is_err());
    }

    #[test]
    fn test_incomplete_input() {
        let registry = Registry::with_builtins();
        let bytes = encode(&registry, &(42i32, "hello".to_string())).to_bytes();

        let err = decode::<(i32, String)>(&registry, &bytes[..2]).unwrap_err();
        assert!(matches!(err, BufferError::Incomplete { needed: 2 }));

        let err = decode::<(i32, String)>(&registry, &bytes[..10]).unwrap_err();
        assert!(matches!(err, BufferError::Incomplete { needed: 3 }));
    }

    #[test]
    fn test_length_limit() {
        let registry = Registry::with_builtins();
        let text = "x".repeat(64);

        let mut writer = ManagedWriter::with_registry(&registry).with_max_length(16);
        let err = writer.write(&text).unwrap_err();
        assert!(matches!(err, BufferError::LengthTooLarge { length: 64, max: 16 }));

        // A forged header length is rejected before any body is read
        let bytes = [0xFF, 0xFF, 0xFF, 0x7F];
        let err = decode::<(String,)>(&registry, &bytes).unwrap_err();
        assert!(matches!(err, BufferError::LengthTooLarge { .. }));
    }

    #[test]
    fn test_invalid_utf8_body() {
        let registry = Registry::with_builtins();
        let bytes = [2, 0, 0, 0, 0xC3, 0x28];
        let err = decode::<(String,)>(&registry, &bytes).unwrap_err();
        assert!(matches!(err, BufferError::InvalidEncoding { .. }));
    }

    #[test]
    fn test_unsupported_member() {
        let registry = Registry::with_builtins();
        let mut reader = ManagedReader::with_registry(&registry);
        assert!(matches!(
            reader.add::<Vec<u8>>(),
            Err(BufferError::UnsupportedType { .. })
        ));
        assert!(matches!(
            reader.add::<isize>(),
            Err(BufferError::ReservedType { .. })
        ));

        let mut writer = ManagedWriter::with_registry(&registry);
        let value = vec![1u8];
        assert!(matches!(
            writer.write(&value),
            Err(BufferError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_schema_slots() {
        let registry = Registry::with_builtins();
        let mut schema = ManagedSchema::with_registry(&registry);
        schema
            .add_shape(&<(i32, String, Uuid, String)>::shape())
            .unwrap();

        assert_eq!(schema.header_length(), 2);
        assert_eq!(schema.header_size(), 8);
        assert_eq!(schema.header().unwrap().size(), 8);
        let managed: Vec<bool> = schema.slots().iter().map(Slot::is_managed).collect();
        assert_eq!(managed, vec![false, true, false, true]);
    }

    #[tokio::test]
    async fn test_stream_roundtrip() {
        let registry = Registry::with_builtins();
        let (mut client, mut server) = tokio::io::duplex(256);

        let first = (1u32, "alpha".to_string());
        let second = (2u32, "beta gamma".to_string());

        let mut writer = ManagedWriter::with_registry(&registry);
        writer.write_composite(&first).unwrap();
        writer.write_to(&mut client).await.unwrap();
        let mut writer = ManagedWriter::with_registry(&registry);
        writer.write_composite(&second).unwrap();
        writer.write_to(&mut client).await.unwrap();

        let mut reader = ManagedReader::with_registry(&registry);
        reader.add_composite::<(u32, String)>().unwrap();

        let a: (u32, String) = reader
            .read_from(&mut server)
            .await
            .unwrap()
            .construct()
            .unwrap();
        let b: (u32, String) = reader
            .read_from(&mut server)
            .await
            .unwrap()
            .construct()
            .unwrap();
        assert_eq!(a, first);
        assert_eq!(b, second);
    }

    #[tokio::test]
    async fn test_stream_truncated() {
        let registry = Registry::with_builtins();
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[5, 0, 0, 0, b'h', b'e']).await.unwrap();
        drop(client);

        let mut reader = ManagedReader::with_registry(&registry);
        reader.add::<String>().unwrap();
        let err = reader.read_from(&mut server).await.unwrap_err();
        assert!(matches!(err, BufferError::Io(_)));
        assert!(err.is_retryable());
    }
}
