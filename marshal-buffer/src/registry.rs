//! Resolver registry.
//!
//! A resolver is the codec for one non-primitive type. Fixed resolvers have a
//! constant width known before any value exists; managed resolvers produce a
//! length per value that travels in the message header.
//!
//! Registration is append-only. Each type identity owns at most one entry,
//! fixed or managed, and a concurrent race on the same identity is settled by
//! the map's entry lock: exactly one caller wins, every other caller receives
//! `DuplicateResolver`.

use crate::error::BufferError;
use crate::identity::TypeIdentity;
use crate::primitive::PrimitiveKind;
use crate::reader::BufferReader;
use crate::resolvers::{TextResolver, TimestampResolver, UuidResolver};
use crate::schema::BufferSchema;
use crate::writer::BufferWriter;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::any::Any;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

/// Codec for a type with a constant encoded width.
pub trait FixedResolver<T: Any + Send>: Send + Sync + 'static {
    /// Encoded width in bytes.
    fn width(&self) -> usize;

    /// Writes exactly `width()` bytes.
    fn write(&self, writer: &mut BufferWriter<'_>, value: &T) -> Result<(), BufferError>;

    /// Reads exactly `width()` bytes.
    fn read(&self, reader: &mut BufferReader<'_>) -> Result<T, BufferError>;
}

/// Codec for a type whose encoded width depends on the value.
pub trait ManagedResolver<T: Any + Send>: Send + Sync + 'static {
    /// Encode-ready form produced by [`convert`](Self::convert).
    type Intermediate: Send + 'static;

    /// Converts a value into its intermediate form and exact body length.
    fn convert(&self, value: &T) -> Result<(Self::Intermediate, u32), BufferError>;

    /// Adds the body contribution of a converted value to `schema`.
    fn write_add(
        &self,
        schema: &mut BufferSchema<'_>,
        _intermediate: &Self::Intermediate,
        length: u32,
    ) -> Result<(), BufferError> {
        self.read_add(schema, length)
    }

    /// Writes exactly the converted length.
    fn write(
        &self,
        writer: &mut BufferWriter<'_>,
        intermediate: &Self::Intermediate,
    ) -> Result<(), BufferError>;

    /// Adds the body contribution of a value of `length` bytes to `schema`.
    fn read_add(&self, schema: &mut BufferSchema<'_>, length: u32) -> Result<(), BufferError> {
        schema.reserve(TypeIdentity::of::<T>(), length as usize)
    }

    /// Reads exactly `length` bytes.
    fn read(&self, reader: &mut BufferReader<'_>, length: u32) -> Result<T, BufferError>;
}

/// Type-erased fixed resolver stored in the registry.
pub trait DynFixedResolver: Send + Sync {
    fn identity(&self) -> TypeIdentity;

    fn width(&self) -> usize;

    fn write_any(&self, writer: &mut BufferWriter<'_>, value: &dyn Any)
        -> Result<(), BufferError>;

    fn read_any(&self, reader: &mut BufferReader<'_>) -> Result<Box<dyn Any + Send>, BufferError>;
}

/// A managed value after `convert`, ready for the body pass.
pub struct Converted {
    intermediate: Box<dyn Any + Send>,
    length: u32,
}

impl Converted {
    pub fn length(&self) -> u32 {
        self.length
    }
}

impl std::fmt::Debug for Converted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converted")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Type-erased managed resolver stored in the registry.
pub trait DynManagedResolver: Send + Sync {
    fn identity(&self) -> TypeIdentity;

    fn convert_any(&self, value: &dyn Any) -> Result<Converted, BufferError>;

    fn write_add_any(
        &self,
        schema: &mut BufferSchema<'_>,
        converted: &Converted,
    ) -> Result<(), BufferError>;

    fn write_any(
        &self,
        writer: &mut BufferWriter<'_>,
        converted: &Converted,
    ) -> Result<(), BufferError>;

    fn read_add_any(&self, schema: &mut BufferSchema<'_>, length: u32)
        -> Result<(), BufferError>;

    fn read_any(
        &self,
        reader: &mut BufferReader<'_>,
        length: u32,
    ) -> Result<Box<dyn Any + Send>, BufferError>;
}

struct FixedAdapter<T, R> {
    resolver: R,
    _marker: PhantomData<fn() -> T>,
}

fn not_a<T: Any>() -> BufferError {
    let identity = TypeIdentity::of::<T>();
    BufferError::shape(
        identity.name(),
        format!("member value is not a {}", identity.short_name()),
    )
}

fn check_width<T: Any>(declared: usize, actual: usize) -> Result<(), BufferError> {
    if declared != actual {
        return Err(BufferError::ResolverWidth {
            type_name: TypeIdentity::of::<T>().name(),
            declared,
            actual,
        });
    }
    Ok(())
}

impl<T, R> DynFixedResolver for FixedAdapter<T, R>
where
    T: Any + Send,
    R: FixedResolver<T>,
{
    fn identity(&self) -> TypeIdentity {
        TypeIdentity::of::<T>()
    }

    fn width(&self) -> usize {
        self.resolver.width()
    }

    fn write_any(
        &self,
        writer: &mut BufferWriter<'_>,
        value: &dyn Any,
    ) -> Result<(), BufferError> {
        let value = value.downcast_ref::<T>().ok_or_else(not_a::<T>)?;
        let start = writer.position();
        self.resolver.write(writer, value)?;
        check_width::<T>(self.resolver.width(), writer.position() - start)
    }

    fn read_any(&self, reader: &mut BufferReader<'_>) -> Result<Box<dyn Any + Send>, BufferError> {
        let start = reader.position();
        let value = self.resolver.read(reader)?;
        check_width::<T>(self.resolver.width(), reader.position() - start)?;
        Ok(Box::new(value))
    }
}

struct ManagedAdapter<T, R> {
    resolver: R,
    _marker: PhantomData<fn() -> T>,
}

impl<T, R> ManagedAdapter<T, R>
where
    T: Any + Send,
    R: ManagedResolver<T>,
{
    fn intermediate<'c>(&self, converted: &'c Converted) -> Result<&'c R::Intermediate, BufferError> {
        converted
            .intermediate
            .downcast_ref::<R::Intermediate>()
            .ok_or_else(not_a::<R::Intermediate>)
    }
}

impl<T, R> DynManagedResolver for ManagedAdapter<T, R>
where
    T: Any + Send,
    R: ManagedResolver<T>,
{
    fn identity(&self) -> TypeIdentity {
        TypeIdentity::of::<T>()
    }

    fn convert_any(&self, value: &dyn Any) -> Result<Converted, BufferError> {
        let value = value.downcast_ref::<T>().ok_or_else(not_a::<T>)?;
        let (intermediate, length) = self.resolver.convert(value)?;
        Ok(Converted {
            intermediate: Box::new(intermediate),
            length,
        })
    }

    fn write_add_any(
        &self,
        schema: &mut BufferSchema<'_>,
        converted: &Converted,
    ) -> Result<(), BufferError> {
        let intermediate = self.intermediate(converted)?;
        self.resolver
            .write_add(schema, intermediate, converted.length)
    }

    fn write_any(
        &self,
        writer: &mut BufferWriter<'_>,
        converted: &Converted,
    ) -> Result<(), BufferError> {
        let intermediate = self.intermediate(converted)?;
        let start = writer.position();
        self.resolver.write(writer, intermediate)?;
        check_width::<T>(converted.length as usize, writer.position() - start)
    }

    fn read_add_any(
        &self,
        schema: &mut BufferSchema<'_>,
        length: u32,
    ) -> Result<(), BufferError> {
        self.resolver.read_add(schema, length)
    }

    fn read_any(
        &self,
        reader: &mut BufferReader<'_>,
        length: u32,
    ) -> Result<Box<dyn Any + Send>, BufferError> {
        let start = reader.position();
        let value = self.resolver.read(reader, length)?;
        check_width::<T>(length as usize, reader.position() - start)?;
        Ok(Box::new(value))
    }
}

/// A registered resolver.
#[derive(Clone)]
pub enum Resolver {
    Fixed(Arc<dyn DynFixedResolver>),
    Managed(Arc<dyn DynManagedResolver>),
}

impl Resolver {
    pub fn fixed<T, R>(resolver: R) -> Self
    where
        T: Any + Send,
        R: FixedResolver<T>,
    {
        Resolver::Fixed(Arc::new(FixedAdapter {
            resolver,
            _marker: PhantomData,
        }))
    }

    pub fn managed<T, R>(resolver: R) -> Self
    where
        T: Any + Send,
        R: ManagedResolver<T>,
    {
        Resolver::Managed(Arc::new(ManagedAdapter {
            resolver,
            _marker: PhantomData,
        }))
    }

    pub fn is_managed(&self) -> bool {
        matches!(self, Resolver::Managed(_))
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolver::Fixed(r) => write!(f, "Fixed({}, {} bytes)", r.identity(), r.width()),
            Resolver::Managed(r) => write!(f, "Managed({})", r.identity()),
        }
    }
}

/// Append-only map from type identity to resolver.
pub struct Registry {
    resolvers: DashMap<TypeIdentity, Resolver>,
}

impl Registry {
    /// Creates an empty registry with no built-in resolvers.
    pub fn new() -> Self {
        Self {
            resolvers: DashMap::new(),
        }
    }

    /// Creates a registry holding the built-in resolvers: the 16-byte UUID
    /// and the 12-byte timestamp (fixed), and UTF-8 text (managed).
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.resolvers.insert(
            TypeIdentity::of::<uuid::Uuid>(),
            Resolver::fixed(UuidResolver),
        );
        registry.resolvers.insert(
            TypeIdentity::of::<crate::Timestamp>(),
            Resolver::fixed(TimestampResolver),
        );
        registry.resolvers.insert(
            TypeIdentity::of::<String>(),
            Resolver::managed(TextResolver),
        );
        registry
    }

    /// The process-wide registry, initialized with built-ins on first use.
    ///
    /// Applications extend it by registering their resolvers during startup,
    /// before the first message using those types is encoded.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::with_builtins)
    }

    /// Registers a fixed-width resolver for `T`.
    pub fn register_fixed<T, R>(&self, resolver: R) -> Result<(), BufferError>
    where
        T: Any + Send,
        R: FixedResolver<T>,
    {
        self.insert(TypeIdentity::of::<T>(), Resolver::fixed(resolver))
    }

    /// Registers a managed (variable-length) resolver for `T`.
    pub fn register_managed<T, R>(&self, resolver: R) -> Result<(), BufferError>
    where
        T: Any + Send,
        R: ManagedResolver<T>,
    {
        self.insert(TypeIdentity::of::<T>(), Resolver::managed(resolver))
    }

    fn insert(&self, identity: TypeIdentity, resolver: Resolver) -> Result<(), BufferError> {
        // Primitives are built into the codec and count as registered.
        if PrimitiveKind::classify(identity)?.is_some() {
            return Err(BufferError::DuplicateResolver {
                type_name: identity.name(),
            });
        }

        match self.resolvers.entry(identity) {
            Entry::Occupied(_) => Err(BufferError::DuplicateResolver {
                type_name: identity.name(),
            }),
            Entry::Vacant(slot) => {
                tracing::debug!(
                    type_name = identity.name(),
                    managed = resolver.is_managed(),
                    "registered resolver"
                );
                slot.insert(resolver);
                Ok(())
            }
        }
    }

    pub fn resolve(&self, identity: TypeIdentity) -> Option<Resolver> {
        self.resolvers.get(&identity).map(|entry| entry.value().clone())
    }

    pub fn resolve_fixed(&self, identity: TypeIdentity) -> Option<Arc<dyn DynFixedResolver>> {
        match self.resolve(identity)? {
            Resolver::Fixed(r) => Some(r),
            Resolver::Managed(_) => None,
        }
    }

    pub fn resolve_managed(&self, identity: TypeIdentity) -> Option<Arc<dyn DynManagedResolver>> {
        match self.resolve(identity)? {
            Resolver::Managed(r) => Some(r),
            Resolver::Fixed(_) => None,
        }
    }

    /// Whether `identity` can be laid out in a fixed buffer.
    pub fn is_supported(&self, identity: TypeIdentity) -> bool {
        match PrimitiveKind::classify(identity) {
            Ok(Some(_)) => true,
            Ok(None) => self.resolve_fixed(identity).is_some(),
            Err(_) => false,
        }
    }

    /// Whether `identity` can be part of a managed message.
    pub fn is_supported_managed(&self, identity: TypeIdentity) -> bool {
        self.is_supported(identity) || self.resolve_managed(identity).is_some()
    }

    /// Static width of a fixed type: a primitive or a fixed resolver.
    pub fn fixed_width(&self, identity: TypeIdentity) -> Result<usize, BufferError> {
        if let Some(kind) = PrimitiveKind::classify(identity)? {
            return Ok(kind.width());
        }

        self.resolve_fixed(identity)
            .map(|r| r.width())
            .ok_or(BufferError::UnsupportedType {
                type_name: identity.name(),
            })
    }

    /// Number of registered resolvers.
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Timestamp;
    use std::sync::Barrier;
    use std::thread;
    use uuid::Uuid;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Rgb(u8, u8, u8);

    struct RgbResolver;

    impl FixedResolver<Rgb> for RgbResolver {
        fn width(&self) -> usize {
            3
        }

        fn write(&self, writer: &mut BufferWriter<'_>, value: &Rgb) -> Result<(), BufferError> {
            writer.write_bytes(&[value.0, value.1, value.2])
        }

        fn read(&self, reader: &mut BufferReader<'_>) -> Result<Rgb, BufferError> {
            let bytes = reader.read_bytes(3)?;
            Ok(Rgb(bytes[0], bytes[1], bytes[2]))
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = Registry::with_builtins();
        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.fixed_width(TypeIdentity::of::<Uuid>()).unwrap(),
            16
        );
        assert_eq!(
            registry.fixed_width(TypeIdentity::of::<Timestamp>()).unwrap(),
            12
        );
        assert!(registry
            .resolve_managed(TypeIdentity::of::<String>())
            .is_some());
        assert!(registry.resolve_fixed(TypeIdentity::of::<String>()).is_none());
    }

    #[test]
    fn test_empty_registry() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        assert!(!registry.is_supported(TypeIdentity::of::<Uuid>()));
        assert!(registry.is_supported(TypeIdentity::of::<u64>()));
    }

    #[test]
    fn test_register_fixed() {
        let registry = Registry::with_builtins();
        registry.register_fixed(RgbResolver).unwrap();

        assert!(registry.is_supported(TypeIdentity::of::<Rgb>()));
        assert_eq!(registry.fixed_width(TypeIdentity::of::<Rgb>()).unwrap(), 3);
    }

    #[test]
    fn test_duplicate_fixed_registration() {
        let registry = Registry::with_builtins();
        registry.register_fixed(RgbResolver).unwrap();

        let err = registry.register_fixed(RgbResolver).unwrap_err();
        assert!(matches!(err, BufferError::DuplicateResolver { .. }));

        // The original entry is untouched
        assert_eq!(registry.fixed_width(TypeIdentity::of::<Rgb>()).unwrap(), 3);
    }

    #[test]
    fn test_duplicate_builtin_registration() {
        let registry = Registry::with_builtins();
        let err = registry.register_fixed(UuidResolver).unwrap_err();
        assert!(matches!(err, BufferError::DuplicateResolver { .. }));

        let err = registry.register_managed(TextResolver).unwrap_err();
        assert!(matches!(err, BufferError::DuplicateResolver { .. }));
    }

    #[test]
    fn test_primitive_and_reserved_registration_rejected() {
        struct U32Resolver;

        impl FixedResolver<u32> for U32Resolver {
            fn width(&self) -> usize {
                4
            }

            fn write(&self, w: &mut BufferWriter<'_>, v: &u32) -> Result<(), BufferError> {
                w.write_bytes(&v.to_le_bytes())
            }

            fn read(&self, r: &mut BufferReader<'_>) -> Result<u32, BufferError> {
                let b = r.read_bytes(4)?;
                Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            }
        }

        struct UsizeResolver;

        impl FixedResolver<usize> for UsizeResolver {
            fn width(&self) -> usize {
                8
            }

            fn write(&self, w: &mut BufferWriter<'_>, v: &usize) -> Result<(), BufferError> {
                w.write_bytes(&(*v as u64).to_le_bytes())
            }

            fn read(&self, r: &mut BufferReader<'_>) -> Result<usize, BufferError> {
                r.read_bytes(8)?;
                Ok(0)
            }
        }

        let registry = Registry::new();
        assert!(matches!(
            registry.register_fixed(U32Resolver),
            Err(BufferError::DuplicateResolver { .. })
        ));
        assert!(matches!(
            registry.register_fixed(UsizeResolver),
            Err(BufferError::ReservedType { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unrelated_registration_keeps_lookups() {
        let registry = Registry::with_builtins();
        let before = registry.fixed_width(TypeIdentity::of::<Timestamp>()).unwrap();

        registry.register_fixed(RgbResolver).unwrap();

        assert_eq!(
            registry.fixed_width(TypeIdentity::of::<Timestamp>()).unwrap(),
            before
        );
        assert!(registry
            .resolve_managed(TypeIdentity::of::<String>())
            .is_some());
    }

    #[test]
    fn test_reserved_and_unknown_support() {
        let registry = Registry::with_builtins();
        assert!(!registry.is_supported(TypeIdentity::of::<usize>()));
        assert!(!registry.is_supported_managed(TypeIdentity::of::<isize>()));
        assert!(!registry.is_supported(TypeIdentity::of::<String>()));
        assert!(registry.is_supported_managed(TypeIdentity::of::<String>()));
        assert!(!registry.is_supported_managed(TypeIdentity::of::<Vec<u8>>()));

        assert!(matches!(
            registry.fixed_width(TypeIdentity::of::<usize>()),
            Err(BufferError::ReservedType { .. })
        ));
        assert!(matches!(
            registry.fixed_width(TypeIdentity::of::<Vec<u8>>()),
            Err(BufferError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_concurrent_registration_single_winner() {
        let registry = Arc::new(Registry::new());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    registry.register_fixed(RgbResolver).is_ok()
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(wins, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_global_has_builtins() {
        let global = Registry::global();
        assert!(global.is_supported(TypeIdentity::of::<Uuid>()));
        assert!(global.is_supported_managed(TypeIdentity::of::<String>()));
        assert!(std::ptr::eq(global, Registry::global()));
    }

    #[test]
    fn test_resolver_debug() {
        let registry = Registry::with_builtins();
        let fixed = registry.resolve(TypeIdentity::of::<Uuid>()).unwrap();
        assert!(format!("{:?}", fixed).contains("16 bytes"));
        assert!(!fixed.is_managed());

        let managed = registry.resolve(TypeIdentity::of::<String>()).unwrap();
        assert!(managed.is_managed());
    }
}
