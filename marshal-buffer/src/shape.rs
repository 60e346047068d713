//! Composite shapes.
//!
//! A composite is any value with an ordered list of members: tuples in
//! positional order, structs in field declaration order. The [`Composite`]
//! trait exposes that order three ways that must agree:
//!
//! - [`Composite::shape`] lists the member types, used to size buffers and
//!   to drive every read pass;
//! - [`Composite::members`] borrows the member values of one instance, used by
//!   write passes (checked against the shape before anything is written);
//! - [`Composite::construct`] rebuilds an instance from decoded members,
//!   consuming them front to back.
//!
//! Tuples up to arity 8 implement it out of the box; structs use
//! [`composite!`](crate::composite) or a hand-written impl.

use crate::error::BufferError;
use crate::identity::TypeIdentity;
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;

/// Ordered member types of a composite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeShape {
    name: &'static str,
    members: Vec<TypeIdentity>,
}

impl CompositeShape {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            members: Vec::new(),
        }
    }

    pub fn of<C: Composite>() -> Self {
        C::shape()
    }

    /// Appends a member of type `T`.
    pub fn with<T: Any>(mut self) -> Self {
        self.members.push(TypeIdentity::of::<T>());
        self
    }

    pub fn push(&mut self, identity: TypeIdentity) {
        self.members.push(identity);
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn members(&self) -> &[TypeIdentity] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl fmt::Display for CompositeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, member) in self.members.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(member.short_name())?;
        }
        f.write_str(")")
    }
}

/// A borrowed member value.
#[derive(Clone, Copy)]
pub struct Member<'a> {
    identity: TypeIdentity,
    value: Option<&'a dyn Any>,
}

impl<'a> Member<'a> {
    pub fn of<T: Any>(value: &'a T) -> Self {
        Self {
            identity: TypeIdentity::of::<T>(),
            value: Some(value),
        }
    }

    /// A member of type `T` with no value. Writing it fails with `NullValue`.
    pub fn absent<T: Any>() -> Self {
        Self {
            identity: TypeIdentity::of::<T>(),
            value: None,
        }
    }

    /// A member of type `T` that may be missing.
    pub fn optional<T: Any>(value: &'a Option<T>) -> Self {
        Self {
            identity: TypeIdentity::of::<T>(),
            value: value.as_ref().map(|v| v as &dyn Any),
        }
    }

    pub fn identity(&self) -> TypeIdentity {
        self.identity
    }

    pub fn value(&self) -> Option<&'a dyn Any> {
        self.value
    }

    pub fn is_absent(&self) -> bool {
        self.value.is_none()
    }
}

impl fmt::Debug for Member<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("identity", &self.identity)
            .field("present", &self.value.is_some())
            .finish()
    }
}

/// Decoded members awaiting construction, front first.
pub struct MemberValues {
    composite: &'static str,
    values: VecDeque<(TypeIdentity, Box<dyn Any + Send>)>,
}

impl MemberValues {
    pub fn new(composite: &'static str) -> Self {
        Self::with_capacity(composite, 0)
    }

    pub fn with_capacity(composite: &'static str, capacity: usize) -> Self {
        Self {
            composite,
            values: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, identity: TypeIdentity, value: Box<dyn Any + Send>) {
        self.values.push_back((identity, value));
    }

    /// Takes the next member as a `T`.
    pub fn take<T: Any>(&mut self) -> Result<T, BufferError> {
        let (identity, value) = self.take_any()?;
        value.downcast::<T>().map(|v| *v).map_err(|_| {
            BufferError::shape(
                self.composite,
                format!(
                    "constructor expected {} but next member is {}",
                    TypeIdentity::of::<T>().short_name(),
                    identity.short_name()
                ),
            )
        })
    }

    /// Takes the next member without a type check.
    pub fn take_any(&mut self) -> Result<(TypeIdentity, Box<dyn Any + Send>), BufferError> {
        self.values
            .pop_front()
            .ok_or_else(|| BufferError::shape(self.composite, "constructor ran out of members"))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Builds a `C`, requiring its constructor to consume every member.
    pub fn construct<C: Composite>(mut self) -> Result<C, BufferError> {
        let value = C::construct(&mut self)?;
        if !self.values.is_empty() {
            return Err(BufferError::shape(
                self.composite,
                format!("constructor left {} members unconsumed", self.values.len()),
            ));
        }
        Ok(value)
    }
}

impl IntoIterator for MemberValues {
    type Item = (TypeIdentity, Box<dyn Any + Send>);
    type IntoIter = std::collections::vec_deque::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl fmt::Debug for MemberValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberValues")
            .field("composite", &self.composite)
            .field(
                "members",
                &self.values.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Values with an ordered member list and a typed constructor.
pub trait Composite: Sized + 'static {
    /// Member types in declaration order.
    fn shape() -> CompositeShape;

    /// Borrowed members of `self`, in the same order as [`shape`](Self::shape).
    fn members(&self) -> Vec<Member<'_>>;

    /// Rebuilds a value, taking members front to back.
    fn construct(values: &mut MemberValues) -> Result<Self, BufferError>;
}

/// Verifies that borrowed members line up with the declared shape.
pub(crate) fn check_members(
    shape: &CompositeShape,
    members: &[Member<'_>],
) -> Result<(), BufferError> {
    if shape.len() != members.len() {
        return Err(BufferError::shape(
            shape.name(),
            format!(
                "shape declares {} members, value has {}",
                shape.len(),
                members.len()
            ),
        ));
    }

    for (index, (declared, member)) in shape.members().iter().zip(members).enumerate() {
        if *declared != member.identity() {
            return Err(BufferError::shape(
                shape.name(),
                format!(
                    "member {} is {} but shape declares {}",
                    index,
                    member.identity().short_name(),
                    declared.short_name()
                ),
            ));
        }
    }
    Ok(())
}

impl Composite for () {
    fn shape() -> CompositeShape {
        CompositeShape::new("()")
    }

    fn members(&self) -> Vec<Member<'_>> {
        Vec::new()
    }

    fn construct(_values: &mut MemberValues) -> Result<Self, BufferError> {
        Ok(())
    }
}

macro_rules! impl_tuple_composite {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: Any + Send),+> Composite for ($($name,)+) {
            fn shape() -> CompositeShape {
                CompositeShape::new(std::any::type_name::<Self>())$(.with::<$name>())+
            }

            fn members(&self) -> Vec<Member<'_>> {
                vec![$(Member::of(&self.$idx)),+]
            }

            fn construct(values: &mut MemberValues) -> Result<Self, BufferError> {
                Ok(($(values.take::<$name>()?,)+))
            }
        }
    };
}

impl_tuple_composite!(A: 0);
impl_tuple_composite!(A: 0, B: 1);
impl_tuple_composite!(A: 0, B: 1, C: 2);
impl_tuple_composite!(A: 0, B: 1, C: 2, D: 3);
impl_tuple_composite!(A: 0, B: 1, C: 2, D: 3, E: 4);
impl_tuple_composite!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
impl_tuple_composite!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
impl_tuple_composite!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);

/// Implements [`Composite`] for a struct with named fields.
///
/// Fields are listed in declaration order; that order is the wire order.
///
/// ```
/// use marshal_buffer::composite;
///
/// #[derive(Debug, PartialEq)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// composite!(Point { x: i32, y: i32 });
///
/// let bytes = marshal_buffer::encode(&Point { x: 1, y: -1 }).unwrap();
/// assert_eq!(bytes.len(), 8);
/// ```
#[macro_export]
macro_rules! composite {
    ($ty:ident { $($field:ident : $fty:ty),* $(,)? }) => {
        impl $crate::Composite for $ty {
            fn shape() -> $crate::CompositeShape {
                $crate::CompositeShape::new(stringify!($ty))$(.with::<$fty>())*
            }

            fn members(&self) -> ::std::vec::Vec<$crate::Member<'_>> {
                ::std::vec![$($crate::Member::of(&self.$field)),*]
            }

            fn construct(
                values: &mut $crate::MemberValues,
            ) -> ::std::result::Result<Self, $crate::BufferError> {
                let _ = &values;
                ::std::result::Result::Ok(Self {
                    $($field: values.take::<$fty>()?),*
                })
            }
        }
    };
}
