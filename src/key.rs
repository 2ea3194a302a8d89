//! Service type identities and cache keys.

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::constructor::{Constructor, Injectable};

/// Runtime identity of a Rust type with its name for diagnostics.
///
/// Equality and hashing use the `TypeId` only.
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    pub id: TypeId,
    pub name: &'static str,
}

impl TypeInfo {
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Name without the module path.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        match base.rsplit_once("::") {
            Some((_, short)) => &self.name[base.len() - short.len()..],
            None => self.name,
        }
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A closed generic service type together with the open definition it belongs to.
///
/// Built by [`ServiceType::generic`] from a type implementing [`Generic`].
pub struct GenericType {
    pub(crate) closed: TypeInfo,
    pub(crate) definition: TypeInfo,
    pub(crate) arguments: Box<[ServiceType]>,
    pub(crate) constructors: fn() -> Vec<Constructor>,
}

impl GenericType {
    pub fn definition(&self) -> TypeInfo {
        self.definition
    }

    pub fn arguments(&self) -> &[ServiceType] {
        &self.arguments
    }
}

impl fmt::Debug for GenericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericType")
            .field("closed", &self.closed.name)
            .field("definition", &self.definition.name)
            .field("arguments", &self.arguments)
            .finish()
    }
}

/// A closed generic service that can be produced from an open registration.
///
/// Rust monomorphizes generics at compile time, so the closed type carries its
/// own constructors (via [`Injectable`]) and names the open definition marker
/// it specializes. An open registration made with
/// [`ServiceCollection::add_open_generic`](crate::ServiceCollection::add_open_generic)
/// for `Definition` then serves every closed type that names it.
///
/// # Examples
///
/// ```rust
/// use callsite_di::{Constructor, Generic, Injectable, Lifetime, Resolver, ServiceCollection, ServiceType};
/// use std::marker::PhantomData;
///
/// struct RepositoryDef;
///
/// struct Repository<T> { _entity: PhantomData<T> }
///
/// impl<T: Send + Sync + 'static> Injectable for Repository<T> {
///     fn constructors() -> Vec<Constructor> {
///         vec![Constructor::of::<Self>().build(|_| Ok(Repository { _entity: PhantomData }))]
///     }
/// }
///
/// impl<T: Send + Sync + 'static> Generic for Repository<T> {
///     type Definition = RepositoryDef;
///     fn type_arguments() -> Vec<ServiceType> {
///         vec![ServiceType::of::<T>()]
///     }
/// }
///
/// struct User;
///
/// let mut services = ServiceCollection::new();
/// services.add_open_generic::<RepositoryDef>(Lifetime::Singleton);
///
/// let provider = services.build();
/// let a = provider.get_generic::<Repository<User>>().unwrap();
/// let b = provider.get_generic::<Repository<User>>().unwrap();
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
/// ```
pub trait Generic: Injectable {
    /// Marker type naming the open definition.
    type Definition: ?Sized + 'static;

    /// The closed type arguments, in declaration order.
    fn type_arguments() -> Vec<ServiceType>;
}

/// Identity of a requested or registered service.
///
/// # Variants
///
/// - **Type**: a concrete type or a trait object (`dyn Trait`)
/// - **Generic**: a closed generic type that open registrations may serve
/// - **Enumerable**: the collection of all registrations of an element type
///
/// A `Generic` request is a distinct identity from a plain `Type` request of
/// the same closed type, since only the former may be served by an open
/// registration. Exact registrations of the closed type serve both.
#[derive(Clone)]
pub enum ServiceType {
    Type(TypeInfo),
    Generic(Arc<GenericType>),
    Enumerable(Arc<ServiceType>),
}

impl ServiceType {
    /// Service type of `T`, which may be a trait object.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        ServiceType::Type(TypeInfo::of::<T>())
    }

    /// Service type of a closed generic `T`.
    pub fn generic<T: Generic>() -> Self {
        ServiceType::Generic(Arc::new(GenericType {
            closed: TypeInfo::of::<T>(),
            definition: TypeInfo::of::<T::Definition>(),
            arguments: T::type_arguments().into_boxed_slice(),
            constructors: T::constructors,
        }))
    }

    /// Collection of all services registered as `element`.
    pub fn enumerable(element: ServiceType) -> Self {
        ServiceType::Enumerable(Arc::new(element))
    }

    /// Collection of all services registered as `T`.
    pub fn enumerable_of<T: ?Sized + 'static>() -> Self {
        Self::enumerable(Self::of::<T>())
    }

    /// The type name used in diagnostics. Collections report their element name.
    pub fn name(&self) -> &'static str {
        match self {
            ServiceType::Type(info) => info.name,
            ServiceType::Generic(generic) => generic.closed.name,
            ServiceType::Enumerable(element) => element.name(),
        }
    }

    /// The `TypeId` of the service, `None` for collections.
    pub fn type_id(&self) -> Option<TypeId> {
        match self {
            ServiceType::Type(info) => Some(info.id),
            ServiceType::Generic(generic) => Some(generic.closed.id),
            ServiceType::Enumerable(_) => None,
        }
    }

    pub fn element(&self) -> Option<&ServiceType> {
        match self {
            ServiceType::Enumerable(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_generic(&self) -> Option<&GenericType> {
        match self {
            ServiceType::Generic(generic) => Some(generic),
            _ => None,
        }
    }

    pub fn is_enumerable(&self) -> bool {
        matches!(self, ServiceType::Enumerable(_))
    }

    /// Identity under which exact registrations are stored: a closed generic
    /// request maps to its plain type.
    pub(crate) fn canonical(&self) -> ServiceType {
        match self {
            ServiceType::Generic(generic) => ServiceType::Type(generic.closed),
            other => other.clone(),
        }
    }
}

impl PartialEq for ServiceType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ServiceType::Type(a), ServiceType::Type(b)) => a == b,
            (ServiceType::Generic(a), ServiceType::Generic(b)) => a.closed == b.closed,
            (ServiceType::Enumerable(a), ServiceType::Enumerable(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ServiceType {}

impl Hash for ServiceType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            ServiceType::Type(info) => {
                0u8.hash(state);
                info.id.hash(state);
            }
            ServiceType::Enumerable(element) => {
                1u8.hash(state);
                element.hash(state);
            }
            ServiceType::Generic(generic) => {
                2u8.hash(state);
                generic.closed.id.hash(state);
            }
        }
    }
}

impl fmt::Debug for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceType::Enumerable(element) => write!(f, "Enumerable<{element}>"),
            other => f.write_str(other.name()),
        }
    }
}

/// Key for cached call sites and cached instances.
///
/// `slot` counts registrations of the same service type from the last one:
/// the last registration has slot 0, so single resolution and the last
/// element of a collection share one cached instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub service_type: ServiceType,
    pub slot: usize,
}

impl CacheKey {
    #[inline]
    pub fn new(service_type: ServiceType, slot: usize) -> Self {
        Self { service_type, slot }
    }
}
