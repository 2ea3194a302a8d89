//! Service descriptors: the registration input of the engine.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use crate::constructor::{Constructor, Injectable, Produced};
use crate::error::DiResult;
use crate::key::{ServiceType, TypeInfo};
use crate::lifetime::Lifetime;
use crate::provider::Scope;
use crate::registration::{downcast, AnyArc};

/// Type-erased factory body. Receives the scope the service is resolved for.
pub type FactoryFn = Arc<dyn Fn(&Scope) -> DiResult<Produced> + Send + Sync>;

/// Converts an activated implementation into the registered service shape.
pub type CastFn = Arc<dyn Fn(AnyArc) -> DiResult<AnyArc> + Send + Sync>;

/// How a descriptor produces its service.
#[derive(Clone)]
pub enum Implementation {
    /// Activated by the engine through one of the type's constructors
    Type {
        implementation: &'static str,
        constructors: fn() -> Vec<Constructor>,
        cast: Option<CastFn>,
    },
    /// Produced by a user factory
    Factory {
        implementation: &'static str,
        factory: FactoryFn,
    },
    /// A fixed instance owned by the caller
    Instance {
        implementation: &'static str,
        value: AnyArc,
    },
    /// An open generic definition, specialized per closed request
    OpenGeneric { definition: TypeInfo },
}

impl Implementation {
    pub fn name(&self) -> &'static str {
        match self {
            Implementation::Type { implementation, .. }
            | Implementation::Factory { implementation, .. }
            | Implementation::Instance { implementation, .. } => implementation,
            Implementation::OpenGeneric { definition } => definition.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Implementation::Type { .. } => "Type",
            Implementation::Factory { .. } => "Factory",
            Implementation::Instance { .. } => "Instance",
            Implementation::OpenGeneric { .. } => "OpenGeneric",
        }
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.name())
    }
}

/// Immutable registration of one service.
///
/// Several descriptors may share a service type: the last one wins for
/// single resolution and all of them are visited, in registration order,
/// for collection resolution.
///
/// # Examples
///
/// ```rust
/// use callsite_di::{Lifetime, ServiceCollection};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {}
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {}
///
/// struct Repository;
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton("config".to_string());
/// services.add_scoped_factory::<Repository, _>(|_| Ok(Repository));
/// services.add_singleton_trait::<dyn Logger>(Arc::new(ConsoleLogger));
///
/// let descriptors = services.descriptors();
/// assert_eq!(descriptors.len(), 3);
///
/// let repository = descriptors.iter()
///     .find(|d| d.type_name().contains("Repository"))
///     .unwrap();
/// assert_eq!(repository.lifetime(), Lifetime::Scoped);
/// assert_eq!(repository.implementation().kind(), "Factory");
///
/// let scoped = descriptors.iter().filter(|d| d.lifetime() == Lifetime::Scoped).count();
/// assert_eq!(scoped, 1);
/// ```
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub(crate) service_type: ServiceType,
    pub(crate) lifetime: Lifetime,
    pub(crate) implementation: Implementation,
}

impl ServiceDescriptor {
    pub fn new(service_type: ServiceType, lifetime: Lifetime, implementation: Implementation) -> Self {
        Self {
            service_type,
            lifetime,
            implementation,
        }
    }

    /// Registers `T` activated through its own constructors.
    pub fn from_type<T: Injectable>(lifetime: Lifetime) -> Self {
        Self::new(
            ServiceType::of::<T>(),
            lifetime,
            Implementation::Type {
                implementation: type_name::<T>(),
                constructors: T::constructors,
                cast: None,
            },
        )
    }

    /// Registers `T` activated through its constructors, exposed as service `I`.
    pub fn from_type_as<I, T>(lifetime: Lifetime, cast: fn(Arc<T>) -> Arc<I>) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        T: Injectable,
    {
        let cast: CastFn = Arc::new(move |value| {
            let concrete = downcast::<T>(value)?;
            Ok(Arc::new(cast(concrete)) as AnyArc)
        });
        Self::new(
            ServiceType::of::<I>(),
            lifetime,
            Implementation::Type {
                implementation: type_name::<T>(),
                constructors: T::constructors,
                cast: Some(cast),
            },
        )
    }

    /// Registers a factory. The factory builds the final service value.
    pub fn from_factory(
        service_type: ServiceType,
        lifetime: Lifetime,
        implementation: &'static str,
        factory: FactoryFn,
    ) -> Self {
        Self::new(
            service_type,
            lifetime,
            Implementation::Factory {
                implementation,
                factory,
            },
        )
    }

    /// Registers a fixed singleton instance.
    pub fn from_instance(service_type: ServiceType, implementation: &'static str, value: AnyArc) -> Self {
        Self::new(
            service_type,
            Lifetime::Singleton,
            Implementation::Instance {
                implementation,
                value,
            },
        )
    }

    /// Registers the open definition marked by `Def`.
    pub fn open_generic<Def: ?Sized + 'static>(lifetime: Lifetime) -> Self {
        let definition = TypeInfo::of::<Def>();
        Self::new(
            ServiceType::Type(definition),
            lifetime,
            Implementation::OpenGeneric { definition },
        )
    }

    pub fn service_type(&self) -> &ServiceType {
        &self.service_type
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn implementation(&self) -> &Implementation {
        &self.implementation
    }

    /// Name of the registered service type.
    pub fn type_name(&self) -> &'static str {
        self.service_type.name()
    }

    /// Name of the type or factory output backing the service.
    pub fn implementation_name(&self) -> &'static str {
        self.implementation.name()
    }

    pub fn is_open_generic(&self) -> bool {
        matches!(self.implementation, Implementation::OpenGeneric { .. })
    }
}
