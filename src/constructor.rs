//! Constructor candidates for implementation-type registrations.
//!
//! Rust has no runtime reflection, so a type that the engine activates on its
//! own lists its constructors explicitly through [`Injectable`]. Each
//! [`Constructor`] declares the service types it consumes and a body that
//! receives the resolved values through [`Args`], in declaration order.

use std::any::type_name;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::internal::Disposable;
use crate::key::{Generic, ServiceType};
use crate::provider::{ActivatorFactory, Scope, ScopeFactory};
use crate::registration::{downcast, downcast_all, downcast_trait, AnyArc};
use crate::traits::{AsyncDispose, Dispose};

/// Type-erased constructor body.
pub type ActivateFn = Arc<dyn Fn(&mut Args<'_>) -> DiResult<Produced> + Send + Sync>;

/// A type the engine can activate from registered services.
///
/// # Examples
///
/// ```rust
/// use callsite_di::{Constructor, Injectable, Lifetime, Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// struct Clock;
/// struct Greeter { clock: Arc<Clock>, greeting: Arc<String> }
///
/// impl Injectable for Clock {
///     fn constructors() -> Vec<Constructor> {
///         vec![Constructor::of::<Self>().build(|_| Ok(Clock))]
///     }
/// }
///
/// impl Injectable for Greeter {
///     fn constructors() -> Vec<Constructor> {
///         vec![
///             Constructor::of::<Self>()
///                 .param::<Clock>()
///                 .param_or::<String>("hello".to_string())
///                 .build(|args| Ok(Greeter { clock: args.next()?, greeting: args.next()? })),
///         ]
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton_type::<Clock>();
/// services.add_transient_type::<Greeter>();
///
/// let provider = services.build();
/// let greeter = provider.get_required::<Greeter>();
/// assert_eq!(greeter.greeting.as_str(), "hello");
/// ```
pub trait Injectable: Send + Sync + 'static {
    /// Candidate constructors in declaration order.
    fn constructors() -> Vec<Constructor>;
}

/// A declared constructor parameter.
#[derive(Clone)]
pub struct Parameter {
    pub(crate) service_type: ServiceType,
    pub(crate) default: Option<AnyArc>,
}

impl Parameter {
    pub fn service_type(&self) -> &ServiceType {
        &self.service_type
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

impl std::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("service_type", &self.service_type)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// One constructor candidate of an implementation type.
#[derive(Clone)]
pub struct Constructor {
    pub(crate) implementation: &'static str,
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) preferred: bool,
    pub(crate) activate: ActivateFn,
}

impl Constructor {
    /// Starts declaring a constructor of `T`.
    pub fn of<T: Send + Sync + 'static>() -> ConstructorBuilder<T> {
        ConstructorBuilder {
            parameters: Vec::new(),
            preferred: false,
            _marker: PhantomData,
        }
    }

    pub fn implementation(&self) -> &'static str {
        self.implementation
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_preferred(&self) -> bool {
        self.preferred
    }

    pub(crate) fn same_signature(&self, other: &Constructor) -> bool {
        self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| a.service_type == b.service_type)
    }
}

impl std::fmt::Debug for Constructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constructor")
            .field("implementation", &self.implementation)
            .field("parameters", &self.parameters)
            .field("preferred", &self.preferred)
            .finish()
    }
}

/// Builder returned by [`Constructor::of`].
pub struct ConstructorBuilder<T> {
    parameters: Vec<Parameter>,
    preferred: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> ConstructorBuilder<T> {
    fn push(mut self, service_type: ServiceType, default: Option<AnyArc>) -> Self {
        self.parameters.push(Parameter {
            service_type,
            default,
        });
        self
    }

    /// Consumes a service of type `P`, which may be a trait object.
    pub fn param<P: ?Sized + 'static>(self) -> Self {
        self.push(ServiceType::of::<P>(), None)
    }

    /// Consumes `P` if it is registered, otherwise receives `default`.
    pub fn param_or<P: Send + Sync + 'static>(self, default: P) -> Self {
        self.push(ServiceType::of::<P>(), Some(Arc::new(default)))
    }

    /// Consumes every registration of `P`, in registration order.
    pub fn param_all<P: ?Sized + 'static>(self) -> Self {
        self.push(ServiceType::enumerable_of::<P>(), None)
    }

    /// Consumes a closed generic service.
    pub fn param_generic<P: Generic>(self) -> Self {
        self.push(ServiceType::generic::<P>(), None)
    }

    /// Consumes the scope the instance is resolved from.
    pub fn param_provider(self) -> Self {
        self.push(ServiceType::of::<Scope>(), None)
    }

    /// Consumes a factory for child scopes.
    pub fn param_scope_factory(self) -> Self {
        self.push(ServiceType::of::<ScopeFactory>(), None)
    }

    /// Consumes the service activator factory.
    pub fn param_activator_factory(self) -> Self {
        self.push(ServiceType::of::<ActivatorFactory>(), None)
    }

    /// Marks this constructor as the one to use regardless of arity.
    pub fn preferred(mut self) -> Self {
        self.preferred = true;
        self
    }

    fn finish<F>(self, activate: F) -> Constructor
    where
        F: Fn(&mut Args<'_>) -> DiResult<Produced> + Send + Sync + 'static,
    {
        Constructor {
            implementation: type_name::<T>(),
            parameters: self.parameters,
            preferred: self.preferred,
            activate: Arc::new(activate),
        }
    }

    /// Finishes the constructor with its body.
    pub fn build<F>(self, body: F) -> Constructor
    where
        F: Fn(&mut Args<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.finish(move |args| body(args).map(Produced::new))
    }

    /// Finishes a constructor whose instances are disposed with their owning scope.
    pub fn build_disposable<F>(self, body: F) -> Constructor
    where
        T: Dispose,
        F: Fn(&mut Args<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.finish(move |args| body(args).map(Produced::disposable))
    }

    /// Finishes a constructor whose instances need async disposal.
    pub fn build_async_disposable<F>(self, body: F) -> Constructor
    where
        T: AsyncDispose,
        F: Fn(&mut Args<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.finish(move |args| body(args).map(Produced::async_disposable))
    }
}

/// Resolved constructor arguments, consumed in declaration order.
pub struct Args<'a> {
    implementation: &'static str,
    values: &'a [AnyArc],
    position: usize,
}

impl<'a> Args<'a> {
    pub(crate) fn new(implementation: &'static str, values: &'a [AnyArc]) -> Self {
        Self {
            implementation,
            values,
            position: 0,
        }
    }

    fn take(&mut self) -> DiResult<AnyArc> {
        let value = self.values.get(self.position).cloned().ok_or_else(|| {
            DiError::activation(
                self.implementation,
                format!("argument {} was not declared", self.position),
            )
        })?;
        self.position += 1;
        Ok(value)
    }

    /// Next argument as a concrete service.
    pub fn next<T: Send + Sync + 'static>(&mut self) -> DiResult<Arc<T>> {
        downcast(self.take()?)
    }

    /// Next argument as a trait-object service.
    pub fn next_trait<I: ?Sized + Send + Sync + 'static>(&mut self) -> DiResult<Arc<I>> {
        downcast_trait(self.take()?)
    }

    /// Next argument as a collection of concrete services.
    pub fn next_all<T: Send + Sync + 'static>(&mut self) -> DiResult<Vec<Arc<T>>> {
        downcast_all(self.take()?, downcast::<T>)
    }

    /// Next argument as a collection of trait-object services.
    pub fn next_all_trait<I: ?Sized + Send + Sync + 'static>(&mut self) -> DiResult<Vec<Arc<I>>> {
        downcast_all(self.take()?, downcast_trait::<I>)
    }

    pub fn next_provider(&mut self) -> DiResult<Scope> {
        self.next::<Scope>().map(|scope| (*scope).clone())
    }

    pub fn next_scope_factory(&mut self) -> DiResult<ScopeFactory> {
        self.next::<ScopeFactory>().map(|factory| (*factory).clone())
    }

    pub fn next_activator_factory(&mut self) -> DiResult<ActivatorFactory> {
        self.next::<ActivatorFactory>().map(|factory| (*factory).clone())
    }

    /// Number of arguments not yet consumed.
    pub fn remaining(&self) -> usize {
        self.values.len().saturating_sub(self.position)
    }
}

/// A freshly activated value and its disposal capability.
pub struct Produced {
    pub(crate) value: AnyArc,
    pub(crate) disposable: Option<Disposable>,
}

impl Produced {
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            disposable: None,
        }
    }

    pub fn disposable<T: Dispose>(value: T) -> Self {
        let value = Arc::new(value);
        Self {
            disposable: Some(Disposable::Sync {
                service: type_name::<T>(),
                target: value.clone(),
            }),
            value,
        }
    }

    pub fn async_disposable<T: AsyncDispose>(value: T) -> Self {
        let value = Arc::new(value);
        Self {
            disposable: Some(Disposable::Async {
                service: type_name::<T>(),
                target: value.clone(),
            }),
            value,
        }
    }

    /// Wraps an already shared value that the engine must not dispose.
    pub(crate) fn shared(value: AnyArc) -> Self {
        Self {
            value,
            disposable: None,
        }
    }

    pub(crate) fn map_value(self, f: impl FnOnce(AnyArc) -> DiResult<AnyArc>) -> DiResult<Self> {
        Ok(Self {
            value: f(self.value)?,
            disposable: self.disposable,
        })
    }
}
