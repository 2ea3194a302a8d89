//! Service activators: pre-realized resolution of one service type, and
//! activation of unregistered types from caller-supplied arguments.

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use super::scope::Scope;
use crate::call_site::{select_constructor, Binding};
use crate::constructor::{ActivateFn, Args, Constructor, Injectable};
use crate::engine::{Engine, Realized};
use crate::error::{DiError, DiResult};
use crate::key::ServiceType;
use crate::registration::{downcast, downcast_trait, AnyArc};

/// Hands out [`ServiceActivator`]s for registered services.
///
/// # Examples
///
/// ```rust
/// use callsite_di::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct Session(u32);
///
/// let mut services = ServiceCollection::new();
/// services.add_scoped_factory::<Session, _>(|_| Ok(Session(1)));
/// let provider = services.build();
///
/// let activators = provider.activator_factory();
/// assert!(activators.create::<String>().unwrap().is_none());
///
/// let sessions = activators.create::<Session>().unwrap().unwrap();
/// let scope = provider.create_scope();
/// let a = sessions.get(&scope).unwrap();
/// let b = scope.get_required::<Session>();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
#[derive(Clone)]
pub struct ActivatorFactory {
    engine: Arc<Engine>,
}

impl ActivatorFactory {
    pub(crate) fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    /// Activator for concrete service `T`, `None` if `T` is not registered.
    pub fn create<T: Send + Sync + 'static>(&self) -> DiResult<Option<ServiceActivator<T>>> {
        self.create_with(ServiceType::of::<T>(), downcast::<T>)
    }

    /// Activator for trait-object service `I`, `None` if `I` is not registered.
    pub fn create_trait<I: ?Sized + Send + Sync + 'static>(
        &self,
    ) -> DiResult<Option<ServiceActivator<I>>> {
        self.create_with(ServiceType::of::<I>(), downcast_trait::<I>)
    }

    /// Factory activating the unregistered type `T` with arguments of the
    /// given types supplied by the caller.
    ///
    /// The chosen constructor must consume every supplied type; its other
    /// parameters are resolved from the provider or fall back to their
    /// defaults. Selection follows the same rules as registered types.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use callsite_di::{Constructor, Injectable, InstanceArgs, ServiceCollection, ServiceType};
    /// use std::sync::Arc;
    ///
    /// struct Clock;
    /// struct Job { name: Arc<String>, clock: Arc<Clock> }
    ///
    /// impl Injectable for Job {
    ///     fn constructors() -> Vec<Constructor> {
    ///         vec![Constructor::of::<Self>()
    ///             .param::<String>()
    ///             .param::<Clock>()
    ///             .build(|args| Ok(Job { name: args.next()?, clock: args.next()? }))]
    ///     }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Clock);
    /// let provider = services.build();
    ///
    /// let jobs = provider
    ///     .activator_factory()
    ///     .create_factory::<Job>(&[ServiceType::of::<String>()])
    ///     .unwrap();
    /// let job = jobs.create(&provider, InstanceArgs::new().with("nightly".to_string())).unwrap();
    /// assert_eq!(job.name.as_str(), "nightly");
    /// ```
    pub fn create_factory<T: Injectable>(&self, supplied: &[ServiceType]) -> DiResult<InstanceFactory<T>> {
        let implementation = type_name::<T>();
        let constructors = T::constructors();
        let (chosen, slots) = select_constructor(implementation, &constructors, |ctor| {
            self.bind_supplied(ctor, supplied)
        })?;
        debug!(implementation, supplied = supplied.len(), "instance factory created");
        Ok(InstanceFactory {
            engine: self.engine.clone(),
            implementation,
            supplied: supplied.to_vec(),
            activate: chosen.activate.clone(),
            slots,
            _marker: PhantomData,
        })
    }

    /// Activates the unregistered type `T` once, from `scope` and `args`.
    pub fn create_instance<T: Injectable>(
        &self,
        scope: impl AsRef<Scope>,
        args: InstanceArgs,
    ) -> DiResult<Arc<T>> {
        self.create_factory::<T>(&args.types())?.create(scope, args)
    }

    fn bind_supplied(
        &self,
        ctor: &Constructor,
        supplied: &[ServiceType],
    ) -> DiResult<Binding<Vec<ArgSlot>>> {
        let mut used = vec![false; supplied.len()];
        let mut slots = Vec::with_capacity(ctor.arity());
        for parameter in ctor.parameters() {
            let matched = supplied
                .iter()
                .enumerate()
                .find(|(index, ty)| !used[*index] && *ty == parameter.service_type())
                .map(|(index, _)| index);
            if let Some(index) = matched {
                used[index] = true;
                slots.push(ArgSlot::Supplied(index));
                continue;
            }

            match self.engine.realize(parameter.service_type())? {
                Some(realized) => slots.push(ArgSlot::Service(realized)),
                None => match &parameter.default {
                    Some(default) => slots.push(ArgSlot::Default(default.clone())),
                    None => return Ok(Binding::Missing(parameter.service_type().name())),
                },
            }
        }

        // Every supplied argument must land in a parameter
        match used.iter().position(|used| !used) {
            Some(unused) => Ok(Binding::Missing(supplied[unused].name())),
            None => Ok(Binding::Bound(slots)),
        }
    }

    fn create_with<T: ?Sized>(
        &self,
        service_type: ServiceType,
        downcast: fn(AnyArc) -> DiResult<Arc<T>>,
    ) -> DiResult<Option<ServiceActivator<T>>> {
        Ok(self
            .engine
            .realize(&service_type)?
            .map(|realized| ServiceActivator {
                engine: self.engine.clone(),
                realized,
                downcast,
            }))
    }
}

impl fmt::Debug for ActivatorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivatorFactory").finish_non_exhaustive()
    }
}

/// Resolves one service type from whichever scope it is given.
pub struct ServiceActivator<T: ?Sized> {
    engine: Arc<Engine>,
    realized: Realized,
    downcast: fn(AnyArc) -> DiResult<Arc<T>>,
}

impl<T: ?Sized> ServiceActivator<T> {
    /// Resolves the service from `scope`. Passing the provider resolves from
    /// its root scope.
    pub fn get(&self, scope: impl AsRef<Scope>) -> DiResult<Arc<T>> {
        let scope = scope.as_ref();
        check_engine::<T>(&self.engine, scope)?;
        self.engine
            .invoke(&self.realized, scope)
            .and_then(self.downcast)
    }

    pub fn service_type(&self) -> &ServiceType {
        self.realized.call_site.service_type()
    }
}

impl<T: ?Sized> Clone for ServiceActivator<T> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            realized: self.realized.clone(),
            downcast: self.downcast,
        }
    }
}

impl<T: ?Sized> fmt::Debug for ServiceActivator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceActivator")
            .field("service_type", self.service_type())
            .finish()
    }
}

fn check_engine<T: ?Sized>(engine: &Arc<Engine>, scope: &Scope) -> DiResult<()> {
    if Arc::ptr_eq(scope.engine(), engine) {
        Ok(())
    } else {
        Err(DiError::activation(
            type_name::<T>(),
            "scope belongs to a different provider",
        ))
    }
}

/// Arguments supplied by the caller to [`InstanceFactory::create`], in order.
#[derive(Clone, Default)]
pub struct InstanceArgs {
    values: Vec<(ServiceType, AnyArc)>,
}

impl InstanceArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supplies `value` for a parameter of type `T`.
    pub fn with<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.with_shared(Arc::new(value))
    }

    /// Supplies an already shared value for a parameter of type `T`.
    pub fn with_shared<T: Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.values.push((ServiceType::of::<T>(), value));
        self
    }

    /// Supplies a trait object for a parameter of type `I`.
    pub fn with_trait<I: ?Sized + Send + Sync + 'static>(mut self, value: Arc<I>) -> Self {
        self.values.push((ServiceType::of::<I>(), Arc::new(value)));
        self
    }

    /// Types of the supplied values, in order.
    pub fn types(&self) -> Vec<ServiceType> {
        self.values.iter().map(|(ty, _)| ty.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for InstanceArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.values.iter().map(|(ty, _)| ty)).finish()
    }
}

#[derive(Clone)]
enum ArgSlot {
    Supplied(usize),
    Service(Realized),
    Default(AnyArc),
}

/// Activates an unregistered type with a fixed constructor, taking some
/// arguments from the caller and resolving the rest.
///
/// Instances are owned by the caller: they are never cached or disposed by
/// a scope.
pub struct InstanceFactory<T> {
    engine: Arc<Engine>,
    implementation: &'static str,
    supplied: Vec<ServiceType>,
    activate: ActivateFn,
    slots: Vec<ArgSlot>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> InstanceFactory<T> {
    /// Activates a new instance, resolving services from `scope`.
    ///
    /// `args` must hold values of the types the factory was created for, in
    /// the same order.
    pub fn create(&self, scope: impl AsRef<Scope>, args: InstanceArgs) -> DiResult<Arc<T>> {
        let scope = scope.as_ref();
        check_engine::<T>(&self.engine, scope)?;
        scope.ensure_open()?;
        if !args.values.iter().map(|(ty, _)| ty).eq(self.supplied.iter()) {
            return Err(DiError::activation(
                self.implementation,
                format!("expected arguments {:?}, got {:?}", self.supplied, args),
            ));
        }

        let values = self
            .slots
            .iter()
            .map(|slot| match slot {
                ArgSlot::Supplied(index) => Ok(args.values[*index].1.clone()),
                ArgSlot::Service(realized) => self.engine.invoke(realized, scope),
                ArgSlot::Default(value) => Ok(value.clone()),
            })
            .collect::<DiResult<Vec<_>>>()?;

        let produced = (self.activate)(&mut Args::new(self.implementation, &values))?;
        downcast(produced.value)
    }

    /// Argument types the caller supplies to [`create`](Self::create).
    pub fn supplied_types(&self) -> &[ServiceType] {
        &self.supplied
    }
}

impl<T> Clone for InstanceFactory<T> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            implementation: self.implementation,
            supplied: self.supplied.clone(),
            activate: self.activate.clone(),
            slots: self.slots.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for InstanceFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceFactory")
            .field("implementation", &self.implementation)
            .field("supplied", &self.supplied)
            .finish_non_exhaustive()
    }
}
