//! Builds and memoizes call-site graphs from the registry.

use std::any::TypeId;
use std::sync::Arc;

use ahash::AHashMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::{CallSite, CallSiteChain, CallSiteKind, ResultCache};
use crate::constructor::Constructor;
use crate::descriptors::{CastFn, Implementation};
use crate::error::{DiError, DiResult};
use crate::internal::InFlight;
use crate::key::{CacheKey, ServiceType};
use crate::lifetime::Lifetime;
use crate::provider::{ActivatorFactory, Scope, ScopeFactory};
use crate::registration::Registry;

const NO_CONSTRUCTORS: &str = "(no constructors)";

/// Outcome of binding one constructor's parameters.
pub(crate) enum Binding<B> {
    Bound(B),
    Missing(&'static str),
}

type Memo = Arc<OnceCell<Option<Arc<CallSite>>>>;

/// Graph builder owned by one engine.
///
/// Graphs are memoized by [`CacheKey`], including negative results. Each key
/// has its own cell, so concurrent first requests for one type collapse into
/// a single build while different types build independently. A graph is
/// published only once complete.
pub(crate) struct CallSiteFactory {
    registry: Registry,
    memo: RwLock<AHashMap<CacheKey, Memo>>,
    in_flight: Arc<InFlight>,
}

impl CallSiteFactory {
    pub(crate) fn new(registry: Registry, in_flight: Arc<InFlight>) -> Self {
        Self {
            registry,
            memo: RwLock::new(AHashMap::new()),
            in_flight,
        }
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Whether `service_type` can be resolved without building its graph.
    pub(crate) fn is_service(&self, service_type: &ServiceType) -> bool {
        builtin(service_type).is_some() || self.registry.is_registered(service_type)
    }

    /// Graph for single resolution of `service_type`, `None` if unregistered.
    pub(crate) fn get_call_site(&self, service_type: &ServiceType) -> DiResult<Option<Arc<CallSite>>> {
        self.resolve(service_type, &mut CallSiteChain::new())
    }

    /// Graph for one specific registration. Open definitions have none.
    pub(crate) fn get_call_site_for_descriptor(&self, index: usize) -> DiResult<Option<Arc<CallSite>>> {
        let descriptor = self.registry.descriptor(index);
        if descriptor.is_open_generic() {
            return Ok(None);
        }
        let service_type = descriptor.service_type.clone();
        let slot = self.registry.slot_of(index);
        let key = CacheKey::new(service_type.clone(), slot);
        self.cached(key, &mut CallSiteChain::new(), |chain| {
            self.create_from_descriptor(index, &service_type, slot, chain)
        })
    }

    fn resolve(
        &self,
        service_type: &ServiceType,
        chain: &mut CallSiteChain,
    ) -> DiResult<Option<Arc<CallSite>>> {
        let key = CacheKey::new(service_type.clone(), 0);
        self.cached(key, chain, |chain| self.create(service_type, chain))
    }

    fn cached(
        &self,
        key: CacheKey,
        chain: &mut CallSiteChain,
        build: impl FnOnce(&mut CallSiteChain) -> DiResult<Option<Arc<CallSite>>>,
    ) -> DiResult<Option<Arc<CallSite>>> {
        let cell = self.memo_cell(&key);
        if let Some(hit) = cell.get() {
            return Ok(hit.clone());
        }

        // A repeat on this chain would wait on its own cell
        chain.check_circular(&key)?;
        self.in_flight
            .get_or_try_init(&*cell, key.service_type.name(), || {
                let built = chain.enter(key.clone(), build)?;
                if built.is_none() {
                    trace!(service = %key.service_type, "no registration");
                }
                Ok(built)
            })
    }

    fn memo_cell(&self, key: &CacheKey) -> Memo {
        if let Some(cell) = self.memo.read().get(key) {
            return cell.clone();
        }
        self.memo
            .write()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    fn create(
        &self,
        service_type: &ServiceType,
        chain: &mut CallSiteChain,
    ) -> DiResult<Option<Arc<CallSite>>> {
        if let Some(builtin) = builtin(service_type) {
            return Ok(Some(builtin));
        }
        if let Some(element) = service_type.element() {
            return self.create_enumerable(service_type, element, chain).map(Some);
        }
        match self.registry.single(service_type) {
            Some(index) => self.create_from_descriptor(index, service_type, 0, chain),
            None => Ok(None),
        }
    }

    fn create_enumerable(
        &self,
        service_type: &ServiceType,
        element: &ServiceType,
        chain: &mut CallSiteChain,
    ) -> DiResult<Arc<CallSite>> {
        let mut items = Vec::new();
        for (index, slot) in self.registry.all(element) {
            let key = CacheKey::new(element.clone(), slot);
            let item = self.cached(key, chain, |chain| {
                self.create_from_descriptor(index, element, slot, chain)
            })?;
            items.extend(item);
        }
        debug!(service = %service_type, count = items.len(), "enumerable call site built");
        Ok(Arc::new(CallSite {
            service_type: service_type.clone(),
            implementation: element.name(),
            lifetime: Lifetime::Transient,
            cache: ResultCache::none(CacheKey::new(service_type.clone(), 0)),
            kind: CallSiteKind::Enumerable(items),
        }))
    }

    fn create_from_descriptor(
        &self,
        index: usize,
        service_type: &ServiceType,
        slot: usize,
        chain: &mut CallSiteChain,
    ) -> DiResult<Option<Arc<CallSite>>> {
        let descriptor = self.registry.descriptor(index);
        // Instances of exact registrations are shared by plain and generic requests
        let cached_as = if descriptor.is_open_generic() {
            service_type.clone()
        } else {
            descriptor.service_type.canonical()
        };
        let key = CacheKey::new(cached_as, slot);
        let mut cache = ResultCache::for_lifetime(descriptor.lifetime, key.clone());

        let (implementation, kind) = match &descriptor.implementation {
            Implementation::Instance {
                implementation,
                value,
            } => {
                // Caller-owned: never cached or captured
                cache = ResultCache::none(key);
                (*implementation, CallSiteKind::Constant(value.clone()))
            }
            Implementation::Factory {
                implementation,
                factory,
            } => (*implementation, CallSiteKind::Factory(factory.clone())),
            Implementation::Type {
                implementation,
                constructors,
                cast,
            } => (
                *implementation,
                self.create_constructor(*implementation, constructors(), cast.clone(), chain)?,
            ),
            Implementation::OpenGeneric { .. } => match service_type.as_generic() {
                Some(generic) => (
                    generic.closed.name,
                    self.create_constructor(generic.closed.name, (generic.constructors)(), None, chain)?,
                ),
                None => return Ok(None),
            },
        };

        debug!(
            service = %service_type,
            kind = kind.name(),
            lifetime = descriptor.lifetime.name(),
            slot,
            "call site built"
        );
        Ok(Some(Arc::new(CallSite {
            service_type: service_type.clone(),
            implementation,
            lifetime: descriptor.lifetime,
            cache,
            kind,
        })))
    }

    fn create_constructor(
        &self,
        implementation: &'static str,
        constructors: Vec<Constructor>,
        cast: Option<CastFn>,
        chain: &mut CallSiteChain,
    ) -> DiResult<CallSiteKind> {
        let (chosen, parameters) =
            select_constructor(implementation, &constructors, |ctor| self.bind(ctor, chain))?;
        Ok(CallSiteKind::Constructor {
            activate: chosen.activate.clone(),
            parameters,
            cast,
        })
    }

    fn bind(&self, ctor: &Constructor, chain: &mut CallSiteChain) -> DiResult<Binding<Vec<Arc<CallSite>>>> {
        let mut parameters = Vec::with_capacity(ctor.arity());
        for parameter in &ctor.parameters {
            match self.resolve(&parameter.service_type, chain)? {
                Some(call_site) => parameters.push(call_site),
                None => match &parameter.default {
                    Some(default) => parameters.push(Arc::new(CallSite {
                        service_type: parameter.service_type.clone(),
                        implementation: parameter.service_type.name(),
                        lifetime: Lifetime::Transient,
                        cache: ResultCache::none(CacheKey::new(parameter.service_type.clone(), 0)),
                        kind: CallSiteKind::Constant(default.clone()),
                    })),
                    None => return Ok(Binding::Missing(parameter.service_type.name())),
                },
            }
        }
        Ok(Binding::Bound(parameters))
    }
}

/// Picks the constructor with the most satisfiable parameters.
///
/// A preferred constructor is used outright. Among the satisfiable
/// candidates of the greatest arity, identical signatures resolve to the
/// first declared; differing signatures are ambiguous.
pub(crate) fn select_constructor<'c, B>(
    implementation: &'static str,
    constructors: &'c [Constructor],
    mut bind: impl FnMut(&Constructor) -> DiResult<Binding<B>>,
) -> DiResult<(&'c Constructor, B)> {
    if let Some(preferred) = constructors.iter().find(|c| c.preferred) {
        return match bind(preferred)? {
            Binding::Bound(bound) => Ok((preferred, bound)),
            Binding::Missing(parameter) => Err(DiError::UnresolvableConstructor {
                implementation,
                parameter,
            }),
        };
    }

    let mut order: Vec<&Constructor> = constructors.iter().collect();
    order.sort_by(|a, b| b.arity().cmp(&a.arity()));

    let mut first_missing = None;
    let mut start = 0;
    while start < order.len() {
        let arity = order[start].arity();
        let end = order[start..]
            .iter()
            .position(|c| c.arity() != arity)
            .map_or(order.len(), |offset| start + offset);

        let mut satisfiable = Vec::new();
        for &ctor in &order[start..end] {
            match bind(ctor)? {
                Binding::Bound(bound) => satisfiable.push((ctor, bound)),
                Binding::Missing(parameter) => {
                    first_missing.get_or_insert(parameter);
                }
            }
        }

        let candidates = satisfiable.len();
        let mut satisfiable = satisfiable.into_iter();
        if let Some((chosen, bound)) = satisfiable.next() {
            if satisfiable.any(|(other, _)| !other.same_signature(chosen)) {
                return Err(DiError::AmbiguousConstructor {
                    implementation,
                    arity,
                    candidates,
                });
            }
            trace!(implementation, arity, "constructor selected");
            return Ok((chosen, bound));
        }
        start = end;
    }

    Err(DiError::UnresolvableConstructor {
        implementation,
        parameter: first_missing.unwrap_or(NO_CONSTRUCTORS),
    })
}

/// Call sites for the engine's own services.
fn builtin(service_type: &ServiceType) -> Option<Arc<CallSite>> {
    let id = service_type.type_id()?;
    let (kind, lifetime) = if id == TypeId::of::<Scope>() {
        (CallSiteKind::ServiceProvider, Lifetime::Scoped)
    } else if id == TypeId::of::<ScopeFactory>() {
        (CallSiteKind::ScopeFactory, Lifetime::Singleton)
    } else if id == TypeId::of::<ActivatorFactory>() {
        (CallSiteKind::ActivatorFactory, Lifetime::Singleton)
    } else {
        return None;
    };
    Some(Arc::new(CallSite {
        service_type: service_type.clone(),
        implementation: service_type.name(),
        lifetime,
        cache: ResultCache::none(CacheKey::new(service_type.clone(), 0)),
        kind,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_site::CacheLocation;
    use crate::constructor::Injectable;
    use crate::descriptors::ServiceDescriptor;

    struct Leaf;
    struct Branch;
    struct Loop;

    impl Injectable for Leaf {
        fn constructors() -> Vec<Constructor> {
            vec![Constructor::of::<Self>().build(|_| Ok(Leaf))]
        }
    }

    impl Injectable for Branch {
        fn constructors() -> Vec<Constructor> {
            vec![Constructor::of::<Self>()
                .param::<Leaf>()
                .param::<Leaf>()
                .build(|_| Ok(Branch))]
        }
    }

    impl Injectable for Loop {
        fn constructors() -> Vec<Constructor> {
            vec![Constructor::of::<Self>().param::<Loop>().build(|_| Ok(Loop))]
        }
    }

    fn factory(descriptors: Vec<ServiceDescriptor>) -> CallSiteFactory {
        CallSiteFactory::new(Registry::new(descriptors), Arc::new(InFlight::new()))
    }

    #[test]
    fn test_graph_is_memoized_and_shared() {
        let f = factory(vec![
            ServiceDescriptor::from_type::<Leaf>(Lifetime::Singleton),
            ServiceDescriptor::from_type::<Branch>(Lifetime::Scoped),
        ]);
        let branch = f.get_call_site(&ServiceType::of::<Branch>()).unwrap().unwrap();
        let again = f.get_call_site(&ServiceType::of::<Branch>()).unwrap().unwrap();
        assert!(Arc::ptr_eq(&branch, &again));

        let children = branch.children();
        assert_eq!(children.len(), 2);
        assert!(Arc::ptr_eq(&children[0], &children[1]));
        assert_eq!(children[0].cache().location, CacheLocation::Root);
        assert_eq!(branch.cache().location, CacheLocation::Scope);
    }

    #[test]
    fn test_unregistered_is_none() {
        let f = factory(vec![]);
        assert!(f.get_call_site(&ServiceType::of::<Leaf>()).unwrap().is_none());
    }

    #[test]
    fn test_self_dependency_is_circular() {
        let f = factory(vec![ServiceDescriptor::from_type::<Loop>(Lifetime::Transient)]);
        match f.get_call_site(&ServiceType::of::<Loop>()) {
            Err(DiError::Circular(path)) => assert_eq!(path.len(), 2),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_builtins_take_precedence() {
        let f = factory(vec![]);
        let scope = f.get_call_site(&ServiceType::of::<Scope>()).unwrap().unwrap();
        assert_eq!(scope.kind().name(), "ServiceProvider");
        assert_eq!(scope.cache().location, CacheLocation::None);
    }
}
