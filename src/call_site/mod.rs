//! Call-site graphs: the resolved recipe for producing a service.
//!
//! A [`CallSite`] is built once per requested service type and engine, then
//! shared read-only by every resolution. Children are ordinary `Arc`s, so a
//! node reachable from several parents is built once and shared.

mod chain;
mod factory;

use std::fmt;
use std::sync::Arc;

use crate::constructor::ActivateFn;
use crate::descriptors::{CastFn, FactoryFn};
use crate::key::{CacheKey, ServiceType};
use crate::lifetime::Lifetime;
use crate::registration::AnyArc;

pub(crate) use chain::CallSiteChain;
pub(crate) use factory::{select_constructor, Binding, CallSiteFactory};

/// Where the result of a call site is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheLocation {
    /// Once per root scope, shared by every descendant scope
    Root,
    /// Once per scope instance
    Scope,
    /// Never cached
    None,
}

/// Cache policy of a call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultCache {
    pub location: CacheLocation,
    pub key: CacheKey,
}

impl ResultCache {
    pub(crate) fn for_lifetime(lifetime: Lifetime, key: CacheKey) -> Self {
        let location = match lifetime {
            Lifetime::Singleton => CacheLocation::Root,
            Lifetime::Scoped => CacheLocation::Scope,
            Lifetime::Transient => CacheLocation::None,
        };
        Self { location, key }
    }

    pub(crate) fn none(key: CacheKey) -> Self {
        Self {
            location: CacheLocation::None,
            key,
        }
    }
}

/// What a call site does when executed.
#[derive(Clone)]
pub enum CallSiteKind {
    /// Activates an implementation type from its resolved parameters
    Constructor {
        activate: ActivateFn,
        parameters: Vec<Arc<CallSite>>,
        cast: Option<CastFn>,
    },
    /// Invokes a user factory with the resolving scope
    Factory(FactoryFn),
    /// Returns a fixed value
    Constant(AnyArc),
    /// Collects every registration of the element type
    Enumerable(Vec<Arc<CallSite>>),
    /// Yields the resolving scope
    ServiceProvider,
    /// Yields a factory for child scopes
    ScopeFactory,
    /// Yields the service activator factory
    ActivatorFactory,
}

impl CallSiteKind {
    pub fn name(&self) -> &'static str {
        match self {
            CallSiteKind::Constructor { .. } => "Constructor",
            CallSiteKind::Factory(_) => "Factory",
            CallSiteKind::Constant(_) => "Constant",
            CallSiteKind::Enumerable(_) => "Enumerable",
            CallSiteKind::ServiceProvider => "ServiceProvider",
            CallSiteKind::ScopeFactory => "ScopeFactory",
            CallSiteKind::ActivatorFactory => "ActivatorFactory",
        }
    }
}

/// A node of the resolution graph.
#[derive(Clone)]
pub struct CallSite {
    pub(crate) service_type: ServiceType,
    pub(crate) implementation: &'static str,
    pub(crate) lifetime: Lifetime,
    pub(crate) cache: ResultCache,
    pub(crate) kind: CallSiteKind,
}

impl CallSite {
    pub fn service_type(&self) -> &ServiceType {
        &self.service_type
    }

    pub fn implementation(&self) -> &'static str {
        self.implementation
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn kind(&self) -> &CallSiteKind {
        &self.kind
    }

    /// Direct dependencies, in parameter or registration order.
    pub fn children(&self) -> &[Arc<CallSite>] {
        match &self.kind {
            CallSiteKind::Constructor { parameters, .. } => parameters,
            CallSiteKind::Enumerable(items) => items,
            _ => &[],
        }
    }

    /// Whether executing this node runs user code.
    pub(crate) fn constructs(&self) -> bool {
        matches!(
            self.kind,
            CallSiteKind::Constructor { .. } | CallSiteKind::Factory(_)
        )
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("CallSite");
        s.field("service_type", &self.service_type)
            .field("kind", &self.kind.name())
            .field("implementation", &self.implementation)
            .field("lifetime", &self.lifetime)
            .field("cache", &self.cache.location);
        if !self.children().is_empty() {
            s.field("children", &self.children());
        }
        s.finish()
    }
}
