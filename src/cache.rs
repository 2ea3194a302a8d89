//! Lifetime cache manager.
//!
//! Each scope owns one [`LifetimeCache`]; the root scope's cache also holds
//! singletons. A cache entry is an `OnceCell`, so the first construction of a
//! key is exclusive (lock-then-build) and later reads take only a shared lock.

use std::sync::Arc;

use ahash::AHashMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::call_site::{CacheLocation, CallSite};
use crate::constructor::Produced;
use crate::error::DiResult;
use crate::internal::{InFlight, StackGuard};
use crate::key::CacheKey;
use crate::provider::Scope;
use crate::registration::AnyArc;

/// Per-scope instance cache.
#[derive(Default)]
pub(crate) struct LifetimeCache {
    entries: RwLock<AHashMap<CacheKey, Arc<OnceCell<AnyArc>>>>,
}

impl LifetimeCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The cell for `key`, created empty on first use.
    pub(crate) fn cell(&self, key: &CacheKey) -> Arc<OnceCell<AnyArc>> {
        if let Some(cell) = self.entries.read().get(key) {
            return cell.clone();
        }
        self.entries
            .write()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// The cached value for `key`, if already produced.
    pub(crate) fn get(&self, key: &CacheKey) -> Option<AnyArc> {
        self.entries.read().get(key).and_then(|cell| cell.get().cloned())
    }

    /// Returns the cached value for `key`, producing it at most once.
    ///
    /// Waiting on a key another thread is producing goes through
    /// `in_flight`, so crossed waits fail with `Circular` instead of hanging.
    pub(crate) fn get_or_add(
        &self,
        key: &CacheKey,
        in_flight: &InFlight,
        produce: impl FnOnce() -> DiResult<AnyArc>,
    ) -> DiResult<AnyArc> {
        let cell = self.cell(key);
        in_flight.get_or_try_init(&*cell, key.service_type.name(), produce)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.read().values().filter(|cell| cell.get().is_some()).count()
    }

    /// Drops every cached value.
    pub(crate) fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Executes `produce` for `call_site` according to its cache policy.
///
/// - `None`: produced on every call; a disposable result is captured by the
///   resolving scope.
/// - `Scope`: produced once per resolving scope and captured by it.
/// - `Root`: produced once in the root scope and captured by it. `produce`
///   then receives the root scope so that the whole subtree is built there.
pub(crate) fn resolve_cached(
    call_site: &CallSite,
    scope: &Scope,
    produce: impl FnOnce(&Scope) -> DiResult<Produced>,
) -> DiResult<AnyArc> {
    let owner = match call_site.cache.location {
        CacheLocation::None => {
            let _guard = guard(call_site, scope)?;
            let produced = produce(scope)?;
            return scope.capture(produced);
        }
        CacheLocation::Scope => scope,
        CacheLocation::Root => {
            let root = scope.root();
            root.ensure_open()?;
            root
        }
    };

    let cache = owner.cache();
    if let Some(value) = cache.get(&call_site.cache.key) {
        return Ok(value);
    }

    // Held before blocking on the cell, so a factory that re-enters its own
    // construction fails instead of waiting on itself.
    let _guard = guard(call_site, scope)?;
    cache.get_or_add(&call_site.cache.key, scope.engine().in_flight(), || {
        let produced = produce(owner)?;
        owner.capture(produced)
    })
}

fn guard(call_site: &CallSite, scope: &Scope) -> DiResult<Option<StackGuard>> {
    if call_site.constructs() {
        StackGuard::enter(scope.engine_id(), &call_site.cache.key).map(Some)
    } else {
        Ok(None)
    }
}
