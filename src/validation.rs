//! Lifetime validation of call-site graphs.
//!
//! Enabled by [`ServiceProviderOptions::validate_scopes`](crate::ServiceProviderOptions).
//! Two rules are enforced:
//!
//! - **Captive dependency**: a singleton must not depend, directly or through
//!   transients, on a scoped service ([`DiError::InvalidLifetimeCapture`]).
//! - **Root resolution**: a scoped service, or a transient depending on one,
//!   must not be resolved from the root scope
//!   ([`DiError::DirectScopedResolutionFromRoot`]).

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::call_site::{CacheLocation, CallSite};
use crate::error::{DiError, DiResult};
use crate::key::CacheKey;

/// Computes, per call site, the scoped service it (transitively) depends on.
///
/// Results are memoized by cache key. A singleton node reports no scoped
/// dependency once its own subtree has been checked.
#[derive(Default)]
pub(crate) struct CallSiteValidator {
    scoped_dependencies: RwLock<AHashMap<CacheKey, Option<&'static str>>>,
}

impl CallSiteValidator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Checks a freshly built graph and returns the scoped service its root
    /// depends on, if any.
    pub(crate) fn validate_call_site(&self, call_site: &Arc<CallSite>) -> DiResult<Option<&'static str>> {
        self.visit(call_site)
    }

    /// Rejects resolving a graph with a scoped dependency from the root scope.
    pub(crate) fn validate_resolution(
        &self,
        call_site: &Arc<CallSite>,
        from_root: bool,
    ) -> DiResult<()> {
        if !from_root {
            return Ok(());
        }
        match self.visit(call_site)? {
            Some(scoped) => Err(DiError::DirectScopedResolutionFromRoot {
                service: call_site.service_type.name(),
                scoped,
            }),
            None => Ok(()),
        }
    }

    fn visit(&self, call_site: &CallSite) -> DiResult<Option<&'static str>> {
        let key = &call_site.cache.key;
        if let Some(known) = self.scoped_dependencies.read().get(key) {
            return Ok(*known);
        }

        let mut scoped = None;
        for child in call_site.children() {
            if let Some(dependency) = self.visit(child)? {
                scoped.get_or_insert(dependency);
            }
        }

        let result = match call_site.cache.location {
            CacheLocation::Root => match scoped {
                Some(scoped) => {
                    return Err(DiError::InvalidLifetimeCapture {
                        singleton: call_site.service_type.name(),
                        scoped,
                    })
                }
                None => None,
            },
            CacheLocation::Scope => Some(call_site.service_type.name()),
            CacheLocation::None => scoped,
        };

        self.scoped_dependencies.write().insert(key.clone(), result);
        Ok(result)
    }
}
