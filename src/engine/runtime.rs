//! Interpreting strategy: walks the graph on every resolution.

use std::sync::Arc;

use super::{apply_cast, Accessor, ExecutionStrategy};
use crate::cache::resolve_cached;
use crate::call_site::{CallSite, CallSiteKind};
use crate::constructor::{Args, Produced};
use crate::error::DiResult;
use crate::provider::Scope;
use crate::registration::{AnyArc, ServiceList};

pub(crate) struct RuntimeStrategy;

impl ExecutionStrategy for RuntimeStrategy {
    fn name(&self) -> &'static str {
        "runtime"
    }

    fn realize(&self, call_site: &Arc<CallSite>) -> Accessor {
        let call_site = call_site.clone();
        Arc::new(move |scope: &Scope| resolve(&call_site, scope))
    }
}

/// Executes `call_site` for `scope`, children first.
pub(crate) fn resolve(call_site: &CallSite, scope: &Scope) -> DiResult<AnyArc> {
    resolve_cached(call_site, scope, |owner| produce(call_site, owner))
}

fn produce(call_site: &CallSite, scope: &Scope) -> DiResult<Produced> {
    match &call_site.kind {
        CallSiteKind::Constructor {
            activate,
            parameters,
            cast,
        } => {
            let values = parameters
                .iter()
                .map(|parameter| resolve(parameter, scope))
                .collect::<DiResult<Vec<_>>>()?;
            let produced = activate(&mut Args::new(call_site.implementation, &values))?;
            apply_cast(produced, cast.as_ref())
        }
        CallSiteKind::Factory(factory) => factory(scope),
        CallSiteKind::Constant(value) => Ok(Produced::shared(value.clone())),
        CallSiteKind::Enumerable(items) => {
            let values = items
                .iter()
                .map(|item| resolve(item, scope))
                .collect::<DiResult<Vec<_>>>()?;
            Ok(Produced::shared(Arc::new(ServiceList(values))))
        }
        CallSiteKind::ServiceProvider => Ok(Produced::shared(Arc::new(scope.clone()))),
        CallSiteKind::ScopeFactory => Ok(Produced::shared(Arc::new(scope.scope_factory()))),
        CallSiteKind::ActivatorFactory => {
            Ok(Produced::shared(Arc::new(scope.activator_factory())))
        }
    }
}
