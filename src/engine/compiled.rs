//! Compiling strategy: turns a graph into a tree of closures once.

use std::sync::Arc;

use ahash::AHashMap;
use tracing::trace;

use super::{apply_cast, Accessor, ExecutionStrategy};
use crate::cache::resolve_cached;
use crate::call_site::{CallSite, CallSiteKind};
use crate::constructor::{Args, Produced};
use crate::error::DiResult;
use crate::provider::Scope;
use crate::registration::ServiceList;

type Body = Arc<dyn Fn(&Scope) -> DiResult<Produced> + Send + Sync>;

pub(crate) struct CompiledStrategy;

impl ExecutionStrategy for CompiledStrategy {
    fn name(&self) -> &'static str {
        "compiled"
    }

    fn realize(&self, call_site: &Arc<CallSite>) -> Accessor {
        compile(call_site)
    }
}

/// Compiles a graph. Nodes shared inside the graph get one accessor.
pub(crate) fn compile(call_site: &Arc<CallSite>) -> Accessor {
    trace!(service = %call_site.service_type, "compiling call site");
    compile_node(call_site, &mut AHashMap::new())
}

fn compile_node(call_site: &Arc<CallSite>, memo: &mut AHashMap<*const CallSite, Accessor>) -> Accessor {
    let ptr = Arc::as_ptr(call_site);
    if let Some(accessor) = memo.get(&ptr) {
        return accessor.clone();
    }

    let body: Body = match &call_site.kind {
        CallSiteKind::Constructor {
            activate,
            parameters,
            cast,
        } => {
            let children: Vec<Accessor> = parameters.iter().map(|p| compile_node(p, memo)).collect();
            let activate = activate.clone();
            let cast = cast.clone();
            let implementation = call_site.implementation;
            Arc::new(move |scope: &Scope| {
                let values = children
                    .iter()
                    .map(|child| child(scope))
                    .collect::<DiResult<Vec<_>>>()?;
                let produced = activate(&mut Args::new(implementation, &values))?;
                apply_cast(produced, cast.as_ref())
            })
        }
        CallSiteKind::Factory(factory) => factory.clone(),
        CallSiteKind::Constant(value) => {
            // Never cached or captured
            let value = value.clone();
            let accessor: Accessor = Arc::new(move |_: &Scope| Ok(value.clone()));
            memo.insert(ptr, accessor.clone());
            return accessor;
        }
        CallSiteKind::Enumerable(items) => {
            let children: Vec<Accessor> = items.iter().map(|item| compile_node(item, memo)).collect();
            Arc::new(move |scope: &Scope| {
                let values = children
                    .iter()
                    .map(|child| child(scope))
                    .collect::<DiResult<Vec<_>>>()?;
                Ok(Produced::shared(Arc::new(ServiceList(values))))
            })
        }
        CallSiteKind::ServiceProvider => Arc::new(|scope: &Scope| Ok(Produced::shared(Arc::new(scope.clone())))),
        CallSiteKind::ScopeFactory => {
            Arc::new(|scope: &Scope| Ok(Produced::shared(Arc::new(scope.scope_factory()))))
        }
        CallSiteKind::ActivatorFactory => {
            Arc::new(|scope: &Scope| Ok(Produced::shared(Arc::new(scope.activator_factory()))))
        }
    };

    let node = call_site.clone();
    let accessor: Accessor = Arc::new(move |scope: &Scope| resolve_cached(&node, scope, |owner| body(owner)));
    memo.insert(ptr, accessor.clone());
    accessor
}
