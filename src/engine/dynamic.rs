//! Adaptive strategy: interprets the first resolution, compiles afterwards.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

use super::{compiled, runtime, Accessor, ExecutionStrategy};
use crate::call_site::CallSite;
use crate::provider::Scope;

pub(crate) struct DynamicStrategy;

impl ExecutionStrategy for DynamicStrategy {
    fn name(&self) -> &'static str {
        "dynamic"
    }

    fn realize(&self, call_site: &Arc<CallSite>) -> Accessor {
        let call_site = call_site.clone();
        let calls = AtomicUsize::new(0);
        let compiled: OnceCell<Accessor> = OnceCell::new();

        Arc::new(move |scope: &Scope| {
            if let Some(accessor) = compiled.get() {
                return accessor(scope);
            }
            if calls.fetch_add(1, Ordering::Relaxed) == 0 {
                return runtime::resolve(&call_site, scope);
            }
            let accessor = compiled.get_or_init(|| {
                debug!(service = %call_site.service_type, "compiling after first resolution");
                compiled::compile(&call_site)
            });
            accessor(scope)
        })
    }
}
