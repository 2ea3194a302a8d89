//! Resolution engine: graph realization, validation and execution.
//!
//! The engine owns the call-site factory (graph cache), the realized accessor
//! per service type and the configured [`ExecutionStrategy`]. Instance caches
//! belong to scopes.

mod compiled;
mod dynamic;
mod runtime;

use std::sync::Arc;
use std::time::Instant;

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::call_site::{CallSite, CallSiteFactory};
use crate::config::{ServiceProviderMode, ServiceProviderOptions};
use crate::constructor::Produced;
use crate::descriptors::{CastFn, ServiceDescriptor};
use crate::error::{DiError, DiResult};
use crate::internal::InFlight;
use crate::key::ServiceType;
use crate::observer::Observers;
use crate::provider::Scope;
use crate::registration::{AnyArc, Registry};
use crate::validation::CallSiteValidator;

pub(crate) use compiled::CompiledStrategy;
pub(crate) use dynamic::DynamicStrategy;
pub(crate) use runtime::RuntimeStrategy;

/// Realized entry point for one service type.
pub(crate) type Accessor = Arc<dyn Fn(&Scope) -> DiResult<AnyArc> + Send + Sync>;

/// Turns a call-site graph into something executable.
///
/// All strategies produce identical observable results; they differ only in
/// how much work is done ahead of the first resolution.
pub(crate) trait ExecutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn realize(&self, call_site: &Arc<CallSite>) -> Accessor;
}

fn strategy_for(mode: ServiceProviderMode) -> Box<dyn ExecutionStrategy> {
    match mode {
        ServiceProviderMode::Dynamic => Box::new(DynamicStrategy),
        ServiceProviderMode::Runtime => Box::new(RuntimeStrategy),
        ServiceProviderMode::Compiled => Box::new(CompiledStrategy),
    }
}

/// Applies a registration's cast to an activated value.
pub(crate) fn apply_cast(produced: Produced, cast: Option<&CastFn>) -> DiResult<Produced> {
    match cast {
        Some(cast) => produced.map_value(|value| cast(value)),
        None => Ok(produced),
    }
}

/// A realized service: its graph and the accessor executing it.
#[derive(Clone)]
pub(crate) struct Realized {
    pub(crate) call_site: Arc<CallSite>,
    pub(crate) accessor: Accessor,
}

pub(crate) struct Engine {
    call_sites: CallSiteFactory,
    in_flight: Arc<InFlight>,
    strategy: Box<dyn ExecutionStrategy>,
    realized: RwLock<AHashMap<ServiceType, Option<Realized>>>,
    validator: Option<CallSiteValidator>,
    observers: Observers,
    options: ServiceProviderOptions,
}

impl Engine {
    pub(crate) fn new(
        descriptors: Vec<ServiceDescriptor>,
        options: ServiceProviderOptions,
        observers: Observers,
    ) -> Self {
        let strategy = strategy_for(options.mode);
        debug!(
            descriptors = descriptors.len(),
            strategy = strategy.name(),
            validate_scopes = options.validate_scopes,
            "engine created"
        );
        let in_flight = Arc::new(InFlight::new());
        Self {
            call_sites: CallSiteFactory::new(Registry::new(descriptors), in_flight.clone()),
            in_flight,
            strategy,
            realized: RwLock::new(AHashMap::new()),
            validator: options.validate_scopes.then(CallSiteValidator::new),
            observers,
            options,
        }
    }

    pub(crate) fn options(&self) -> &ServiceProviderOptions {
        &self.options
    }

    /// Cells under construction across all of this engine's scopes.
    pub(crate) fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    pub(crate) fn observers(&self) -> &Observers {
        &self.observers
    }

    pub(crate) fn descriptors(&self) -> &[ServiceDescriptor] {
        self.call_sites.registry().descriptors()
    }

    pub(crate) fn is_service(&self, service_type: &ServiceType) -> bool {
        self.call_sites.is_service(service_type)
    }

    pub(crate) fn call_site(&self, service_type: &ServiceType) -> DiResult<Option<Arc<CallSite>>> {
        self.call_sites.get_call_site(service_type)
    }

    /// Builds, validates and realizes the graph for `service_type` once.
    ///
    /// Unregistered types are remembered as `None`; failures are not cached.
    /// Racing first requests may each realize the graph, but only the first
    /// published result is used and reported.
    pub(crate) fn realize(&self, service_type: &ServiceType) -> DiResult<Option<Realized>> {
        if let Some(hit) = self.realized.read().get(service_type) {
            return Ok(hit.clone());
        }

        let realized = match self.call_sites.get_call_site(service_type)? {
            Some(call_site) => {
                if let Some(validator) = &self.validator {
                    validator.validate_call_site(&call_site)?;
                }
                let accessor = self.strategy.realize(&call_site);
                Some(Realized {
                    call_site,
                    accessor,
                })
            }
            None => None,
        };

        let mut published = self.realized.write();
        if let Some(existing) = published.get(service_type) {
            return Ok(existing.clone());
        }
        if let Some(realized) = &realized {
            self.observers.call_site_built(&realized.call_site);
        }
        published.insert(service_type.clone(), realized.clone());
        Ok(realized)
    }

    /// Resolves `service_type` for `scope`.
    pub(crate) fn get_service(
        &self,
        service_type: &ServiceType,
        scope: &Scope,
    ) -> DiResult<Option<AnyArc>> {
        scope.ensure_open()?;
        match self.realize(service_type)? {
            Some(realized) => self.invoke(&realized, scope).map(Some),
            None => Ok(None),
        }
    }

    /// Executes a realized service for `scope`.
    pub(crate) fn invoke(&self, realized: &Realized, scope: &Scope) -> DiResult<AnyArc> {
        scope.ensure_open()?;
        if let Some(validator) = &self.validator {
            validator.validate_resolution(&realized.call_site, scope.is_root())?;
        }

        if !self.observers.has_observers() {
            return (realized.accessor)(scope);
        }

        let service_type = &realized.call_site.service_type;
        self.observers.resolving(service_type);
        let start = Instant::now();
        let result = (realized.accessor)(scope);
        match &result {
            Ok(_) => self.observers.resolved(service_type, start.elapsed()),
            Err(err) => self.observers.resolution_failed(service_type, err),
        }
        result
    }

    /// Builds (and, with scope validation, checks) the graph of every
    /// registration, collecting all failures.
    pub(crate) fn validate_descriptors(&self) -> DiResult<()> {
        let mut errors = Vec::new();
        for index in 0..self.call_sites.registry().len() {
            let checked = self
                .call_sites
                .get_call_site_for_descriptor(index)
                .and_then(|call_site| match (call_site, &self.validator) {
                    (Some(call_site), Some(validator)) => {
                        validator.validate_call_site(&call_site).map(|_| ())
                    }
                    _ => Ok(()),
                });
            if let Err(err) = checked {
                errors.push(err);
            }
        }

        if errors.is_empty() {
            debug!("all registrations validated");
            Ok(())
        } else {
            warn!(failures = errors.len(), "registration validation failed");
            Err(DiError::Aggregate(errors))
        }
    }
}
