//! Diagnostic observers for resolution events.
//!
//! Observers are registered on the [`ServiceCollection`](crate::ServiceCollection)
//! and notified synchronously by the engine. Keep implementations lightweight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::call_site::CallSite;
use crate::error::DiError;
use crate::key::ServiceType;

/// Observer trait for dependency injection resolution events.
///
/// # Examples
///
/// ```
/// use callsite_di::{DiObserver, Resolver, ServiceCollection, ServiceType};
/// use std::sync::{Arc, Mutex};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Recorder {
///     resolved: Mutex<Vec<String>>,
/// }
///
/// impl DiObserver for Recorder {
///     fn resolving(&self, _service: &ServiceType) {}
///
///     fn resolved(&self, service: &ServiceType, _duration: Duration) {
///         self.resolved.lock().unwrap().push(service.to_string());
///     }
/// }
///
/// let recorder = Arc::new(Recorder::default());
/// let mut services = ServiceCollection::new();
/// services.add_singleton(5u8);
/// services.add_observer(recorder.clone());
///
/// let provider = services.build();
/// provider.get_required::<u8>();
/// assert_eq!(*recorder.resolved.lock().unwrap(), vec!["u8".to_string()]);
/// ```
pub trait DiObserver: Send + Sync {
    /// Called before a top-level resolution executes.
    fn resolving(&self, service: &ServiceType);

    /// Called after a resolution succeeded.
    fn resolved(&self, service: &ServiceType, duration: Duration);

    /// Called after a resolution failed.
    fn resolution_failed(&self, service: &ServiceType, error: &DiError) {
        let _ = (service, error);
    }

    /// Called once per service type when its call-site graph is realized.
    fn call_site_built(&self, call_site: &CallSite) {
        let _ = call_site;
    }

    /// Called when a scope finishes disposal.
    fn scope_disposed(&self, is_root: bool, disposed: usize) {
        let _ = (is_root, disposed);
    }
}

/// Collection of registered observers.
///
/// Notification is a no-op loop when empty.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn DiObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }

    #[inline]
    pub(crate) fn resolving(&self, service: &ServiceType) {
        for observer in &self.observers {
            observer.resolving(service);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, service: &ServiceType, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(service, duration);
        }
    }

    pub(crate) fn resolution_failed(&self, service: &ServiceType, error: &DiError) {
        for observer in &self.observers {
            observer.resolution_failed(service, error);
        }
    }

    pub(crate) fn call_site_built(&self, call_site: &CallSite) {
        for observer in &self.observers {
            observer.call_site_built(call_site);
        }
    }

    pub(crate) fn scope_disposed(&self, is_root: bool, disposed: usize) {
        for observer in &self.observers {
            observer.scope_disposed(is_root, disposed);
        }
    }
}

/// Observer forwarding every event to `tracing`.
///
/// # Examples
///
/// ```
/// use callsite_di::{ServiceCollection, TracingObserver};
/// use std::sync::Arc;
///
/// let mut services = ServiceCollection::new();
/// services.add_observer(Arc::new(TracingObserver::new()));
/// let provider = services.build();
/// ```
#[derive(Debug, Default)]
pub struct TracingObserver;

impl TracingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl DiObserver for TracingObserver {
    fn resolving(&self, service: &ServiceType) {
        trace!(service = %service, "resolving");
    }

    fn resolved(&self, service: &ServiceType, duration: Duration) {
        trace!(service = %service, elapsed_ns = duration.as_nanos() as u64, "resolved");
    }

    fn resolution_failed(&self, service: &ServiceType, error: &DiError) {
        debug!(service = %service, error = %error, "resolution failed");
    }

    fn call_site_built(&self, call_site: &CallSite) {
        debug!(
            service = %call_site.service_type(),
            kind = call_site.kind().name(),
            lifetime = call_site.lifetime().name(),
            "call site realized"
        );
    }

    fn scope_disposed(&self, is_root: bool, disposed: usize) {
        debug!(is_root, disposed, "scope disposed");
    }
}

/// Observer counting resolutions and their cost.
#[derive(Debug, Default)]
pub struct MetricsObserver {
    resolution_count: AtomicU64,
    failure_count: AtomicU64,
    total_resolution_time: AtomicU64,
    call_sites_built: AtomicU64,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of successful resolutions observed.
    pub fn resolution_count(&self) -> u64 {
        self.resolution_count.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn call_sites_built(&self) -> u64 {
        self.call_sites_built.load(Ordering::Relaxed)
    }

    pub fn total_resolution_time(&self) -> Duration {
        Duration::from_nanos(self.total_resolution_time.load(Ordering::Relaxed))
    }

    /// Average time per successful resolution.
    pub fn average_resolution_time(&self) -> Option<Duration> {
        let count = self.resolution_count();
        if count == 0 {
            return None;
        }
        Some(self.total_resolution_time() / count as u32)
    }

    /// Resets all counters.
    pub fn reset(&self) {
        self.resolution_count.store(0, Ordering::Relaxed);
        self.failure_count.store(0, Ordering::Relaxed);
        self.total_resolution_time.store(0, Ordering::Relaxed);
        self.call_sites_built.store(0, Ordering::Relaxed);
    }
}

impl DiObserver for MetricsObserver {
    fn resolving(&self, _service: &ServiceType) {}

    fn resolved(&self, _service: &ServiceType, duration: Duration) {
        self.resolution_count.fetch_add(1, Ordering::Relaxed);
        self.total_resolution_time
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    fn resolution_failed(&self, _service: &ServiceType, _error: &DiError) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    fn call_site_built(&self, _call_site: &CallSite) {
        self.call_sites_built.fetch_add(1, Ordering::Relaxed);
    }
}
