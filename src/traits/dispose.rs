//! Disposal traits for resource cleanup.

/// Trait for synchronous resource disposal.
///
/// Implement this trait for services that need structured teardown (e.g., flushing caches,
/// closing connections). The owning scope disposes its instances in reverse creation order.
///
/// # Examples
///
/// ```
/// use callsite_di::{Dispose, Lifetime, ServiceCollection, Resolver};
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Cache {
///     flushed: AtomicBool,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) {
///         self.flushed.store(true, Ordering::SeqCst);
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_disposable_factory::<Cache, _>(Lifetime::Scoped, |_| {
///     Ok(Cache { flushed: AtomicBool::new(false) })
/// });
///
/// let provider = services.build();
/// let scope = provider.create_scope();
/// let cache = scope.get_required::<Cache>();
/// scope.dispose().unwrap();
/// assert!(cache.flushed.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self);
}

/// Trait for asynchronous resource disposal.
///
/// Implement this trait for services that require async teardown (e.g., graceful connection
/// shutdown, async I/O cleanup). Scopes holding such services must be torn down with
/// `dispose_async`.
///
/// # Examples
///
/// ```
/// use callsite_di::{AsyncDispose, Lifetime, ServiceCollection, Resolver};
/// use async_trait::async_trait;
///
/// struct DatabaseClient {
///     connection_id: String,
/// }
///
/// #[async_trait]
/// impl AsyncDispose for DatabaseClient {
///     async fn dispose(&self) {
///         println!("Closing database connection: {}", self.connection_id);
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_async_disposable_factory::<DatabaseClient, _>(Lifetime::Singleton, |_| {
///     Ok(DatabaseClient { connection_id: "conn_123".to_string() })
/// });
/// ```
#[async_trait::async_trait]
pub trait AsyncDispose: Send + Sync + 'static {
    /// Perform asynchronous cleanup of resources.
    async fn dispose(&self);
}
