//! Scopes: per-scope instance caches and ordered disposal.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::activator::ActivatorFactory;
use crate::cache::LifetimeCache;
use crate::constructor::Produced;
use crate::engine::Engine;
use crate::error::{DiError, DiResult};
use crate::internal::{Disposable, DisposeBag};
use crate::key::ServiceType;
use crate::registration::AnyArc;
use crate::traits::ResolverCore;

const OPEN: u8 = 0;
const DISPOSING: u8 = 1;
const DISPOSED: u8 = 2;

/// Lifecycle state of a scope. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Open,
    Disposing,
    Disposed,
}

/// Scoped service container for request-scoped dependency resolution.
///
/// A `Scope` caches scoped services for its own lifetime and reaches
/// singletons through the root scope it was created from. Handles are cheap
/// to clone and share one underlying scope.
///
/// A scoped service holding a handle to its own scope forms a cycle that
/// only [`dispose`](Self::dispose) breaks; see [`ServiceProvider`](crate::ServiceProvider).
///
/// # Lifetime Behavior
///
/// - **Singleton**: Resolved and cached in the root scope (shared across all scopes)
/// - **Scoped**: Resolved and cached within this specific scope
/// - **Transient**: Created fresh on every resolution (no caching)
///
/// # Examples
///
/// ```
/// use callsite_di::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct DatabaseConnection(String);
///
/// struct UserService {
///     db: Arc<DatabaseConnection>,
/// }
///
/// let mut collection = ServiceCollection::new();
///
/// // Scoped database connection per request
/// collection.add_scoped_factory::<DatabaseConnection, _>(|_| {
///     Ok(DatabaseConnection("connection-123".to_string()))
/// });
///
/// // Transient user service that uses scoped DB connection
/// collection.add_transient_factory::<UserService, _>(|scope| {
///     Ok(UserService { db: scope.get::<DatabaseConnection>()? })
/// });
///
/// let provider = collection.build();
/// let scope = provider.create_scope();
///
/// // Multiple services in the same scope share the same DB connection
/// let user1 = scope.get_required::<UserService>();
/// let user2 = scope.get_required::<UserService>();
/// assert!(Arc::ptr_eq(&user1.db, &user2.db));
///
/// scope.dispose().unwrap();
/// assert!(scope.get::<UserService>().is_err());
/// ```
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    engine: Arc<Engine>,
    root: Option<Scope>,
    cache: LifetimeCache,
    disposables: Mutex<DisposeBag>,
    state: AtomicU8,
}

impl Scope {
    pub(crate) fn new_root(engine: Arc<Engine>) -> Self {
        Self::with_root(engine, None)
    }

    fn with_root(engine: Arc<Engine>, root: Option<Scope>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                engine,
                root,
                cache: LifetimeCache::new(),
                disposables: Mutex::new(DisposeBag::default()),
                state: AtomicU8::new(OPEN),
            }),
        }
    }

    /// Creates a child scope sharing this scope's root.
    pub fn create_scope(&self) -> Scope {
        trace!("scope created");
        Self::with_root(self.inner.engine.clone(), Some(self.root().clone()))
    }

    /// Whether this is the provider's root scope.
    pub fn is_root(&self) -> bool {
        self.inner.root.is_none()
    }

    /// The root scope owning singletons.
    pub fn root(&self) -> &Scope {
        self.inner.root.as_ref().unwrap_or(self)
    }

    pub fn scope_factory(&self) -> ScopeFactory {
        ScopeFactory {
            root: self.root().clone(),
        }
    }

    pub fn activator_factory(&self) -> ActivatorFactory {
        ActivatorFactory::new(self.inner.engine.clone())
    }

    pub fn state(&self) -> ScopeState {
        match self.inner.state.load(Ordering::Acquire) {
            OPEN => ScopeState::Open,
            DISPOSING => ScopeState::Disposing,
            _ => ScopeState::Disposed,
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.state() != ScopeState::Open
    }

    /// Number of disposable instances this scope will dispose.
    pub fn tracked_disposables(&self) -> usize {
        self.inner.disposables.lock().len()
    }

    /// Whether both handles refer to the same scope.
    pub fn same_scope(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn ensure_open(&self) -> DiResult<()> {
        if self.inner.state.load(Ordering::Acquire) == OPEN {
            Ok(())
        } else {
            Err(DiError::ScopeDisposed)
        }
    }

    pub(crate) fn engine(&self) -> &Arc<Engine> {
        &self.inner.engine
    }

    pub(crate) fn engine_id(&self) -> usize {
        Arc::as_ptr(&self.inner.engine) as usize
    }

    pub(crate) fn cache(&self) -> &LifetimeCache {
        &self.inner.cache
    }

    /// Takes ownership of a produced value's disposal.
    ///
    /// A disposable produced after disposal started is disposed at once and
    /// the resolution fails.
    pub(crate) fn capture(&self, produced: Produced) -> DiResult<AnyArc> {
        let Some(disposable) = produced.disposable else {
            return Ok(produced.value);
        };

        {
            let mut bag = self.inner.disposables.lock();
            if self.inner.state.load(Ordering::Acquire) == OPEN {
                bag.push(disposable);
                return Ok(produced.value);
            }
        }

        warn!(service = disposable.service(), "instance created while its scope is disposing");
        match disposable {
            Disposable::Sync { target, .. } => target.dispose(),
            Disposable::Async { service, .. } => {
                warn!(service, "async disposable dropped without disposal");
            }
        }
        Err(DiError::ScopeDisposed)
    }

    fn begin_disposal(&self) -> Option<Vec<Disposable>> {
        self.inner
            .state
            .compare_exchange(OPEN, DISPOSING, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(self.inner.disposables.lock().drain_reverse())
    }

    fn finish_disposal(&self, disposed: usize) {
        self.inner.cache.clear();
        self.inner.state.store(DISPOSED, Ordering::Release);
        debug!(is_root = self.is_root(), disposed, "scope disposed");
        self.inner
            .engine
            .observers()
            .scope_disposed(self.is_root(), disposed);
    }

    /// Disposes this scope's instances in reverse creation order.
    ///
    /// Repeated or re-entrant calls are no-ops. Async-only disposables are
    /// skipped and reported with [`DiError::AsyncDisposalRequired`]; use
    /// [`dispose_async`](Self::dispose_async) for scopes holding them.
    /// Disposing the root scope tears down singletons but not child scopes.
    pub fn dispose(&self) -> DiResult<()> {
        let Some(items) = self.begin_disposal() else {
            return Ok(());
        };

        let mut disposed = 0;
        let mut skipped = None;
        for item in items {
            match item {
                Disposable::Sync { target, .. } => {
                    target.dispose();
                    disposed += 1;
                }
                Disposable::Async { service, .. } => {
                    skipped.get_or_insert(service);
                }
            }
        }
        self.finish_disposal(disposed);

        match skipped {
            Some(service) => {
                warn!(service, "async disposable skipped by synchronous disposal");
                Err(DiError::AsyncDisposalRequired(service))
            }
            None => Ok(()),
        }
    }

    /// Disposes this scope's instances in reverse creation order, awaiting
    /// async disposables.
    pub async fn dispose_async(&self) -> DiResult<()> {
        let Some(items) = self.begin_disposal() else {
            return Ok(());
        };

        let disposed = items.len();
        for item in items {
            match item {
                Disposable::Sync { target, .. } => target.dispose(),
                Disposable::Async { target, .. } => target.dispose().await,
            }
        }
        self.finish_disposal(disposed);
        Ok(())
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        let pending = self.disposables.get_mut().len();
        if pending > 0 && self.state.load(Ordering::Acquire) == OPEN {
            warn!(pending, "scope dropped with undisposed instances");
        }
    }
}

impl ResolverCore for Scope {
    fn resolve_any(&self, service_type: &ServiceType) -> DiResult<Option<AnyArc>> {
        self.inner.engine.get_service(service_type, self)
    }
}

impl AsRef<Scope> for Scope {
    fn as_ref(&self) -> &Scope {
        self
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("is_root", &self.is_root())
            .field("state", &self.state())
            .finish()
    }
}

/// Creates child scopes of one provider.
///
/// Resolvable as a service, so a singleton can open scopes of its own.
#[derive(Clone, Debug)]
pub struct ScopeFactory {
    root: Scope,
}

impl ScopeFactory {
    pub fn create_scope(&self) -> Scope {
        self.root.create_scope()
    }
}
