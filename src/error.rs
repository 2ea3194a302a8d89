//! Error types for the dependency injection engine.

use thiserror::Error;

/// Dependency injection errors
///
/// Represents the failure conditions raised while building call-site graphs,
/// resolving services, validating a configuration or tearing down scopes.
/// Every error is returned synchronously to the immediate caller; the engine
/// never retries.
///
/// # Examples
///
/// ```rust
/// use callsite_di::{DiError, ServiceCollection, Resolver};
///
/// let provider = ServiceCollection::new().build();
/// match provider.get::<String>() {
///     Err(DiError::NotFound(type_name)) => {
///         assert_eq!(type_name, "alloc::string::String");
///     }
///     _ => unreachable!(),
/// }
///
/// let circular = DiError::Circular(vec!["ServiceA", "ServiceB", "ServiceA"]);
/// assert_eq!(circular.to_string(), "Circular dependency: ServiceA -> ServiceB -> ServiceA");
/// ```
#[derive(Error, Debug, Clone)]
pub enum DiError {
    /// No descriptor matches the requested service
    #[error("Service not found: {0}")]
    NotFound(&'static str),
    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// Circular dependency detected (includes path)
    #[error("Circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<&'static str>),
    /// No constructor has all of its parameters resolvable
    #[error(
        "Unable to resolve service for type '{parameter}' while attempting to activate '{implementation}'"
    )]
    UnresolvableConstructor {
        implementation: &'static str,
        parameter: &'static str,
    },
    /// Several constructors tie for the most resolvable parameters
    #[error(
        "Unable to activate type '{implementation}': {candidates} constructors with {arity} parameters are equally applicable"
    )]
    AmbiguousConstructor {
        implementation: &'static str,
        arity: usize,
        candidates: usize,
    },
    /// A singleton depends (transitively) on a scoped service
    #[error("Cannot consume scoped service '{scoped}' from singleton '{singleton}'")]
    InvalidLifetimeCapture {
        singleton: &'static str,
        scoped: &'static str,
    },
    /// A scoped service, or one depending on a scoped service, was resolved from the root scope
    #[error("Cannot resolve '{service}' from root provider because it requires scoped service '{scoped}'")]
    DirectScopedResolutionFromRoot {
        service: &'static str,
        scoped: &'static str,
    },
    /// The scope has been disposed
    #[error("Cannot access a disposed scope")]
    ScopeDisposed,
    /// A constructor or factory body reported failure
    #[error("Failed to activate '{service}': {message}")]
    Activation {
        service: &'static str,
        message: String,
    },
    /// Synchronous disposal met a service that only supports async disposal
    #[error("'{0}' only supports async disposal. Use dispose_async() to dispose the scope")]
    AsyncDisposalRequired(&'static str),
    /// Several failures collected by build-time validation
    #[error("Some services are not able to be constructed: {}", format_all(.0))]
    Aggregate(Vec<DiError>),
}

impl DiError {
    /// Creates an [`DiError::Activation`] for a failing factory or constructor body.
    pub fn activation(service: &'static str, message: impl Into<String>) -> Self {
        DiError::Activation {
            service,
            message: message.into(),
        }
    }

    /// Returns the errors contained in an aggregate, or this error alone.
    pub fn flatten(&self) -> Vec<&DiError> {
        match self {
            DiError::Aggregate(errors) => errors.iter().flat_map(DiError::flatten).collect(),
            other => vec![other],
        }
    }
}

fn format_all(errors: &[DiError]) -> String {
    errors
        .iter()
        .map(|e| format!("({e})"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Result type for DI operations
///
/// A convenience type alias for `Result<T, DiError>` used throughout the crate.
pub type DiResult<T> = Result<T, DiError>;
