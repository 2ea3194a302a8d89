//! # callsite-di
//!
//! Dependency resolution engine inspired by Microsoft.Extensions.DependencyInjection.
//!
//! Registrations are turned into call-site graphs (one node per activation
//! step), checked for cycles and captive dependencies, and executed by a
//! configurable strategy. Instances are cached per lifetime and disposed by
//! the scope that owns them.
//!
//! ## Features
//!
//! - **Lifetimes**: Singleton, Scoped, and Transient services
//! - **Constructor selection**: Types list their constructors; the longest satisfiable one wins
//! - **Collections**: Every registration of a service, in registration order
//! - **Open generics**: One registration serves every closed instantiation
//! - **Validation**: Cycles, captive dependencies and root-scoped resolution are reported
//! - **Execution strategies**: Interpreted, compiled to closures, or adaptive
//!
//! ## Quick Start
//!
//! ```rust
//! use callsite_di::{Constructor, Injectable, Resolver, ServiceCollection};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! impl Injectable for UserService {
//!     fn constructors() -> Vec<Constructor> {
//!         vec![
//!             Constructor::of::<Self>()
//!                 .param::<Database>()
//!                 .build(|args| Ok(UserService { db: args.next()? })),
//!         ]
//!     }
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_singleton(Database {
//!     connection_string: "postgres://localhost".to_string(),
//! });
//! services.add_transient_type::<UserService>();
//!
//! let provider = services.build();
//! let user_service = provider.get_required::<UserService>();
//! assert_eq!(user_service.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Service Lifetimes
//!
//! - **Singleton**: Created once and shared across the entire application
//! - **Scoped**: Created once per scope (ideal for web request contexts)
//! - **Transient**: Created fresh on every resolution
//!
//! ## Collections
//!
//! ```rust
//! use callsite_di::{ServiceCollection, Resolver};
//! use std::sync::Arc;
//!
//! trait Handler: Send + Sync {
//!     fn name(&self) -> &'static str;
//! }
//!
//! struct Audit;
//! impl Handler for Audit {
//!     fn name(&self) -> &'static str { "audit" }
//! }
//!
//! struct Mail;
//! impl Handler for Mail {
//!     fn name(&self) -> &'static str { "mail" }
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_singleton_trait::<dyn Handler>(Arc::new(Audit));
//! services.add_singleton_trait::<dyn Handler>(Arc::new(Mail));
//!
//! let provider = services.build();
//! let names: Vec<_> = provider.get_all_trait::<dyn Handler>().unwrap()
//!     .iter()
//!     .map(|h| h.name())
//!     .collect();
//! assert_eq!(names, vec!["audit", "mail"]);
//!
//! // Single resolution picks the last registration
//! assert_eq!(provider.get_required_trait::<dyn Handler>().name(), "mail");
//! ```
//!
//! ## Scoped Services
//!
//! ```rust
//! use callsite_di::{ServiceCollection, Resolver};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! struct RequestId(usize);
//!
//! let counter = Arc::new(AtomicUsize::new(0));
//! let next = counter.clone();
//!
//! let mut services = ServiceCollection::new();
//! services.add_scoped_factory::<RequestId, _>(move |_| {
//!     Ok(RequestId(next.fetch_add(1, Ordering::SeqCst)))
//! });
//!
//! let provider = services.build();
//! let scope1 = provider.create_scope();
//! let scope2 = provider.create_scope();
//!
//! let req1 = scope1.get_required::<RequestId>();
//! let again = scope1.get_required::<RequestId>();
//! let req2 = scope2.get_required::<RequestId>();
//! assert!(Arc::ptr_eq(&req1, &again));
//! assert_ne!(req1.0, req2.0);
//! ```

// Module declarations
pub mod call_site;
pub mod collection;
pub mod config;
pub mod constructor;
pub mod descriptors;
pub mod error;
pub mod key;
pub mod lifetime;
pub mod observer;
pub mod provider;
pub mod traits;

mod cache;
mod engine;
mod internal;
mod registration;
mod validation;

// Re-exports
pub use call_site::{CacheLocation, CallSite, CallSiteKind, ResultCache};
pub use collection::ServiceCollection;
pub use config::{ServiceProviderMode, ServiceProviderOptions};
pub use constructor::{ActivateFn, Args, Constructor, ConstructorBuilder, Injectable, Parameter, Produced};
pub use descriptors::{CastFn, FactoryFn, Implementation, ServiceDescriptor};
pub use error::{DiError, DiResult};
pub use key::{CacheKey, Generic, GenericType, ServiceType, TypeInfo};
pub use lifetime::Lifetime;
pub use observer::{DiObserver, MetricsObserver, TracingObserver};
pub use provider::{
    ActivatorFactory, InstanceArgs, InstanceFactory, Scope, ScopeFactory, ScopeState,
    ServiceActivator, ServiceProvider,
};
pub use registration::{AnyArc, ServiceList};
pub use traits::{AsyncDispose, Dispose, Resolver, ResolverCore};
