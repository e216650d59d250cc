//! # ferrous-resolve
//!
//! Scope-aware dependency resolution for Rust: registrations, lifetime
//! scopes, a phased middleware pipeline and deterministic disposal.
//!
//! ## Features
//!
//! - **Lifetimes**: root singletons, per-scope and per-matching-scope sharing, per-dependency instances
//! - **Scope tree**: nested lifetime scopes with tags, disposed children first in reverse creation order
//! - **Pipeline**: every resolution runs through phased middleware that can be extended per container, service or registration
//! - **Circular dependency detection**: re-entrant construction fails with the full service path
//! - **Relationship types**: `All<T>`, `Lazy<T>`, `Owned<T>`, `Factory<T>`, `Index<T>` and `Meta<T>` without extra registrations
//! - **Decorators**: conditional wrapping of resolved instances, composed in registration order
//! - **Thread-safe**: shared instances are built at most once per owning scope
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_resolve::{ContainerBuilder, Resolver};
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
//! let mut builder = ContainerBuilder::new();
//! builder.register_instance(Arc::new(Database {
//!     connection_string: "postgres://localhost".to_string(),
//! }));
//! builder.register(|ctx, _| Ok(Arc::new(UserService { db: ctx.resolve::<Database>()? })));
//!
//! let container = builder.build().unwrap();
//! let users = container.resolve::<UserService>().unwrap();
//! assert_eq!(users.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Lifetimes
//!
//! - **Root**: created once and owned by the root scope
//! - **Matching scope**: created once per scope (optionally only scopes with a given tag)
//! - **Per dependency**: created fresh on every resolution
//!
//! ## Trait Resolution
//!
//! ```rust
//! use ferrous_resolve::{ContainerBuilder, Resolver};
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, message: &str) -> String;
//! }
//!
//! struct ConsoleLogger;
//! impl Logger for ConsoleLogger {
//!     fn log(&self, message: &str) -> String {
//!         format!("[LOG] {message}")
//!     }
//! }
//!
//! let mut builder = ContainerBuilder::new();
//! builder.register_instance(Arc::new(ConsoleLogger) as Arc<dyn Logger>);
//!
//! let container = builder.build().unwrap();
//! let logger = container.resolve::<dyn Logger>().unwrap();
//! assert_eq!(logger.log("Hello"), "[LOG] Hello");
//! ```
//!
//! ## Scopes
//!
//! ```rust
//! use ferrous_resolve::{ContainerBuilder, Resolver};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! struct RequestId(u32);
//!
//! let next = Arc::new(AtomicU32::new(0));
//! let mut builder = ContainerBuilder::new();
//! builder
//!     .register(move |_, _| Ok(Arc::new(RequestId(next.fetch_add(1, Ordering::SeqCst)))))
//!     .instance_per_scope();
//! let container = builder.build().unwrap();
//!
//! let first = container.begin_scope().unwrap();
//! let second = container.begin_scope().unwrap();
//! assert_eq!(first.resolve::<RequestId>().unwrap().0, first.resolve::<RequestId>().unwrap().0);
//! assert_ne!(first.resolve::<RequestId>().unwrap().0, second.resolve::<RequestId>().unwrap().0);
//! first.dispose().unwrap();
//! ```

pub mod config;
pub mod container;
pub mod decoration;
pub mod descriptors;
pub mod disposer;
pub mod error;
pub mod instance;
pub mod lifetime;
pub mod metadata;
pub mod observer;
pub mod operation;
pub mod parameters;
pub mod pipeline;
pub mod registration;
pub mod registry;
pub mod scope;
pub mod service;
pub mod sources;
pub mod traits;

mod internal;

pub use config::ContainerOptions;
pub use container::{Container, ContainerBuilder, DecoratorBuilder, RegistrationBuilder};
pub use decoration::{DecoratorCondition, DecoratorContext, DecoratorRegistration};
pub use descriptors::ComponentDescriptor;
pub use disposer::{Disposer, DisposerEntry};
pub use error::{BoxError, DiError, DiResult, DisposalErrors};
pub use instance::Instance;
pub use lifetime::{Lifetime, Ownership, ScopeMatcher, ScopeTag};
pub use metadata::{Metadata, MetadataValue};
pub use observer::{ResolveObserver, TracingObserver};
pub use operation::{ResolveContext, ResolveOperation};
pub use parameters::{Parameter, Parameters};
pub use pipeline::{InsertionMode, PipelinePhase, ResolveMiddleware, ResolvePipeline};
pub use registration::{
    ActivatedEvent, ActivatingEvent, ComponentRegistration, ComponentRegistrationBuilder, RegistrationId,
    RegistrationOrigin,
};
pub use registry::{ComponentRegistry, ComponentRegistryBuilder};
pub use scope::{LifetimeScope, WeakScope};
pub use service::{AdapterInfo, AdapterKind, Service, ServiceKey};
pub use sources::{All, Factory, Index, Lazy, Meta, Owned, RegistrationSource};
pub use traits::{AsyncDispose, Dispose, DisposeResult, Resolver, ResolverCore};
