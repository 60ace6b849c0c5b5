//! # PHP application server naming core
//!
//! Hosts the naming directory of deployed PHP applications: a hierarchical,
//! thread-safe registry binding `php:global/<app>/<name>` URIs to literal
//! values, aliases or deferred callbacks, plus the registrar that turns an
//! application's declared enterprise bean, resource, bean and persistence
//! unit references into such bindings.
//!
//! ```no_run
//! use std::sync::Arc;
//! use php_appserver::container::BeanContainer;
//! use php_appserver::epb::{EpbReference, ReferenceRegistrar};
//! use php_appserver::{Application, RequestContext};
//!
//! let container = Arc::new(BeanContainer::new([]));
//! let app = Application::new("app1", container.clone()).with_bean_manager(container);
//!
//! let reference = EpbReference::new("Foo")
//!     .with_bean_name("FooBean")
//!     .with_bean_interface("FooBeanLocal");
//! ReferenceRegistrar::new(&app).register_epb_reference(&reference);
//!
//! let request = RequestContext::with_session("session-1");
//! let proxy = app.lookup("php:global/app1/Foo", Some(&request));
//! ```

pub mod application;
pub mod config;
pub mod container;
pub mod deployment;
pub mod epb;
pub mod errors;
pub mod naming;
pub mod request;
pub mod server;

pub use application::{Application, BeanManager, InitialContext, PersistenceManager};
pub use errors::{NamingError, Result};
pub use naming::{Binding, CallbackTarget, Component, NamingDirectory, NamingUri, Value};
pub use request::RequestContext;
