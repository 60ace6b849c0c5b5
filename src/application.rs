use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::epb::descriptor::{ObjectDescriptor, ObjectManager};
use crate::epb::resolver::ProxyResolver;
use crate::errors::{NamingError, Result};
use crate::naming::{Component, NamingDirectory, NamingUri, Value, DEFAULT_SCHEME, MAX_REFERENCE_HOPS};
use crate::request::RequestContext;

/// Identifier the bean manager is located by.
pub const BEAN_CONTEXT_IDENTIFIER: &str = "BeanContextInterface";
/// Identifier the persistence context manager is located by.
pub const PERSISTENCE_CONTEXT_IDENTIFIER: &str = "PersistenceContextInterface";

/// Creates session bean proxies. `request` scopes stateful beans to the caller's session.
pub trait InitialContext: Send + Sync {
    fn lookup(&self, lookup_name: &str, request: Option<&RequestContext>) -> Result<Value>;
}

/// Dispatches business method calls to bean instances.
pub trait BeanManager: Send + Sync {
    fn invoke(
        &self,
        descriptor: &ObjectDescriptor,
        instance: &Arc<dyn Component>,
        method: &str,
        args: &[Value],
    ) -> Result<Value>;
}

/// Hands out proxies for configured persistence units.
pub trait PersistenceManager: Send + Sync {
    fn lookup_proxy(&self, unit_name: &str, request: Option<&RequestContext>) -> Result<Value>;
}

/// A deployed application: owns its naming directory and the managers its
/// references resolve against.
pub struct Application {
    name: String,
    unique_name: String,
    naming_directory: NamingDirectory,
    initial_context: Arc<dyn InitialContext>,
    components: RwLock<HashMap<String, Arc<dyn Component>>>,
    object_manager: ObjectManager,
    bean_manager: Option<Arc<dyn BeanManager>>,
    persistence_manager: Option<Arc<dyn PersistenceManager>>,
}

impl Application {
    pub fn new(name: impl Into<String>, initial_context: Arc<dyn InitialContext>) -> Self {
        let name = name.into();
        Self {
            unique_name: name.clone(),
            name,
            naming_directory: NamingDirectory::new(),
            initial_context,
            components: RwLock::new(HashMap::new()),
            object_manager: ObjectManager::new(),
            bean_manager: None,
            persistence_manager: None,
        }
    }

    pub fn with_unique_name(mut self, unique_name: impl Into<String>) -> Self {
        self.unique_name = unique_name.into();
        self
    }

    pub fn with_bean_manager(mut self, manager: Arc<dyn BeanManager>) -> Self {
        self.bean_manager = Some(manager);
        self
    }

    pub fn with_persistence_manager(mut self, manager: Arc<dyn PersistenceManager>) -> Self {
        self.persistence_manager = Some(manager);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    pub fn naming_directory(&self) -> &NamingDirectory {
        &self.naming_directory
    }

    pub fn initial_context(&self) -> &Arc<dyn InitialContext> {
        &self.initial_context
    }

    pub fn object_manager(&self) -> &ObjectManager {
        &self.object_manager
    }

    pub fn bean_manager(&self) -> Result<Arc<dyn BeanManager>> {
        self.bean_manager
            .clone()
            .ok_or_else(|| NamingError::MissingManager(BEAN_CONTEXT_IDENTIFIER.to_string()))
    }

    pub fn persistence_manager(&self) -> Result<Arc<dyn PersistenceManager>> {
        self.persistence_manager
            .clone()
            .ok_or_else(|| NamingError::MissingManager(PERSISTENCE_CONTEXT_IDENTIFIER.to_string()))
    }

    /// `php:global/<unique name>/<name>`
    pub fn global_uri(&self, name: &str) -> Result<NamingUri> {
        NamingUri::global(&self.unique_name, name)
    }

    /// Makes `component` findable through [`Application::search`].
    pub fn register_component(&self, identifier: impl Into<String>, component: Arc<dyn Component>) {
        let identifier = identifier.into();
        debug!("Registering component {} in application {}", identifier, self.name);
        self.components.write().insert(identifier, component);
    }

    /// Locates a component: registered components first, then full naming
    /// URIs, then names relative to the application's global context.
    pub fn search(&self, identifier: &str) -> Result<Value> {
        self.search_within(identifier, None, 0)
    }

    pub(crate) fn search_within(
        &self,
        identifier: &str,
        request: Option<&RequestContext>,
        depth: usize,
    ) -> Result<Value> {
        if let Some(component) = self.components.read().get(identifier) {
            return Ok(Value::Object(component.clone()));
        }

        if depth > MAX_REFERENCE_HOPS {
            return Err(NamingError::CyclicBinding {
                uri: identifier.to_string(),
                hops: MAX_REFERENCE_HOPS,
            });
        }

        let resolver = ProxyResolver::nested(self, depth);
        let uri = if identifier.starts_with(&format!("{}:", DEFAULT_SCHEME)) {
            NamingUri::parse(identifier)?
        } else {
            self.global_uri(identifier)?
        };

        self.naming_directory
            .lookup_uri(&uri, request, &resolver)
            .map_err(|err| match err {
                NamingError::NotBound(_) => NamingError::NotBound(identifier.to_string()),
                other => other,
            })
    }

    /// Resolves `name` against this application's directory.
    pub fn lookup(&self, name: &str, request: Option<&RequestContext>) -> Result<Value> {
        self.naming_directory
            .lookup(name, request, &ProxyResolver::new(self))
    }

    /// Removes every binding under the application's global context.
    pub fn undeploy(&self) -> Result<()> {
        let root = format!("{}:global/{}", DEFAULT_SCHEME, self.unique_name);
        match self.naming_directory.unbind(&root) {
            Ok(()) | Err(NamingError::NotBound(_)) => {
                self.components.write().clear();
                info!("Undeployed application {}", self.name);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("name", &self.name)
            .field("unique_name", &self.unique_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    struct NoProxies;

    impl InitialContext for NoProxies {
        fn lookup(&self, lookup_name: &str, _request: Option<&RequestContext>) -> Result<Value> {
            Err(NamingError::NotBound(lookup_name.to_string()))
        }
    }

    #[derive(Debug)]
    struct Mailer;

    impl Component for Mailer {
        fn type_name(&self) -> &str {
            "App\\Mailer"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn application() -> Application {
        Application::new("shop", Arc::new(NoProxies)).with_unique_name("shop-1")
    }

    #[test]
    fn search_prefers_registered_components() {
        let app = application();
        app.register_component("Mailer", Arc::new(Mailer));
        assert!(app.search("Mailer").unwrap().downcast_ref::<Mailer>().is_some());
    }

    #[test]
    fn search_falls_back_to_the_global_context() {
        let app = application();
        app.naming_directory()
            .bind_value("php:global/shop-1/env/currency", "EUR")
            .unwrap();

        assert_eq!(app.search("env/currency").unwrap().as_literal(), Some("EUR"));
        assert_eq!(
            app.search("php:global/shop-1/env/currency").unwrap().as_literal(),
            Some("EUR")
        );
        assert_eq!(
            app.search("missing").unwrap_err(),
            NamingError::NotBound("missing".into())
        );
    }

    #[test]
    fn missing_managers_are_reported() {
        let app = application();
        assert!(matches!(app.bean_manager(), Err(NamingError::MissingManager(_))));
        assert_eq!(
            app.persistence_manager().err(),
            Some(NamingError::MissingManager(PERSISTENCE_CONTEXT_IDENTIFIER.into()))
        );
    }

    #[test]
    fn undeploy_removes_only_this_application() {
        let app = application();
        app.naming_directory().bind_value("php:global/shop-1/a", "1").unwrap();
        app.naming_directory().bind_value("php:global/other/b", "2").unwrap();

        app.undeploy().unwrap();
        assert!(!app.naming_directory().is_bound("php:global/shop-1/a").unwrap());
        assert!(app.naming_directory().is_bound("php:global/other/b").unwrap());
        app.undeploy().unwrap();
    }
}
