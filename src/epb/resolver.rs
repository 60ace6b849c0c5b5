use tracing::debug;

use super::proxy::LocalProxy;
use crate::application::Application;
use crate::errors::{NamingError, Result};
use crate::naming::{CallbackResolver, CallbackTarget, Component, DeferredCallback, Value};
use crate::request::RequestContext;

/// Resolves deferred bindings against an application.
pub struct ProxyResolver<'a> {
    application: &'a Application,
    depth: usize,
}

impl<'a> ProxyResolver<'a> {
    pub fn new(application: &'a Application) -> Self {
        Self::nested(application, 0)
    }

    /// Resolver for a lookup issued while another lookup is being resolved.
    pub(crate) fn nested(application: &'a Application, depth: usize) -> Self {
        Self { application, depth }
    }

    /// Generic lookup through the application's component locator.
    pub fn lookup(&self, name: &str, request: Option<&RequestContext>) -> Result<Value> {
        self.application.search_within(name, request, self.depth + 1)
    }

    /// Returns a session bean proxy. Within a request the proxy is created
    /// once and reused for the rest of that request.
    pub fn lookup_proxy(&self, lookup_name: &str, request: Option<&RequestContext>) -> Result<Value> {
        let initial_context = self.application.initial_context();

        let Some(request) = request else {
            return initial_context.lookup(lookup_name, None);
        };

        if let Some(proxy) = request.cached_proxy(lookup_name) {
            debug!("Reusing proxy {} for request {}", lookup_name, request.id());
            return Ok(proxy);
        }

        let proxy = initial_context.lookup(lookup_name, Some(request))?;
        request.cache_proxy(lookup_name, proxy.clone());
        Ok(proxy)
    }

    /// Returns the bean instance itself rather than a proxy. `request` is
    /// kept so a stateful bean reached through another binding stays scoped.
    pub fn lookup_bean(&self, bean_name: &str, request: Option<&RequestContext>) -> Result<Value> {
        self.application.search_within(bean_name, request, self.depth + 1)
    }

    /// Wraps the bean in a same-process proxy that enforces its business interface.
    pub fn lookup_local_proxy(&self, lookup_name: &str, request: Option<&RequestContext>) -> Result<Value> {
        let bean_name = lookup_name.strip_suffix("/local").unwrap_or(lookup_name);

        let bean_manager = self.application.bean_manager()?;
        let instance = self
            .lookup_bean(bean_name, request)?
            .as_object()
            .cloned()
            .ok_or_else(|| NamingError::NotBound(format!("{} (not a bean)", bean_name)))?;

        let descriptor = self
            .application
            .object_manager()
            .get(instance.type_name())
            .ok_or_else(|| NamingError::NotBound(format!("object descriptor for {}", instance.type_name())))?;

        Ok(Value::object(LocalProxy::new(bean_manager, descriptor, instance)))
    }

    pub fn lookup_persistence_unit(&self, unit_name: &str, request: Option<&RequestContext>) -> Result<Value> {
        self.application
            .persistence_manager()?
            .lookup_proxy(unit_name, request)
    }
}

impl CallbackResolver for ProxyResolver<'_> {
    fn resolve(&self, callback: &DeferredCallback, request: Option<&RequestContext>) -> Result<Value> {
        let name = callback.name().ok_or_else(|| {
            NamingError::invalid_name("", format!("{} callback bound without a name", callback.target))
        })?;

        match callback.target {
            CallbackTarget::Lookup => self.lookup(name, request),
            CallbackTarget::LookupProxy => self.lookup_proxy(name, request),
            CallbackTarget::LookupBean => self.lookup_bean(name, request),
            CallbackTarget::LookupLocalProxy => self.lookup_local_proxy(name, request),
            CallbackTarget::PersistenceUnitProxy => self.lookup_persistence_unit(name, request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{BeanManager, InitialContext};
    use crate::epb::descriptor::{ObjectDescriptor, SessionType};
    use parking_lot::Mutex;
    use std::any::Any;
    use std::sync::Arc;

    /// Records every lookup it receives together with the request's session.
    #[derive(Default)]
    struct RecordingContext {
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl InitialContext for RecordingContext {
        fn lookup(&self, lookup_name: &str, request: Option<&RequestContext>) -> Result<Value> {
            let session = request.and_then(|r| r.session_id()).map(str::to_string);
            let mut calls = self.calls.lock();
            calls.push((lookup_name.to_string(), session));
            Ok(Value::Literal(format!("proxy#{}", calls.len())))
        }
    }

    #[derive(Debug)]
    struct Cart;

    impl Component for Cart {
        fn type_name(&self) -> &str {
            "App\\Cart"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct EchoBeans;

    impl BeanManager for EchoBeans {
        fn invoke(
            &self,
            descriptor: &ObjectDescriptor,
            _instance: &Arc<dyn Component>,
            method: &str,
            _args: &[Value],
        ) -> Result<Value> {
            Ok(Value::Literal(format!("{}::{}", descriptor.name, method)))
        }
    }

    fn application(context: Arc<RecordingContext>) -> Application {
        Application::new("shop", context).with_bean_manager(Arc::new(EchoBeans))
    }

    #[test]
    fn lookup_proxy_passes_the_active_request() {
        let context = Arc::new(RecordingContext::default());
        let app = application(context.clone());
        let resolver = ProxyResolver::new(&app);

        let request = RequestContext::with_session("s-1");
        resolver.lookup_proxy("Cart/local", Some(&request)).unwrap();
        resolver.lookup_proxy("Cart/local", None).unwrap();

        assert_eq!(
            *context.calls.lock(),
            vec![
                ("Cart/local".to_string(), Some("s-1".to_string())),
                ("Cart/local".to_string(), None),
            ]
        );
    }

    #[test]
    fn lookup_proxy_is_cached_for_the_request() {
        let context = Arc::new(RecordingContext::default());
        let app = application(context.clone());
        let resolver = ProxyResolver::new(&app);

        let request = RequestContext::new();
        let first = resolver.lookup_proxy("Cart/local", Some(&request)).unwrap();
        let second = resolver.lookup_proxy("Cart/local", Some(&request)).unwrap();
        assert_eq!(first, second);
        assert_eq!(context.calls.lock().len(), 1);
        assert_eq!(request.cached_proxy_count(), 1);

        let other = resolver.lookup_proxy("Cart/local", Some(&RequestContext::new())).unwrap();
        assert_ne!(first, other);
    }

    #[test]
    fn local_proxy_wraps_the_bean() {
        let app = application(Arc::new(RecordingContext::default()));
        app.register_component("Cart", Arc::new(Cart));
        app.object_manager().add(ObjectDescriptor {
            name: "Cart".into(),
            class_name: "App\\Cart".into(),
            session_type: SessionType::Stateful,
            methods: vec!["add".into()],
        });

        let value = ProxyResolver::new(&app).lookup_local_proxy("Cart/local", None).unwrap();
        let proxy = value.downcast_ref::<LocalProxy>().unwrap();
        assert_eq!(proxy.descriptor().name, "Cart");
        assert_eq!(proxy.invoke("add", &[]).unwrap().as_literal(), Some("Cart::add"));
        assert!(matches!(proxy.invoke("remove", &[]), Err(NamingError::Invocation { .. })));
    }

    #[test]
    fn local_proxy_needs_a_descriptor() {
        let app = application(Arc::new(RecordingContext::default()));
        app.register_component("Cart", Arc::new(Cart));
        assert!(matches!(
            ProxyResolver::new(&app).lookup_local_proxy("Cart/local", None),
            Err(NamingError::NotBound(_))
        ));
    }

    #[test]
    fn callbacks_without_a_name_are_rejected() {
        let app = application(Arc::new(RecordingContext::default()));
        let callback = DeferredCallback::new(CallbackTarget::LookupBean, Vec::<String>::new());
        assert!(matches!(
            ProxyResolver::new(&app).resolve(&callback, None),
            Err(NamingError::InvalidName { .. })
        ));
    }

    #[test]
    fn self_referencing_lookups_terminate() {
        let app = application(Arc::new(RecordingContext::default()));
        app.naming_directory()
            .bind_callback("php:global/shop/loop", CallbackTarget::Lookup, ["loop"])
            .unwrap();
        assert!(matches!(
            app.lookup("php:global/shop/loop", None),
            Err(NamingError::CyclicBinding { .. })
        ));
    }
}
