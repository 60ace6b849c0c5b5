use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::descriptor::ObjectDescriptor;
use crate::application::BeanManager;
use crate::errors::{NamingError, Result};
use crate::naming::{Component, Value};

/// Same-process proxy: enforces the bean's business interface, no marshaling.
pub struct LocalProxy {
    bean_manager: Arc<dyn BeanManager>,
    descriptor: ObjectDescriptor,
    instance: Arc<dyn Component>,
}

impl LocalProxy {
    pub fn new(
        bean_manager: Arc<dyn BeanManager>,
        descriptor: ObjectDescriptor,
        instance: Arc<dyn Component>,
    ) -> Self {
        Self {
            bean_manager,
            descriptor,
            instance,
        }
    }

    pub fn descriptor(&self) -> &ObjectDescriptor {
        &self.descriptor
    }

    pub fn instance(&self) -> &Arc<dyn Component> {
        &self.instance
    }

    pub fn invoke(&self, method: &str, args: &[Value]) -> Result<Value> {
        if !self.descriptor.exposes(method) {
            return Err(NamingError::Invocation {
                bean: self.descriptor.name.clone(),
                method: method.to_string(),
                reason: "not part of the business interface".to_string(),
            });
        }
        self.bean_manager
            .invoke(&self.descriptor, &self.instance, method, args)
    }
}

impl fmt::Debug for LocalProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalProxy")
            .field("bean", &self.descriptor.name)
            .field("instance", &self.instance)
            .finish()
    }
}

impl Component for LocalProxy {
    fn type_name(&self) -> &str {
        "LocalProxy"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "type": self.type_name(),
            "bean": self.descriptor.name,
            "class": self.descriptor.class_name,
            "methods": self.descriptor.methods,
        })
    }
}
