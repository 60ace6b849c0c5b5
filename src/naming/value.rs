use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A server-managed object that can be bound in, or resolved through, the naming directory.
pub trait Component: Any + Send + Sync + fmt::Debug {
    /// Runtime type name, used to find the component's object descriptor.
    fn type_name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;

    /// Short human readable description, used when a lookup result is rendered.
    fn describe(&self) -> serde_json::Value {
        serde_json::json!({ "type": self.type_name() })
    }
}

/// What a lookup hands back to its caller.
#[derive(Debug, Clone)]
pub enum Value {
    Literal(String),
    Object(Arc<dyn Component>),
}

impl Value {
    pub fn object<C: Component>(component: C) -> Self {
        Value::Object(Arc::new(component))
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Value::Literal(value) => Some(value),
            Value::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<dyn Component>> {
        match self {
            Value::Object(component) => Some(component),
            Value::Literal(_) => None,
        }
    }

    /// Downcasts an object value to its concrete type.
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_object()?.as_any().downcast_ref::<T>()
    }

    pub fn describe(&self) -> serde_json::Value {
        match self {
            Value::Literal(value) => serde_json::Value::String(value.clone()),
            Value::Object(component) => component.describe(),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Literal(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Literal(value)
    }
}

impl From<Arc<dyn Component>> for Value {
    fn from(component: Arc<dyn Component>) -> Self {
        Value::Object(component)
    }
}

impl PartialEq for Value {
    /// Literals compare by content, objects by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Literal(a), Value::Literal(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
