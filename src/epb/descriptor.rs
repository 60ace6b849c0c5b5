//! Parsed reference and bean declarations, as produced by the deployment parser.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Reference to an enterprise bean, either by lookup name or by bean name and business interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpbReference {
    pub ref_name: String,
    #[serde(default)]
    pub lookup: Option<String>,
    #[serde(default)]
    pub bean_name: Option<String>,
    #[serde(default)]
    pub bean_interface: Option<String>,
}

impl EpbReference {
    pub fn new(ref_name: impl Into<String>) -> Self {
        Self {
            ref_name: ref_name.into(),
            ..Self::default()
        }
    }

    pub fn with_lookup(mut self, lookup: impl Into<String>) -> Self {
        self.lookup = Some(lookup.into());
        self
    }

    pub fn with_bean_name(mut self, bean_name: impl Into<String>) -> Self {
        self.bean_name = Some(bean_name.into());
        self
    }

    pub fn with_bean_interface(mut self, bean_interface: impl Into<String>) -> Self {
        self.bean_interface = Some(bean_interface.into());
        self
    }

    pub fn lookup(&self) -> Option<&str> {
        non_empty(&self.lookup)
    }

    pub fn bean_name(&self) -> Option<&str> {
        non_empty(&self.bean_name)
    }

    pub fn bean_interface(&self) -> Option<&str> {
        non_empty(&self.bean_interface)
    }
}

/// Reference to a resource, by lookup name or by resource type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResReference {
    pub ref_name: String,
    #[serde(default)]
    pub lookup: Option<String>,
    #[serde(default, rename = "type")]
    pub res_type: Option<String>,
}

impl ResReference {
    pub fn new(ref_name: impl Into<String>) -> Self {
        Self {
            ref_name: ref_name.into(),
            ..Self::default()
        }
    }

    pub fn with_lookup(mut self, lookup: impl Into<String>) -> Self {
        self.lookup = Some(lookup.into());
        self
    }

    pub fn with_type(mut self, res_type: impl Into<String>) -> Self {
        self.res_type = Some(res_type.into());
        self
    }

    pub fn lookup(&self) -> Option<&str> {
        non_empty(&self.lookup)
    }

    pub fn res_type(&self) -> Option<&str> {
        non_empty(&self.res_type)
    }
}

/// Reference to a plain bean resolved in-process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeanReference {
    pub ref_name: String,
    #[serde(default)]
    pub bean_name: Option<String>,
}

impl BeanReference {
    pub fn new(ref_name: impl Into<String>) -> Self {
        Self {
            ref_name: ref_name.into(),
            ..Self::default()
        }
    }

    pub fn with_bean_name(mut self, bean_name: impl Into<String>) -> Self {
        self.bean_name = Some(bean_name.into());
        self
    }

    pub fn bean_name(&self) -> Option<&str> {
        non_empty(&self.bean_name)
    }
}

/// Reference to a persistence unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceUnitReference {
    pub ref_name: String,
    #[serde(default)]
    pub unit_name: Option<String>,
}

impl PersistenceUnitReference {
    pub fn new(ref_name: impl Into<String>) -> Self {
        Self {
            ref_name: ref_name.into(),
            ..Self::default()
        }
    }

    pub fn with_unit_name(mut self, unit_name: impl Into<String>) -> Self {
        self.unit_name = Some(unit_name.into());
        self
    }

    pub fn unit_name(&self) -> Option<&str> {
        non_empty(&self.unit_name)
    }
}

/// All references a deployment declares, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDescriptors {
    #[serde(default)]
    pub epb_references: Vec<EpbReference>,
    #[serde(default)]
    pub res_references: Vec<ResReference>,
    #[serde(default)]
    pub bean_references: Vec<BeanReference>,
    #[serde(default)]
    pub persistence_unit_references: Vec<PersistenceUnitReference>,
}

impl ReferenceDescriptors {
    pub fn len(&self) -> usize {
        self.epb_references.len()
            + self.res_references.len()
            + self.bean_references.len()
            + self.persistence_unit_references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionType {
    #[default]
    Stateless,
    Stateful,
    Singleton,
    MessageDriven,
}

/// Declaration of a bean class and its business interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    pub name: String,
    pub class_name: String,
    #[serde(default)]
    pub session_type: SessionType,
    #[serde(default)]
    pub methods: Vec<String>,
}

impl ObjectDescriptor {
    pub fn exposes(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m == method)
    }
}

/// Object descriptors of an application, keyed by class name.
#[derive(Debug, Default)]
pub struct ObjectManager {
    descriptors: RwLock<HashMap<String, ObjectDescriptor>>,
}

impl ObjectManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, descriptor: ObjectDescriptor) {
        self.descriptors
            .write()
            .insert(descriptor.class_name.clone(), descriptor);
    }

    pub fn get(&self, class_name: &str) -> Option<ObjectDescriptor> {
        self.descriptors.read().get(class_name).cloned()
    }
}
