//! In-process bean container backing the beans and persistence units a
//! deployment file declares.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::application::{BeanManager, InitialContext, PersistenceManager};
use crate::epb::descriptor::{ObjectDescriptor, SessionType};
use crate::errors::{NamingError, Result};
use crate::naming::{Component, Value};
use crate::request::RequestContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interface {
    Local,
    Remote,
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interface::Local => f.write_str("local"),
            Interface::Remote => f.write_str("remote"),
        }
    }
}

/// A live bean instance.
#[derive(Debug)]
pub struct BeanInstance {
    id: u64,
    bean_name: String,
    class_name: String,
    calls: Mutex<Vec<String>>,
}

impl BeanInstance {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn bean_name(&self) -> &str {
        &self.bean_name
    }

    /// Business methods invoked on this instance, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl Component for BeanInstance {
    fn type_name(&self) -> &str {
        &self.class_name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "type": self.class_name,
            "bean": self.bean_name,
            "instance": self.id,
        })
    }
}

/// Proxy handed out for `<bean>/local` and `<bean>/remote` lookups.
#[derive(Debug)]
pub struct SessionProxy {
    interface: Interface,
    instance: Arc<BeanInstance>,
}

impl SessionProxy {
    pub fn interface(&self) -> Interface {
        self.interface
    }

    pub fn instance(&self) -> &Arc<BeanInstance> {
        &self.instance
    }
}

impl Component for SessionProxy {
    fn type_name(&self) -> &str {
        "SessionProxy"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "type": self.type_name(),
            "bean": self.instance.bean_name,
            "interface": self.interface.to_string(),
            "instance": self.instance.id,
        })
    }
}

/// Stateful instances kept before the oldest one is evicted.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Keeps bean instances according to their session type.
pub struct BeanContainer {
    descriptors: HashMap<String, ObjectDescriptor>,
    shared: Mutex<HashMap<String, Arc<BeanInstance>>>,
    sessions: Mutex<HashMap<(String, String), Arc<BeanInstance>>>,
    max_sessions: usize,
    next_instance: AtomicU64,
}

impl BeanContainer {
    pub fn new<I>(descriptors: I) -> Self
    where
        I: IntoIterator<Item = ObjectDescriptor>,
    {
        Self {
            descriptors: descriptors
                .into_iter()
                .map(|descriptor| (descriptor.name.clone(), descriptor))
                .collect(),
            shared: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            max_sessions: DEFAULT_MAX_SESSIONS,
            next_instance: AtomicU64::new(1),
        }
    }

    /// Caps the stateful instances held at once, at least one.
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    fn create(&self, descriptor: &ObjectDescriptor) -> Arc<BeanInstance> {
        let id = self.next_instance.fetch_add(1, Ordering::Relaxed);
        debug!("Creating instance {} of bean {}", id, descriptor.name);
        Arc::new(BeanInstance {
            id,
            bean_name: descriptor.name.clone(),
            class_name: descriptor.class_name.clone(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn descriptor(&self, bean_name: &str) -> Result<&ObjectDescriptor> {
        self.descriptors
            .get(bean_name)
            .ok_or_else(|| NamingError::NotBound(bean_name.to_string()))
    }

    /// The instance shared by every caller without a session.
    pub fn shared_instance(&self, bean_name: &str) -> Result<Arc<BeanInstance>> {
        let descriptor = self.descriptor(bean_name)?;
        let mut shared = self.shared.lock();
        let instance = shared
            .entry(bean_name.to_string())
            .or_insert_with(|| self.create(descriptor));
        Ok(instance.clone())
    }

    fn instance_for(&self, descriptor: &ObjectDescriptor, request: Option<&RequestContext>) -> Result<Arc<BeanInstance>> {
        match descriptor.session_type {
            SessionType::Stateless | SessionType::Singleton => self.shared_instance(&descriptor.name),
            SessionType::Stateful => match request.and_then(RequestContext::session_id) {
                Some(session_id) => {
                    let key = (descriptor.name.clone(), session_id.to_string());
                    let mut sessions = self.sessions.lock();
                    if !sessions.contains_key(&key) && sessions.len() >= self.max_sessions {
                        let oldest = sessions
                            .iter()
                            .min_by_key(|(_, instance)| instance.id)
                            .map(|(key, _)| key.clone());
                        if let Some(oldest) = oldest {
                            debug!("Evicting instance of bean {} for session {}", oldest.0, oldest.1);
                            sessions.remove(&oldest);
                        }
                    }
                    let instance = sessions.entry(key).or_insert_with(|| self.create(descriptor));
                    Ok(instance.clone())
                }
                None => Ok(self.create(descriptor)),
            },
            SessionType::MessageDriven => Err(NamingError::NotBound(format!(
                "{} (message driven beans can't be looked up)",
                descriptor.name
            ))),
        }
    }

    /// Drops every stateful instance held for `session_id`, returning how many.
    pub fn end_session(&self, session_id: &str) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|(_, session), _| session != session_id);
        let ended = before - sessions.len();
        debug!("Ended session {} ({} instance(s) dropped)", session_id, ended);
        ended
    }

    /// Drops all shared and stateful instances.
    pub fn clear(&self) {
        self.shared.lock().clear();
        self.sessions.lock().clear();
    }

    pub fn stats(&self) -> HashMap<String, serde_json::Value> {
        let mut stats = HashMap::new();
        stats.insert("beans".to_string(), serde_json::json!(self.descriptors.len()));
        stats.insert("shared_instances".to_string(), serde_json::json!(self.shared.lock().len()));
        stats.insert("session_instances".to_string(), serde_json::json!(self.sessions.lock().len()));
        stats
    }
}

impl InitialContext for BeanContainer {
    fn lookup(&self, lookup_name: &str, request: Option<&RequestContext>) -> Result<Value> {
        let (bean_name, interface) = match lookup_name.rsplit_once('/') {
            Some((bean_name, "local")) => (bean_name, Interface::Local),
            Some((bean_name, "remote")) => (bean_name, Interface::Remote),
            _ => return Err(NamingError::NotBound(lookup_name.to_string())),
        };

        let descriptor = self.descriptor(bean_name)?;
        let instance = self.instance_for(descriptor, request)?;
        Ok(Value::object(SessionProxy { interface, instance }))
    }
}

impl BeanManager for BeanContainer {
    fn invoke(
        &self,
        descriptor: &ObjectDescriptor,
        instance: &Arc<dyn Component>,
        method: &str,
        _args: &[Value],
    ) -> Result<Value> {
        let bean = instance
            .as_any()
            .downcast_ref::<BeanInstance>()
            .ok_or_else(|| NamingError::Invocation {
                bean: descriptor.name.clone(),
                method: method.to_string(),
                reason: format!("{} is not managed by this container", instance.type_name()),
            })?;

        bean.calls.lock().push(method.to_string());
        Ok(Value::Literal(format!("{}::{}", descriptor.name, method)))
    }
}

/// Proxy for one persistence unit.
#[derive(Debug)]
pub struct EntityManagerProxy {
    unit_name: String,
    request_id: Option<u64>,
}

impl EntityManagerProxy {
    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    pub fn request_id(&self) -> Option<u64> {
        self.request_id
    }
}

impl Component for EntityManagerProxy {
    fn type_name(&self) -> &str {
        "EntityManagerProxy"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "type": self.type_name(),
            "unit": self.unit_name,
            "request": self.request_id,
        })
    }
}

/// Persistence context manager for the configured unit names.
#[derive(Debug, Default)]
pub struct PersistenceUnits {
    units: HashSet<String>,
}

impl PersistenceUnits {
    pub fn new<I, S>(units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            units: units.into_iter().map(Into::into).collect(),
        }
    }
}

impl PersistenceManager for PersistenceUnits {
    fn lookup_proxy(&self, unit_name: &str, request: Option<&RequestContext>) -> Result<Value> {
        if !self.units.contains(unit_name) {
            return Err(NamingError::NotBound(unit_name.to_string()));
        }
        Ok(Value::object(EntityManagerProxy {
            unit_name: unit_name.to_string(),
            request_id: request.map(RequestContext::id),
        }))
    }
}
