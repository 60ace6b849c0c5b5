use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::naming::Value;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// State of the request currently being served.
///
/// Passed explicitly to lookups so stateful session beans bind to the right
/// session. Proxies resolved while serving the request are cached here and
/// dropped with it.
#[derive(Debug)]
pub struct RequestContext {
    id: u64,
    session_id: Option<String>,
    proxies: Mutex<HashMap<String, Value>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_session(session_id: impl Into<String>) -> Self {
        Self::build(Some(session_id.into()))
    }

    fn build(session_id: Option<String>) -> Self {
        Self {
            id: NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed),
            session_id,
            proxies: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn cached_proxy(&self, lookup_name: &str) -> Option<Value> {
        self.proxies.lock().get(lookup_name).cloned()
    }

    pub fn cache_proxy(&self, lookup_name: &str, proxy: Value) {
        self.proxies.lock().insert(lookup_name.to_string(), proxy);
    }

    pub fn cached_proxy_count(&self) -> usize {
        self.proxies.lock().len()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
