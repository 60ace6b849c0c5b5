use std::collections::HashMap;
use std::fmt;

use super::uri::NamingUri;
use super::value::Value;

/// Which resolver operation a deferred binding dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackTarget {
    /// Generic lookup through the application's component locator.
    Lookup,
    /// Session bean proxy, scoped to the active request.
    LookupProxy,
    /// The bean instance itself.
    LookupBean,
    /// Same-process proxy enforcing the bean's business interface.
    LookupLocalProxy,
    /// Persistence unit proxy created by the persistence context manager.
    PersistenceUnitProxy,
}

impl fmt::Display for CallbackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallbackTarget::Lookup => "lookup",
            CallbackTarget::LookupProxy => "lookupProxy",
            CallbackTarget::LookupBean => "lookupBean",
            CallbackTarget::LookupLocalProxy => "lookupLocalProxy",
            CallbackTarget::PersistenceUnitProxy => "persistenceUnitProxy",
        };
        f.write_str(name)
    }
}

/// A callback stored in the tree instead of a live object; resolved on every lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredCallback {
    pub target: CallbackTarget,
    pub args: Vec<String>,
}

impl DeferredCallback {
    pub fn new<I, S>(target: CallbackTarget, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// First argument, the name every resolver operation works on.
    pub fn name(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// Content of a terminal node.
#[derive(Debug, Clone)]
pub enum Binding {
    Value(Value),
    Callback(DeferredCallback),
    /// Alias followed at lookup time.
    Reference(NamingUri),
}

impl Binding {
    pub fn describe(&self) -> serde_json::Value {
        match self {
            Binding::Value(value) => serde_json::json!({ "kind": "value", "value": value.describe() }),
            Binding::Callback(callback) => serde_json::json!({
                "kind": "callback",
                "target": callback.target.to_string(),
                "args": callback.args,
            }),
            Binding::Reference(target) => {
                serde_json::json!({ "kind": "reference", "target": target.to_string() })
            }
        }
    }
}

/// One segment of the naming tree. Holds a binding or children, never both.
#[derive(Debug, Default)]
pub struct NamingNode {
    children: HashMap<String, NamingNode>,
    binding: Option<Binding>,
}

impl NamingNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }

    pub fn is_leaf(&self) -> bool {
        self.binding.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.binding.is_none() && self.children.is_empty()
    }

    pub fn child(&self, segment: &str) -> Option<&NamingNode> {
        self.children.get(segment)
    }

    pub(crate) fn child_mut(&mut self, segment: &str) -> Option<&mut NamingNode> {
        self.children.get_mut(segment)
    }

    pub(crate) fn child_or_insert(&mut self, segment: &str) -> &mut NamingNode {
        self.children.entry(segment.to_string()).or_default()
    }

    pub(crate) fn remove_child(&mut self, segment: &str) -> Option<NamingNode> {
        self.children.remove(segment)
    }

    pub(crate) fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub(crate) fn set_binding(&mut self, binding: Binding) {
        self.binding = Some(binding);
    }

    pub fn child_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.children.keys().cloned().collect();
        names.sort();
        names
    }

    /// Visits every bound leaf below this node, depth first.
    pub(crate) fn walk<'a, F>(&'a self, path: &mut Vec<&'a str>, visit: &mut F)
    where
        F: FnMut(&[&'a str], &'a Binding),
    {
        if let Some(binding) = &self.binding {
            visit(path, binding);
        }
        for (segment, child) in &self.children {
            path.push(segment.as_str());
            child.walk(path, visit);
            path.pop();
        }
    }
}
