use parking_lot::RwLock;
use tracing::trace;

use super::node::{Binding, CallbackTarget, DeferredCallback, NamingNode};
use super::uri::NamingUri;
use super::value::Value;
use crate::errors::{NamingError, Result};
use crate::request::RequestContext;

/// Upper bound on alias hops a single lookup follows.
pub const MAX_REFERENCE_HOPS: usize = 32;

/// Turns a deferred callback into a value at lookup time.
pub trait CallbackResolver {
    fn resolve(&self, callback: &DeferredCallback, request: Option<&RequestContext>) -> Result<Value>;
}

/// Hierarchical, thread-safe registry of names.
///
/// Binds take the write lock; lookups copy the terminal binding out under the
/// read lock and resolve callbacks after releasing it, so a callback may look
/// up other names in the same directory.
pub struct NamingDirectory {
    root: RwLock<NamingNode>,
    max_hops: usize,
}

impl NamingDirectory {
    pub fn new() -> Self {
        Self::with_max_hops(MAX_REFERENCE_HOPS)
    }

    pub fn with_max_hops(max_hops: usize) -> Self {
        Self {
            root: RwLock::new(NamingNode::new()),
            max_hops,
        }
    }

    /// Binds `binding` at `name`, creating intermediate nodes as needed.
    pub fn bind(&self, name: &str, binding: Binding) -> Result<()> {
        self.bind_uri(&NamingUri::parse(name)?, binding)
    }

    pub fn bind_uri(&self, uri: &NamingUri, binding: Binding) -> Result<()> {
        let path: Vec<&str> = uri.tree_path().collect();
        let Some((last, ancestors)) = path.split_last() else {
            return Err(NamingError::invalid_name(&uri.to_string(), "empty name"));
        };

        let mut root = self.root.write();
        let mut node = &mut *root;
        for segment in ancestors {
            node = node.child_or_insert(segment);
            if node.is_leaf() {
                return Err(NamingError::Conflict {
                    uri: uri.to_string(),
                    segment: segment.to_string(),
                });
            }
        }

        let terminal = node.child_or_insert(last);
        if terminal.is_leaf() {
            return Err(NamingError::AlreadyBound(uri.to_string()));
        }
        if terminal.has_children() {
            return Err(NamingError::Conflict {
                uri: uri.to_string(),
                segment: last.to_string(),
            });
        }
        terminal.set_binding(binding);

        trace!("Bound {}", uri);
        Ok(())
    }

    pub fn bind_value(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.bind(name, Binding::Value(value.into()))
    }

    pub fn bind_callback<I, S>(&self, name: &str, target: CallbackTarget, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bind(name, Binding::Callback(DeferredCallback::new(target, args)))
    }

    /// Binds an alias that follows `target` on every lookup.
    pub fn bind_reference(&self, name: &str, target: &str) -> Result<()> {
        let target = NamingUri::parse(target)?;
        self.bind(name, Binding::Reference(target))
    }

    /// Whether `name` holds a binding. Walking through a leaf is a conflict.
    pub fn is_bound(&self, name: &str) -> Result<bool> {
        self.is_bound_uri(&NamingUri::parse(name)?)
    }

    pub fn is_bound_uri(&self, uri: &NamingUri) -> Result<bool> {
        let root = self.root.read();
        let mut node = &*root;
        let mut path = uri.tree_path().peekable();
        while let Some(segment) = path.next() {
            match node.child(segment) {
                Some(child) => node = child,
                None => return Ok(false),
            }
            if node.is_leaf() && path.peek().is_some() {
                return Err(NamingError::Conflict {
                    uri: uri.to_string(),
                    segment: segment.to_string(),
                });
            }
        }
        Ok(node.is_leaf())
    }

    /// Returns the raw binding at `name` without resolving it.
    pub fn binding(&self, name: &str) -> Result<Binding> {
        let uri = NamingUri::parse(name)?;
        self.binding_at(&uri)
    }

    fn binding_at(&self, uri: &NamingUri) -> Result<Binding> {
        let root = self.root.read();
        let mut node = &*root;
        for segment in uri.tree_path() {
            if node.is_leaf() {
                return Err(NamingError::NotBound(uri.to_string()));
            }
            node = node
                .child(segment)
                .ok_or_else(|| NamingError::NotBound(uri.to_string()))?;
        }
        node.binding()
            .cloned()
            .ok_or_else(|| NamingError::NotBound(uri.to_string()))
    }

    /// Resolves `name`: literals are returned, callbacks are handed to
    /// `resolver` together with `request`, aliases are followed.
    pub fn lookup(
        &self,
        name: &str,
        request: Option<&RequestContext>,
        resolver: &dyn CallbackResolver,
    ) -> Result<Value> {
        let uri = NamingUri::parse(name)?;
        self.lookup_uri(&uri, request, resolver)
    }

    pub fn lookup_uri(
        &self,
        uri: &NamingUri,
        request: Option<&RequestContext>,
        resolver: &dyn CallbackResolver,
    ) -> Result<Value> {
        let mut current = uri.clone();
        for _ in 0..=self.max_hops {
            match self.binding_at(&current)? {
                Binding::Value(value) => return Ok(value),
                Binding::Callback(callback) => return resolver.resolve(&callback, request),
                Binding::Reference(target) => {
                    trace!("Following reference {} -> {}", current, target);
                    current = target;
                }
            }
        }
        Err(NamingError::CyclicBinding {
            uri: uri.to_string(),
            hops: self.max_hops,
        })
    }

    /// Removes the binding or subtree at `name`, pruning emptied ancestors.
    pub fn unbind(&self, name: &str) -> Result<()> {
        let uri = NamingUri::parse(name)?;
        let path: Vec<&str> = uri.tree_path().collect();
        let mut root = self.root.write();
        remove_path(&mut root, &path, &uri)
    }

    /// Sorted child names of the interior node at `name`.
    pub fn list(&self, name: &str) -> Result<Vec<String>> {
        let uri = NamingUri::parse(name)?;
        let root = self.root.read();
        let mut node = &*root;
        for segment in uri.tree_path() {
            if node.is_leaf() {
                return Err(NamingError::NotBound(uri.to_string()));
            }
            node = node
                .child(segment)
                .ok_or_else(|| NamingError::NotBound(uri.to_string()))?;
        }
        if node.is_leaf() {
            return Err(NamingError::Conflict {
                uri: uri.to_string(),
                segment: uri.segments().last().cloned().unwrap_or_default(),
            });
        }
        Ok(node.child_names())
    }

    /// Snapshot of every bound name, sorted.
    pub fn bindings(&self) -> Vec<(NamingUri, Binding)> {
        let root = self.root.read();
        let mut entries = Vec::new();
        let mut path = Vec::new();
        root.walk(&mut path, &mut |path, binding| {
            if let Some(uri) = NamingUri::from_tree_path(path) {
                entries.push((uri, binding.clone()));
            }
        });
        entries.sort_by_cached_key(|(uri, _)| uri.to_string());
        entries
    }
}

impl Default for NamingDirectory {
    fn default() -> Self {
        Self::new()
    }
}

fn remove_path(node: &mut NamingNode, path: &[&str], uri: &NamingUri) -> Result<()> {
    let not_bound = || NamingError::NotBound(uri.to_string());
    let (segment, rest) = path.split_first().ok_or_else(not_bound)?;

    if rest.is_empty() {
        return node.remove_child(segment).map(|_| ()).ok_or_else(not_bound);
    }

    let child = node.child_mut(segment).ok_or_else(not_bound)?;
    if child.is_leaf() {
        return Err(not_bound());
    }
    remove_path(child, rest, uri)?;
    let prune = child.is_empty();
    if prune {
        node.remove_child(segment);
    }
    Ok(())
}
