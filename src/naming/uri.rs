use std::fmt;

use crate::errors::{NamingError, Result};

/// Scheme used when a name carries none.
pub const DEFAULT_SCHEME: &str = "php";

/// A parsed `scheme:seg/seg/...` name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamingUri {
    scheme: String,
    segments: Vec<String>,
}

impl NamingUri {
    pub fn parse(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(NamingError::invalid_name(name, "empty name"));
        }

        let (scheme, path) = match name.split_once(':') {
            Some((scheme, path)) => {
                if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err(NamingError::invalid_name(name, "malformed scheme"));
                }
                (scheme, path)
            }
            None => (DEFAULT_SCHEME, name),
        };

        let segments = path
            .split('/')
            .map(|segment| {
                if segment.is_empty() {
                    Err(NamingError::invalid_name(name, "empty path segment"))
                } else {
                    Ok(segment.to_string())
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            scheme: scheme.to_string(),
            segments,
        })
    }

    /// `php:global/<application>/<name>`, the key every application binding lives under.
    pub fn global(application: &str, name: &str) -> Result<Self> {
        Self::parse(&format!("{}:global/{}/{}", DEFAULT_SCHEME, application, name))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Scheme followed by the path segments, the way the tree stores them.
    pub(crate) fn tree_path(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.scheme.as_str()).chain(self.segments.iter().map(String::as_str))
    }

    pub(crate) fn from_tree_path(path: &[&str]) -> Option<Self> {
        let (scheme, segments) = path.split_first()?;
        if segments.is_empty() {
            return None;
        }
        Some(Self {
            scheme: scheme.to_string(),
            segments: segments.iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl fmt::Display for NamingUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.segments.join("/"))
    }
}

impl std::str::FromStr for NamingUri {
    type Err = NamingError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
