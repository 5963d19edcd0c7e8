//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// Store identifiers
// ============================================================================

/// Identifier for sync pair rows (database row ID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairId(i64);

impl PairId {
    /// Create a PairId from an i64 value
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for PairId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PairId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ============================================================================
// Path types
// ============================================================================

/// A path relative to a bound local root
///
/// Always starts with `/`, uses `/` as separator regardless of host OS and
/// never contains empty, `.` or `..` components. The root itself is `"/"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocalPath(String);

impl LocalPath {
    /// Create a new LocalPath
    ///
    /// # Errors
    /// Returns error if the path is not rooted or contains traversal components
    pub fn new(path: String) -> Result<Self, DomainError> {
        if !path.starts_with('/') {
            return Err(DomainError::InvalidPath(format!(
                "Local path must start with '/': {path}"
            )));
        }

        if path == "/" {
            return Ok(Self(path));
        }

        if path.ends_with('/') {
            return Err(DomainError::InvalidPath(format!(
                "Local path must not end with '/': {path}"
            )));
        }

        for component in path[1..].split('/') {
            Self::check_component(component)?;
        }

        Ok(Self(path))
    }

    /// Create the root path "/"
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the root path
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Join a single name component
    ///
    /// # Errors
    /// Returns error if the component is empty, contains a separator or is a
    /// traversal component
    pub fn join(&self, component: &str) -> Result<Self, DomainError> {
        Self::check_component(component)?;

        let joined = if self.is_root() {
            format!("/{component}")
        } else {
            format!("{}/{component}", self.0)
        };

        Ok(Self(joined))
    }

    /// Get the parent path (`None` for the root)
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }

        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Get the last component (empty for the root)
    #[must_use]
    pub fn name(&self) -> &str {
        if self.is_root() {
            return "";
        }
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Number of components below the root (0 for the root)
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.matches('/').count()
        }
    }

    /// Iterate over the components below the root
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|c| !c.is_empty())
    }

    /// Returns true if `self` equals `ancestor` or lies below it
    #[must_use]
    pub fn is_within(&self, ancestor: &LocalPath) -> bool {
        if ancestor.is_root() || self == ancestor {
            return true;
        }
        self.0
            .strip_prefix(ancestor.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Replace the `old_prefix` part of this path with `new_prefix`
    ///
    /// Returns `None` if the path does not lie within `old_prefix`.
    #[must_use]
    pub fn rebase(&self, old_prefix: &LocalPath, new_prefix: &LocalPath) -> Option<Self> {
        if !self.is_within(old_prefix) {
            return None;
        }

        let rest = if old_prefix.is_root() {
            &self.0[..]
        } else {
            &self.0[old_prefix.0.len()..]
        };

        if rest.is_empty() || rest == "/" {
            return Some(new_prefix.clone());
        }

        if new_prefix.is_root() {
            Some(Self(rest.to_string()))
        } else {
            Some(Self(format!("{}{rest}", new_prefix.0)))
        }
    }

    fn check_component(component: &str) -> Result<(), DomainError> {
        if component.is_empty()
            || component == "."
            || component == ".."
            || component.contains('/')
            || component.contains('\0')
        {
            return Err(DomainError::InvalidPath(format!(
                "Invalid path component: {component:?}"
            )));
        }
        Ok(())
    }
}

impl Display for LocalPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LocalPath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for LocalPath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<LocalPath> for String {
    fn from(path: LocalPath) -> Self {
        path.0
    }
}

// ============================================================================
// Remote identifiers
// ============================================================================

/// Opaque reference to a remote file-system item
///
/// Servers typically encode `<factory>/<repository>/<document-uid>`, but the
/// synchronizer never parses it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteRef(String);

impl RemoteRef {
    /// Create a new RemoteRef
    ///
    /// # Errors
    /// Returns error if the reference is empty or contains control characters
    pub fn new(id: String) -> Result<Self, DomainError> {
        if id.trim().is_empty() {
            return Err(DomainError::InvalidRemoteRef(
                "Remote reference cannot be empty".to_string(),
            ));
        }

        if id.chars().any(char::is_control) {
            return Err(DomainError::InvalidRemoteRef(format!(
                "Remote reference contains control characters: {id:?}"
            )));
        }

        Ok(Self(id))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemoteRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemoteRef {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RemoteRef {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemoteRef> for String {
    fn from(id: RemoteRef) -> Self {
        id.0
    }
}

// ============================================================================
// Digest algorithms
// ============================================================================

/// Content hash algorithms a client may report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// MD5, hex encoded (the default for both sides)
    Md5,
    /// SHA-256, hex encoded
    Sha256,
}

impl DigestAlgorithm {
    /// Lowercase canonical name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha256 => "sha256",
        }
    }
}

impl Display for DigestAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = DomainError;

    /// Parses an algorithm name case-insensitively (`MD5`, `sha-256`, ...)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "md5" => Ok(DigestAlgorithm::Md5),
            "sha256" => Ok(DigestAlgorithm::Sha256),
            other => Err(DomainError::ValidationFailed(format!(
                "Unsupported digest algorithm: {other}"
            ))),
        }
    }
}
