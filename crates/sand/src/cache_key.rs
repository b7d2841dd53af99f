//! Composite cache keys.
//!
//! Keys have the layout `root/category/identity/scope1_scope2/resource/action`.
//! The scopes, resource and action segments are omitted entirely when empty.
//!
//! Scopes are joined in the order given. Two orderings of the same scope set
//! produce different keys; callers that want order independence must sort
//! before building the key.

/// Default key root.
pub const DEFAULT_CACHE_ROOT: &str = "sand";

/// Key category for tokens fetched by the Client role.
pub const CLIENT_CACHE_CATEGORY: &str = "resources";

/// Key category for the Service role (its own token and verification results).
pub const SERVICE_CACHE_CATEGORY: &str = "tokens";

const DELIMITER: char = '/';
const SCOPE_DELIMITER: &str = "_";

/// Builds deterministic cache keys under a fixed root and category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeyBuilder {
    root: String,
    category: String,
}

impl CacheKeyBuilder {
    #[must_use]
    pub fn new(root: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            category: category.into(),
        }
    }

    /// Builder for Client-role token keys under the default root.
    #[must_use]
    pub fn client() -> Self {
        Self::new(DEFAULT_CACHE_ROOT, CLIENT_CACHE_CATEGORY)
    }

    /// Builder for Service-role keys under the default root.
    #[must_use]
    pub fn service() -> Self {
        Self::new(DEFAULT_CACHE_ROOT, SERVICE_CACHE_CATEGORY)
    }

    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Build the key for `identity` (a caching identity or a bearer token).
    #[must_use]
    pub fn build<S: AsRef<str>>(
        &self,
        identity: &str,
        scopes: &[S],
        resource: Option<&str>,
        action: Option<&str>,
    ) -> String {
        let capacity = self.root.len() + self.category.len() + identity.len() + 32;
        let mut key = String::with_capacity(capacity);
        key.push_str(&self.root);
        key.push(DELIMITER);
        key.push_str(&self.category);
        key.push(DELIMITER);
        key.push_str(identity);

        if !scopes.is_empty() {
            key.push(DELIMITER);
            let joined: Vec<&str> = scopes.iter().map(AsRef::as_ref).collect();
            key.push_str(&joined.join(SCOPE_DELIMITER));
        }

        for segment in [resource, action].into_iter().flatten() {
            if !segment.is_empty() {
                key.push(DELIMITER);
                key.push_str(segment);
            }
        }

        key
    }
}

impl Default for CacheKeyBuilder {
    fn default() -> Self {
        Self::client()
    }
}
