//! Method registry
//!
//! Maps a method name to its handler and the path the method is reachable
//! at inside its router (`"/" + name`). Filled while a router is assembled,
//! read-only once the router is mounted. Cloning is cheap; the table sits
//! behind an `Arc` and is never locked.

use crate::handler::Handler;
use pathrpc_core::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// One registered method
#[derive(Clone)]
pub struct MethodRegistration {
    name: String,
    path: String,
    handler: Arc<dyn Handler>,
}

impl MethodRegistration {
    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path relative to the owning router
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The handler
    pub fn handler(&self) -> Arc<dyn Handler> {
        Arc::clone(&self.handler)
    }
}

impl std::fmt::Debug for MethodRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodRegistration")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}

/// Name → registration table of one router
#[derive(Clone, Default)]
pub struct MethodRegistry {
    methods: Arc<HashMap<String, MethodRegistration>>,
}

impl MethodRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a method
    ///
    /// Fails for an empty name, a name containing `/` and a name that is
    /// already registered.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) -> Result<&MethodRegistration> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Config("Not allow root.".to_string()));
        }
        if name.contains('/') {
            return Err(Error::Config(format!(
                "Method name '{}' must not contain '/'",
                name
            )));
        }

        let methods = Arc::make_mut(&mut self.methods);
        if methods.contains_key(&name) {
            return Err(Error::Config(format!("Method '{}' already registered", name)));
        }

        let registration = MethodRegistration {
            path: format!("/{}", name),
            name: name.clone(),
            handler,
        };
        let registration: &MethodRegistration = methods.entry(name).or_insert(registration);
        Ok(registration)
    }

    /// Look a method up by name
    pub fn resolve(&self, name: &str) -> Option<&MethodRegistration> {
        self.methods.get(name)
    }

    /// Whether a method is registered
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of methods
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether no method is registered
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &MethodRegistration> {
        self.methods.values()
    }
}

impl std::fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.names())
            .finish()
    }
}

/// `UpdateState` → `update_state`
///
/// An underscore goes before every uppercase letter except the first
/// character, then everything is lowercased. Runs of capitals are not
/// collapsed: `HTTPPing` becomes `h_t_t_p_ping`.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() && i > 0 {
            out.push('_');
        }
        out.extend(ch.to_lowercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{from_fn, CallContext};
    use serde_json::json;

    fn ok_handler() -> Arc<dyn Handler> {
        Arc::from(from_fn(|_| async { Ok(json!("ok")) }))
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("UpdateState"), "update_state");
        assert_eq!(to_snake_case("Hello1"), "hello1");
        assert_eq!(to_snake_case("echo"), "echo");
        assert_eq!(to_snake_case("HTTPPing"), "h_t_t_p_ping");
    }

    #[tokio::test]
    async fn test_register_and_resolve() {
        let mut registry = MethodRegistry::new();
        let reg = registry.register("echo", ok_handler()).unwrap();
        assert_eq!(reg.path(), "/echo");

        let found = registry.resolve("echo").unwrap();
        let reply = found.handler().handle(CallContext::new(json!({}))).await.unwrap();
        assert_eq!(reply.value(), &json!("ok"));
        assert!(registry.resolve("missing").is_none());
    }

    #[test]
    fn test_rejects_bad_names() {
        let mut registry = MethodRegistry::new();
        assert!(registry.register("", ok_handler()).is_err());
        assert!(registry.register("a/b", ok_handler()).is_err());
        assert!(registry.register("/", ok_handler()).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rejects_duplicates() {
        let mut registry = MethodRegistry::new();
        registry.register("echo", ok_handler()).unwrap();
        let err = registry.register("echo", ok_handler()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_clones_do_not_see_later_registrations() {
        let mut registry = MethodRegistry::new();
        registry.register("a", ok_handler()).unwrap();
        let snapshot = registry.clone();
        registry.register("b", ok_handler()).unwrap();

        assert_eq!(snapshot.names(), vec!["a"]);
        assert_eq!(registry.names(), vec!["a", "b"]);
    }
}
