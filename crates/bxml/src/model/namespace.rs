//! Prefix to namespace URI scope stack.

/// Well-known namespace URIs.
pub mod ns {
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";
}

#[derive(Debug, Clone)]
struct Binding {
    prefix: String,
    uri: String,
    depth: usize,
}

/// Stack of prefix bindings, one scope per open element.
///
/// The `xml` and `xmlns` prefixes are pre-bound and cannot be redeclared.
/// The default namespace is the empty prefix; binding it to the empty URI
/// undeclares it.
#[derive(Debug, Clone)]
pub struct NamespaceScope {
    bindings: Vec<Binding>,
    depth: usize,
}

impl Default for NamespaceScope {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceScope {
    pub fn new() -> Self {
        let mut scope = NamespaceScope {
            bindings: Vec::with_capacity(16),
            depth: 0,
        };
        scope.bindings.push(Binding {
            prefix: "xml".into(),
            uri: ns::XML.into(),
            depth: 0,
        });
        scope.bindings.push(Binding {
            prefix: "xmlns".into(),
            uri: ns::XMLNS.into(),
            depth: 0,
        });
        scope
    }

    /// Enters a new element scope.
    pub fn push_scope(&mut self) {
        self.depth += 1;
    }

    /// Leaves an element scope, dropping the bindings declared in it.
    pub fn pop_scope(&mut self) {
        while let Some(binding) = self.bindings.last() {
            if binding.depth < self.depth || binding.depth == 0 {
                break;
            }
            self.bindings.pop();
        }
        self.depth = self.depth.saturating_sub(1);
    }

    /// Drops every scope, keeping only the pre-bound prefixes.
    pub fn reset(&mut self) {
        self.bindings.truncate(2);
        self.depth = 0;
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Binds `prefix` in the current scope. Returns false for `xml`/`xmlns`.
    pub fn declare(&mut self, prefix: &str, uri: &str) -> bool {
        if prefix == "xml" || prefix == "xmlns" {
            return false;
        }
        self.bindings.push(Binding {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
            depth: self.depth,
        });
        true
    }

    /// URI bound to `prefix`; `None` if unbound or undeclared.
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .find(|b| b.prefix == prefix)
            .map(|b| b.uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    /// A prefix currently bound to `uri` and not shadowed by a later binding.
    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .filter(|b| b.uri == uri)
            .map(|b| b.prefix.as_str())
            .find(|prefix| self.resolve(prefix) == Some(uri))
    }

    /// Whether `prefix` was declared in the innermost scope.
    pub fn declared_here(&self, prefix: &str) -> bool {
        self.bindings
            .iter()
            .rev()
            .take_while(|b| b.depth == self.depth && self.depth > 0)
            .any(|b| b.prefix == prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predeclared() {
        let scope = NamespaceScope::new();
        assert_eq!(scope.resolve("xml"), Some(ns::XML));
        assert_eq!(scope.resolve(""), None);
    }

    #[test]
    fn test_shadow_and_pop() {
        let mut scope = NamespaceScope::new();
        scope.push_scope();
        assert!(scope.declare("a", "urn:one"));
        scope.push_scope();
        scope.declare("a", "urn:two");
        assert_eq!(scope.resolve("a"), Some("urn:two"));
        assert_eq!(scope.prefix_for("urn:one"), None);
        scope.pop_scope();
        assert_eq!(scope.resolve("a"), Some("urn:one"));
        assert_eq!(scope.prefix_for("urn:one"), Some("a"));
        scope.pop_scope();
        assert_eq!(scope.resolve("a"), None);
        assert_eq!(scope.resolve("xmlns"), Some(ns::XMLNS));
    }

    #[test]
    fn test_default_undeclare() {
        let mut scope = NamespaceScope::new();
        scope.push_scope();
        scope.declare("", "urn:d");
        scope.push_scope();
        scope.declare("", "");
        assert_eq!(scope.resolve(""), None);
        assert!(scope.declared_here(""));
        scope.pop_scope();
        assert_eq!(scope.resolve(""), Some("urn:d"));
    }

    #[test]
    fn test_reserved_prefixes() {
        let mut scope = NamespaceScope::new();
        scope.push_scope();
        assert!(!scope.declare("xml", "urn:bad"));
        assert_eq!(scope.resolve("xml"), Some(ns::XML));
        scope.reset();
        assert_eq!(scope.depth(), 0);
    }
}
