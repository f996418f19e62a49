//! Namespace handling strategies for the reader.
//!
//! The wire format stores names as written (`prefix:local`) and declarations
//! as ordinary `xmlns`/`xmlns:*` attributes. A strategy decides what the
//! reader reports for them.

use crate::error::{DecodeError, Result};
use crate::model::{split_qualified, Attribute, NamespaceDecl, NamespaceScope, QName};

/// Turns raw element and attribute names into reported names.
pub trait NamespaceStrategy: Send {
    /// Whether prefixes are resolved against declarations.
    fn is_aware(&self) -> bool;

    /// Processes an element start. Reported attributes and declarations are
    /// appended to `attributes` and `namespaces`.
    fn start_element(
        &mut self,
        raw_name: &str,
        raw_attributes: Vec<(String, String)>,
        attributes: &mut Vec<Attribute>,
        namespaces: &mut Vec<NamespaceDecl>,
    ) -> Result<QName>;

    /// Processes the matching element end.
    fn end_element(&mut self);

    /// URI currently bound to `prefix`.
    fn resolve(&self, prefix: &str) -> Option<&str>;

    /// Forgets every open scope.
    fn reset(&mut self);
}

/// Returns the declared prefix if `raw` is an `xmlns` or `xmlns:*` name.
fn declared_prefix(raw: &str) -> Option<&str> {
    if raw == "xmlns" {
        Some("")
    } else {
        raw.strip_prefix("xmlns:")
    }
}

/// Resolves prefixes and reports declarations separately from attributes.
#[derive(Debug, Default)]
pub struct NamespaceAware {
    scope: NamespaceScope,
}

impl NamespaceAware {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve_name(&self, raw: &str, use_default: bool) -> Result<QName> {
        let (prefix, local) = split_qualified(raw);
        let uri = if prefix.is_empty() {
            if use_default {
                self.scope.resolve("").unwrap_or_default()
            } else {
                ""
            }
        } else {
            self.scope
                .resolve(prefix)
                .ok_or_else(|| DecodeError::UnboundPrefix {
                    prefix: prefix.to_string(),
                })?
        };
        Ok(QName::new(uri, local).with_prefix(prefix))
    }
}

impl NamespaceStrategy for NamespaceAware {
    fn is_aware(&self) -> bool {
        true
    }

    fn start_element(
        &mut self,
        raw_name: &str,
        raw_attributes: Vec<(String, String)>,
        attributes: &mut Vec<Attribute>,
        namespaces: &mut Vec<NamespaceDecl>,
    ) -> Result<QName> {
        self.scope.push_scope();
        let mut plain = Vec::with_capacity(raw_attributes.len());
        for (name, value) in raw_attributes {
            match declared_prefix(&name) {
                Some(prefix) => {
                    self.scope.declare(prefix, &value);
                    namespaces.push(NamespaceDecl {
                        prefix: prefix.to_string(),
                        uri: value,
                    });
                }
                None => plain.push((name, value)),
            }
        }
        for (name, value) in plain {
            attributes.push(Attribute {
                name: self.resolve_name(&name, false)?,
                value,
            });
        }
        self.resolve_name(raw_name, true)
    }

    fn end_element(&mut self) {
        self.scope.pop_scope();
    }

    fn resolve(&self, prefix: &str) -> Option<&str> {
        self.scope.resolve(prefix)
    }

    fn reset(&mut self) {
        self.scope.reset();
    }
}

/// Reports names exactly as stored and keeps `xmlns` attributes.
#[derive(Debug, Default)]
pub struct NamespaceUnaware;

impl NamespaceStrategy for NamespaceUnaware {
    fn is_aware(&self) -> bool {
        false
    }

    fn start_element(
        &mut self,
        raw_name: &str,
        raw_attributes: Vec<(String, String)>,
        attributes: &mut Vec<Attribute>,
        _namespaces: &mut Vec<NamespaceDecl>,
    ) -> Result<QName> {
        attributes.extend(raw_attributes.into_iter().map(|(name, value)| Attribute {
            name: QName::local(name),
            value,
        }));
        Ok(QName::local(raw_name))
    }

    fn end_element(&mut self) {}

    fn resolve(&self, _prefix: &str) -> Option<&str> {
        None
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_aware_resolves_and_filters() {
        let mut strategy = NamespaceAware::new();
        let mut attributes = Vec::new();
        let mut namespaces = Vec::new();
        let name = strategy
            .start_element(
                "gml:Point",
                raw(&[("xmlns:gml", "urn:gml"), ("xmlns", "urn:d"), ("gml:id", "p1"), ("srs", "x")]),
                &mut attributes,
                &mut namespaces,
            )
            .unwrap();
        assert_eq!(name, QName::new("urn:gml", "Point").with_prefix("gml"));
        assert_eq!(namespaces.len(), 2);
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[0].name.namespace_uri, "urn:gml");
        // Unprefixed attributes are in no namespace.
        assert_eq!(attributes[1].name.namespace_uri, "");

        let mut attributes = Vec::new();
        let child = strategy
            .start_element("pos", Vec::new(), &mut attributes, &mut namespaces)
            .unwrap();
        assert_eq!(child.namespace_uri, "urn:d");
        strategy.end_element();
        strategy.end_element();
        assert_eq!(strategy.resolve("gml"), None);
    }

    #[test]
    fn test_aware_rejects_unbound_prefix() {
        let mut strategy = NamespaceAware::new();
        let result = strategy.start_element("a:b", Vec::new(), &mut Vec::new(), &mut Vec::new());
        assert!(matches!(
            result,
            Err(crate::Error::Decode(DecodeError::UnboundPrefix { .. }))
        ));
    }

    #[test]
    fn test_unaware_keeps_raw_names() {
        let mut strategy = NamespaceUnaware;
        let mut attributes = Vec::new();
        let mut namespaces = Vec::new();
        let name = strategy
            .start_element(
                "gml:Point",
                raw(&[("xmlns:gml", "urn:gml")]),
                &mut attributes,
                &mut namespaces,
            )
            .unwrap();
        assert_eq!(name.local_name, "gml:Point");
        assert_eq!(name.namespace_uri, "");
        assert_eq!(attributes[0].name.local_name, "xmlns:gml");
        assert!(namespaces.is_empty());
    }
}
