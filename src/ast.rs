/// Element tree for parsed Textile documents
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::Error;

/// The ordered top-level nodes produced by one parse call.
pub type Document = Vec<Node>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Text(String),
    Element(Element),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        }
    }

    /// Convert to the JsonML array form: `["tag", {attrs}?, ...children]`,
    /// with text nodes as plain strings.
    pub fn to_jsonml(&self) -> Value {
        match self {
            Node::Text(text) => Value::String(text.clone()),
            Node::Element(element) => {
                let mut items = vec![Value::String(element.tag.clone())];
                if !element.attributes.is_empty() {
                    let mut map = Map::new();
                    for (key, value) in element.attributes.iter() {
                        let value = match value {
                            Some(value) => Value::String(value.to_string()),
                            None => Value::Null,
                        };
                        map.insert(key.to_string(), value);
                    }
                    items.push(Value::Object(map));
                }
                items.extend(element.children.iter().map(Node::to_jsonml));
                Value::Array(items)
            }
        }
    }

    pub fn from_jsonml(value: &Value) -> Result<Node, Error> {
        match value {
            Value::String(text) => Ok(Node::Text(text.clone())),
            Value::Array(items) => {
                let Some(Value::String(tag)) = items.first() else {
                    return Err(Error::InvalidJsonMl(format!(
                        "element must start with a tag name: {value}"
                    )));
                };
                let mut element = Element::new(tag.as_str());
                let mut rest = &items[1..];
                if let Some(Value::Object(map)) = rest.first() {
                    for (key, value) in map {
                        let value = match value {
                            Value::Null => None,
                            Value::String(text) => Some(text.clone()),
                            other => Some(other.to_string()),
                        };
                        element.attributes.set(key.as_str(), value);
                    }
                    rest = &rest[1..];
                }
                for child in rest {
                    element.push(Node::from_jsonml(child)?);
                }
                Ok(Node::Element(element))
            }
            other => Err(Error::InvalidJsonMl(format!(
                "expected a string or an array, found {other}"
            ))),
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Element {
            tag: tag.into(),
            attributes: Attributes::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key, value);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.extend(children);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.push(Node::Text(text.into()));
        self
    }

    /// Append a child, merging it into a trailing text child when both are text.
    pub fn push(&mut self, node: Node) {
        push_coalesced(&mut self.children, node);
    }

    pub fn extend(&mut self, nodes: impl IntoIterator<Item = Node>) {
        for node in nodes {
            self.push(node);
        }
    }

    pub fn is_void(&self) -> bool {
        crate::parser::html::is_void(&self.tag)
    }
}

fn push_coalesced(nodes: &mut Vec<Node>, node: Node) {
    match node {
        Node::Text(text) => {
            if text.is_empty() {
                return;
            }
            if let Some(Node::Text(last)) = nodes.last_mut() {
                last.push_str(&text);
            } else {
                nodes.push(Node::Text(text));
            }
        }
        element => nodes.push(element),
    }
}

/// Builder for a sibling sequence that keeps adjacent text merged.
#[derive(Debug, Default, Clone)]
pub struct NodeList {
    nodes: Vec<Node>,
}

impl NodeList {
    pub fn new() -> Self {
        NodeList { nodes: Vec::new() }
    }

    pub fn add(&mut self, node: impl Into<Node>) -> &mut Self {
        push_coalesced(&mut self.nodes, node.into());
        self
    }

    pub fn add_text(&mut self, text: &str) -> &mut Self {
        push_coalesced(&mut self.nodes, Node::Text(text.to_string()));
        self
    }

    pub fn merge(&mut self, nodes: impl IntoIterator<Item = Node>) -> &mut Self {
        for node in nodes {
            push_coalesced(&mut self.nodes, node);
        }
        self
    }

    /// Separate the next block from what came before, if anything did.
    pub fn linebreak(&mut self) {
        if !self.nodes.is_empty() {
            self.add_text("\n");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }
}

/// Ordered attribute map. A `None` value is a valueless (boolean) attribute.
///
/// Keys are unique; inserting an existing key replaces its value in place.
/// Equality ignores insertion order.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    entries: Vec<(String, Option<String>)>,
}

impl Attributes {
    pub fn new() -> Self {
        Attributes {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Value of `key`; valueless attributes and missing keys both yield `None`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.set(key, Some(value.into()));
    }

    pub fn set(&mut self, key: &str, value: Option<String>) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key.to_string(), value));
        }
    }

    /// Copy every entry of `other` over this map.
    pub fn merge(&mut self, other: &Attributes) {
        for (key, value) in &other.entries {
            self.set(key, value.clone());
        }
    }

    /// A copy of this map without the listed keys.
    pub fn without(&self, keys: &[&str]) -> Attributes {
        Attributes {
            entries: self
                .entries
                .iter()
                .filter(|(k, _)| !keys.contains(&k.as_str()))
                .cloned()
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }
}

impl PartialEq for Attributes {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.entries.iter().any(|(ok, ov)| ok == k && ov == v))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        for (key, value) in iter {
            attributes.insert(&key.into(), value);
        }
        attributes
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Attributes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AttributesVisitor;

        impl<'de> Visitor<'de> for AttributesVisitor {
            type Value = Attributes;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of attribute names to strings or null")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Attributes, A::Error> {
                let mut attributes = Attributes::new();
                while let Some((key, value)) = access.next_entry::<String, Option<String>>()? {
                    attributes.set(&key, value);
                }
                Ok(attributes)
            }
        }

        deserializer.deserialize_map(AttributesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn adjacent_text_is_merged() {
        let mut list = NodeList::new();
        list.add_text("a").add_text("b").add(Element::new("br")).add_text("c");
        assert_eq!(
            list.into_nodes(),
            vec![
                Node::text("ab"),
                Node::Element(Element::new("br")),
                Node::text("c")
            ]
        );
    }

    #[test]
    fn linebreak_only_after_content() {
        let mut list = NodeList::new();
        list.linebreak();
        assert!(list.is_empty());
        list.add(Element::new("hr"));
        list.linebreak();
        assert_eq!(list.into_nodes().len(), 2);
    }

    #[test]
    fn attributes_replace_in_place() {
        let mut attrs = Attributes::new();
        attrs.insert("class", "a");
        attrs.insert("id", "b");
        attrs.insert("class", "c");
        let keys: Vec<_> = attrs.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["class", "id"]);
        assert_eq!(attrs.get("class"), Some("c"));
    }

    #[test]
    fn attribute_equality_ignores_order() {
        let a: Attributes = [("x", "1"), ("y", "2")].into_iter().collect();
        let b: Attributes = [("y", "2"), ("x", "1")].into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn jsonml_round_trip() {
        let mut attrs = Attributes::new();
        attrs.insert("href", "/x");
        attrs.set("download", None);
        let node = Node::Element(
            Element::new("a")
                .with_attributes(attrs)
                .with_text("link"),
        );
        let value = node.to_jsonml();
        assert_eq!(
            value,
            serde_json::json!(["a", {"href": "/x", "download": null}, "link"])
        );
        assert_eq!(Node::from_jsonml(&value).unwrap(), node);
    }

    #[test]
    fn jsonml_rejects_tagless_arrays() {
        assert!(Node::from_jsonml(&serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn serde_shape() {
        let node = Node::Element(Element::new("p").with_text("hi"));
        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(json, r#"{"tag":"p","children":["hi"]}"#);
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }
}
