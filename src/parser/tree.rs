//! Generic XML tree used by the SIRI-VM extractor.
//!
//! A parsed document is folded into [`XmlNode`]s: leaf elements become
//! [`XmlNode::Text`], elements with children become [`XmlNode::Map`] keyed by
//! local tag name, and repeated siblings with the same name collapse into a
//! [`XmlNode::List`]. Namespaces and attributes are dropped.
//!
//! Lookups return `Option` so callers can treat "not there" and "wrong shape"
//! the same way: as no data.

use std::collections::BTreeMap;

use roxmltree::{Document, Node};

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Text(String),
    Map(BTreeMap<String, XmlNode>),
    List(Vec<XmlNode>),
}

impl XmlNode {
    /// Parses a document into a single-entry map `{root_name: root}`.
    pub fn parse(xml: &str) -> Result<XmlNode, roxmltree::Error> {
        let doc = Document::parse(xml)?;
        let root = doc.root_element();

        let mut map = BTreeMap::new();
        map.insert(root.tag_name().name().to_string(), Self::from_element(root));
        Ok(XmlNode::Map(map))
    }

    fn from_element(node: Node<'_, '_>) -> XmlNode {
        let mut children: BTreeMap<String, XmlNode> = BTreeMap::new();

        for child in node.children().filter(Node::is_element) {
            let name = child.tag_name().name().to_string();
            let value = Self::from_element(child);

            match children.remove(&name) {
                None => {
                    children.insert(name, value);
                }
                Some(XmlNode::List(mut items)) => {
                    items.push(value);
                    children.insert(name, XmlNode::List(items));
                }
                Some(existing) => {
                    children.insert(name, XmlNode::List(vec![existing, value]));
                }
            }
        }

        if children.is_empty() {
            let text: String = node
                .children()
                .filter(Node::is_text)
                .filter_map(|n| n.text())
                .collect();
            XmlNode::Text(text.trim().to_string())
        } else {
            XmlNode::Map(children)
        }
    }

    /// Child by tag name. `None` unless `self` is a map containing `key`.
    pub fn get(&self, key: &str) -> Option<&XmlNode> {
        match self {
            XmlNode::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Follows `keys` from `self`, stopping at the first missing step.
    pub fn path(&self, keys: &[&str]) -> Option<&XmlNode> {
        keys.iter().try_fold(self, |node, key| node.get(key))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            XmlNode::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Text content of child `key`, if that child is a leaf.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(XmlNode::as_text)
    }

    pub fn is_map(&self) -> bool {
        matches!(self, XmlNode::Map(_))
    }

    /// Normalizes the single/repeated ambiguity: a lone element yields one
    /// item, a list yields each of its entries.
    pub fn items(&self) -> &[XmlNode] {
        match self {
            XmlNode::List(items) => items,
            other => std::slice::from_ref(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_elements_become_text() {
        let tree = XmlNode::parse("<a><b> hello </b><c/></a>").unwrap();
        assert_eq!(tree.path(&["a", "b"]).and_then(XmlNode::as_text), Some("hello"));
        assert_eq!(tree.path(&["a", "c"]).and_then(XmlNode::as_text), Some(""));
    }

    #[test]
    fn test_repeated_siblings_become_list() {
        let tree = XmlNode::parse("<a><b>1</b><b>2</b><b>3</b></a>").unwrap();
        let b = tree.path(&["a", "b"]).unwrap();
        assert!(matches!(b, XmlNode::List(items) if items.len() == 3));
        assert_eq!(b.items()[2].as_text(), Some("3"));
    }

    #[test]
    fn test_single_child_items_is_one_element() {
        let tree = XmlNode::parse("<a><b><c>x</c></b></a>").unwrap();
        let b = tree.path(&["a", "b"]).unwrap();
        assert_eq!(b.items().len(), 1);
        assert_eq!(b.items()[0].text("c"), Some("x"));
    }

    #[test]
    fn test_namespaces_are_ignored() {
        let xml = r#"<Siri xmlns="http://www.siri.org.uk/siri" version="2.0"><ServiceDelivery><X>1</X></ServiceDelivery></Siri>"#;
        let tree = XmlNode::parse(xml).unwrap();
        assert_eq!(tree.path(&["Siri", "ServiceDelivery"]).unwrap().text("X"), Some("1"));
    }

    #[test]
    fn test_missing_path_is_none() {
        let tree = XmlNode::parse("<a><b>1</b></a>").unwrap();
        assert!(tree.path(&["a", "missing", "deeper"]).is_none());
        // text node has no children
        assert!(tree.path(&["a", "b", "c"]).is_none());
    }

    #[test]
    fn test_malformed_document_is_error() {
        assert!(XmlNode::parse("this is not valid XML").is_err());
        assert!(XmlNode::parse("<a><b></a>").is_err());
    }
}
