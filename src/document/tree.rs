//! Owned, mutable XML tree
//!
//! Documents are parsed with `roxmltree` (strict, namespace-aware, reports
//! line/column) and copied into an owned tree that refinement can rewrite in
//! place. Serialization goes through `quick-xml`.
//!
//! Each element remembers the prefix it was written with and the namespace
//! declarations it carried, so an untouched subtree serializes back to the
//! same markup apart from attribute quoting and entity normalization.

use crate::domain::{RefinerError, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use roxmltree::{NodeType, ParsingOptions};

const XML_PREFIX: &str = "xml";

/// Prefixed element or attribute name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(prefix: Option<&str>, local: impl Into<String>) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            local: local.into(),
        }
    }

    /// `prefix:local`, or just `local`
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.local),
            None => self.local.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub namespace: Option<String>,
    pub value: String,
}

/// An `xmlns` / `xmlns:p` declaration carried by an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
    ProcessingInstruction { target: String, value: Option<String> },
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Text node made only of whitespace
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text(text) if text.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: QName,
    namespace: Option<String>,
    namespaces: Vec<NamespaceDecl>,
    attributes: Vec<Attribute>,
    children: Vec<Node>,
}

impl Element {
    /// Creates an element with no namespace
    pub fn new(local: impl Into<String>) -> Self {
        Self {
            name: QName::new(None, local),
            namespace: None,
            namespaces: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Creates an element in the same namespace, with the same prefix, as `sibling`
    ///
    /// The new element relies on declarations already in scope where it is
    /// inserted, so it carries none of its own.
    pub fn new_like(sibling: &Element, local: impl Into<String>) -> Self {
        Self {
            name: QName {
                prefix: sibling.name.prefix.clone(),
                local: local.into(),
            },
            namespace: sibling.namespace.clone(),
            namespaces: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &QName {
        &self.name
    }

    pub fn local_name(&self) -> &str {
        &self.name.local
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn namespace_decls(&self) -> &[NamespaceDecl] {
        &self.namespaces
    }

    /// Namespace-aware name test
    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.name.local == local && self.namespace.as_deref() == Some(namespace)
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Value of an attribute that has no namespace
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.name.local == local)
            .map(|a| a.value.as_str())
    }

    /// Value of a namespaced attribute such as `xsi:type`
    pub fn attr_ns(&self, namespace: &str, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == Some(namespace) && a.name.local == local)
            .map(|a| a.value.as_str())
    }

    /// Sets (or replaces) an attribute without namespace
    pub fn set_attr(&mut self, local: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|a| a.namespace.is_none() && a.name.local == local)
        {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute {
                name: QName::new(None, local),
                namespace: None,
                value,
            }),
        }
    }

    /// Builder-style [`set_attr`](Self::set_attr)
    pub fn with_attr(mut self, local: &str, value: impl Into<String>) -> Self {
        self.set_attr(local, value);
        self
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    pub fn push_child(&mut self, node: Node) {
        self.children.push(node);
    }

    /// Builder-style child append
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Builder-style text append
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(Node::as_element_mut)
    }

    /// First direct child with the given namespace and local name
    pub fn find_child(&self, namespace: &str, local: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.is(namespace, local))
    }

    pub fn find_child_mut(&mut self, namespace: &str, local: &str) -> Option<&mut Element> {
        self.child_elements_mut().find(|e| e.is(namespace, local))
    }

    /// Pre-order walk over this element and every element below it
    pub fn descendants_and_self(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// Pre-order walk over every element below this one
    pub fn descendants(&self) -> impl Iterator<Item = &Element> {
        self.descendants_and_self().skip(1)
    }

    /// Concatenated text of this element and its descendants
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Text(text) => out.push_str(text),
            Node::Element(inner) => collect_text(inner, out),
            _ => {}
        }
    }
}

/// Iterator returned by [`Element::descendants_and_self`]
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        self.stack
            .extend(element.child_elements().collect::<Vec<_>>().into_iter().rev());
        Some(element)
    }
}

/// A parsed document: the root element plus whatever sits around it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlTree {
    prolog: Vec<Node>,
    root: Element,
    epilog: Vec<Node>,
}

impl XmlTree {
    /// Parses XML text
    ///
    /// # Errors
    ///
    /// Returns [`RefinerError::DocumentParse`] if the input is empty, is not
    /// well-formed, or has no root element.
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(RefinerError::parse("document is empty"));
        }

        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let doc = roxmltree::Document::parse_with_options(text, options).map_err(|e| {
            let pos = e.pos();
            RefinerError::DocumentParse {
                message: e.to_string(),
                line: Some(pos.row),
                column: Some(pos.col),
            }
        })?;

        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut root = None;
        for child in doc.root().children() {
            if child.is_element() {
                root = Some(convert_element(child));
            } else if let Some(node) = convert_leaf(child) {
                if node.is_blank_text() {
                    continue;
                }
                if root.is_some() {
                    epilog.push(node);
                } else {
                    prolog.push(node);
                }
            }
        }

        let root = root.ok_or_else(|| RefinerError::parse("document has no root element"))?;
        Ok(Self {
            prolog,
            root,
            epilog,
        })
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Serializes the tree with an XML declaration
    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(write_error)?;
        writer.get_mut().push(b'\n');

        for node in &self.prolog {
            write_node(&mut writer, node)?;
            writer.get_mut().push(b'\n');
        }
        write_element(&mut writer, &self.root)?;
        for node in &self.epilog {
            writer.get_mut().push(b'\n');
            write_node(&mut writer, node)?;
        }

        String::from_utf8(writer.into_inner())
            .map_err(|e| RefinerError::Serialization(format!("refined XML is not UTF-8: {e}")))
    }

    /// Serializes a single element (no declaration)
    pub fn element_to_string(element: &Element) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        write_element(&mut writer, element)?;
        String::from_utf8(writer.into_inner())
            .map_err(|e| RefinerError::Serialization(format!("XML fragment is not UTF-8: {e}")))
    }
}

fn convert_element(node: roxmltree::Node<'_, '_>) -> Element {
    let tag = node.tag_name();
    let prefix = tag.namespace().and_then(|uri| node.lookup_prefix(uri));

    let attributes = node
        .attributes()
        .map(|attr| {
            let prefix = attr.namespace().and_then(|uri| attribute_prefix(node, uri));
            Attribute {
                name: QName::new(prefix, attr.name()),
                namespace: attr.namespace().map(str::to_string),
                value: attr.value().to_string(),
            }
        })
        .collect();

    let children = node
        .children()
        .filter_map(|child| {
            if child.is_element() {
                Some(Node::Element(convert_element(child)))
            } else {
                convert_leaf(child)
            }
        })
        .collect();

    Element {
        name: QName::new(prefix, tag.name()),
        namespace: tag.namespace().map(str::to_string),
        namespaces: declared_namespaces(node),
        attributes,
        children,
    }
}

// Attributes never use the default namespace, so only prefixed bindings count.
fn attribute_prefix<'a>(node: roxmltree::Node<'a, '_>, uri: &str) -> Option<&'a str> {
    if uri == "http://www.w3.org/XML/1998/namespace" {
        return Some(XML_PREFIX);
    }
    node.namespaces()
        .find(|ns| ns.uri() == uri && ns.name().is_some())
        .and_then(|ns| ns.name())
}

fn declared_namespaces(node: roxmltree::Node<'_, '_>) -> Vec<NamespaceDecl> {
    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|parent| parent.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();

    node.namespaces()
        .filter(|ns| ns.name() != Some(XML_PREFIX))
        .filter(|ns| !inherited.contains(&(ns.name(), ns.uri())))
        .map(|ns| NamespaceDecl {
            prefix: ns.name().map(str::to_string),
            uri: ns.uri().to_string(),
        })
        .collect()
}

fn convert_leaf(node: roxmltree::Node<'_, '_>) -> Option<Node> {
    match node.node_type() {
        NodeType::Text => node.text().map(|t| Node::Text(t.to_string())),
        NodeType::Comment => node.text().map(|t| Node::Comment(t.to_string())),
        NodeType::PI => node.pi().map(|pi| Node::ProcessingInstruction {
            target: pi.target.to_string(),
            value: pi.value.map(str::to_string),
        }),
        _ => None,
    }
}

fn write_error(err: impl std::fmt::Display) -> RefinerError {
    RefinerError::Serialization(format!("XML write error: {err}"))
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<()> {
    match node {
        Node::Element(element) => write_element(writer, element),
        Node::Text(text) => writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(write_error),
        Node::Comment(comment) => writer
            .write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))
            .map_err(write_error),
        Node::ProcessingInstruction { target, value } => {
            let raw = match value {
                Some(value) => format!("<?{target} {value}?>"),
                None => format!("<?{target}?>"),
            };
            writer.get_mut().extend_from_slice(raw.as_bytes());
            Ok(())
        }
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let qualified = element.name.qualified();
    let mut start = BytesStart::new(qualified.as_str());

    for decl in &element.namespaces {
        let key = match &decl.prefix {
            Some(prefix) => format!("xmlns:{prefix}"),
            None => "xmlns".to_string(),
        };
        start.push_attribute((key.as_str(), decl.uri.as_str()));
    }
    for attr in &element.attributes {
        let key = attr.name.qualified();
        start.push_attribute((key.as_str(), attr.value.as_str()));
    }

    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(write_error);
    }

    writer.write_event(Event::Start(start)).map_err(write_error)?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(qualified.as_str())))
        .map_err(write_error)
}
