//! Arena-backed syntax trees.
//!
//! Every node lives in one `Vec` owned by its [`Tree`]. Children are ordered
//! indices into that arena and each node keeps a non-owning index back to its
//! parent, so upward navigation never needs shared ownership. Trees are
//! immutable once built; both subject trees and pattern trees (which may
//! additionally contain [`Wildcard`] nodes) use this representation.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

/// Index of a node inside its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Zero-based position in a source text. Displayed one-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Step past one byte of input.
    pub fn advance(&mut self, byte: u8) {
        if byte == b'\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// Pattern-only node descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Wildcard {
    /// `?`: exactly one node, untested.
    Any,
    /// `?name`: one node, bound to `name` on first sight.
    Named(String),
    /// `?{min,max}`: between `min` and `max` consecutive siblings.
    Repeat { min: usize, max: Option<usize> },
    /// `?*`: any number of remaining siblings, including none.
    Rest,
    /// `(?: P)`: `P` occurs somewhere below the current node.
    /// The embedded pattern is the node's only child.
    Body { max_depth: Option<usize> },
    /// `(?@Name ?a ?b)`: invoke a registered macro.
    Call { name: String, args: Vec<String> },
}

impl fmt::Display for Wildcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Wildcard::Any => f.write_str("?"),
            Wildcard::Named(name) => write!(f, "?{name}"),
            Wildcard::Repeat { min, max: Some(max) } if min == max => write!(f, "?{{{min}}}"),
            Wildcard::Repeat { min, max: Some(max) } => write!(f, "?{{{min},{max}}}"),
            Wildcard::Repeat { min, max: None } => write!(f, "?{{{min},}}"),
            Wildcard::Rest => f.write_str("?*"),
            Wildcard::Body { max_depth: None } => f.write_str("?:"),
            Wildcard::Body {
                max_depth: Some(depth),
            } => write!(f, "?:{depth}"),
            Wildcard::Call { name, .. } => write!(f, "?@{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Internal node named after the grammar rule that produced it.
    Rule(String),
    /// Leaf carrying literal source text.
    Terminal(String),
    Wildcard(Wildcard),
}

impl NodeKind {
    pub fn rule(name: impl Into<String>) -> Self {
        NodeKind::Rule(name.into())
    }

    pub fn terminal(text: impl Into<String>) -> Self {
        NodeKind::Terminal(text.into())
    }

    /// Rule name, terminal text, or wildcard spelling.
    pub fn label(&self) -> String {
        match self {
            NodeKind::Rule(name) => name.clone(),
            NodeKind::Terminal(text) => text.clone(),
            NodeKind::Wildcard(w) => w.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    /// Position among the parent's children.
    index: usize,
    children: Vec<NodeId>,
    location: Location,
}

/// An ordered, rooted tree. Never empty: the root is created with the tree.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn new(root: NodeKind, location: Location) -> Self {
        Self {
            nodes: vec![Node {
                kind: root,
                parent: None,
                index: 0,
                children: Vec::new(),
                location,
            }],
        }
    }

    /// Append a new last child under `parent`.
    pub fn add_child(&mut self, parent: NodeId, kind: NodeKind, location: Location) -> NodeId {
        let id = NodeId(self.nodes.len());
        let index = self.nodes[parent.0].children.len();
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            index,
            children: Vec::new(),
            location,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn root(&self) -> NodeRef<'_> {
        self.node(NodeId::ROOT)
    }

    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { tree: self, id }
    }

    // A tree always holds at least its root.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when any node is a wildcard, i.e. the tree only makes sense as a pattern.
    pub fn has_wildcards(&self) -> bool {
        self.nodes
            .iter()
            .any(|n| matches!(n.kind, NodeKind::Wildcard(_)))
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root().fmt(f)
    }
}

/// A borrowed handle to one node of a tree.
///
/// Equality and hashing are by identity (same tree, same index). Use
/// [`NodeRef::structurally_eq`] to compare shapes.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a Tree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    fn data(&self) -> &'a Node {
        &self.tree.nodes[self.id.0]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'a Tree {
        self.tree
    }

    pub fn kind(&self) -> &'a NodeKind {
        &self.data().kind
    }

    pub fn location(&self) -> Location {
        self.data().location
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind(), NodeKind::Terminal(_))
    }

    pub fn child_count(&self) -> usize {
        self.data().children.len()
    }

    pub fn children(self) -> impl DoubleEndedIterator<Item = NodeRef<'a>> {
        let tree = self.tree;
        self.data()
            .children
            .iter()
            .map(move |&id| NodeRef { tree, id })
    }

    pub fn child(&self, index: usize) -> Option<NodeRef<'a>> {
        let id = *self.data().children.get(index)?;
        Some(NodeRef {
            tree: self.tree,
            id,
        })
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        let id = self.data().parent?;
        Some(NodeRef {
            tree: self.tree,
            id,
        })
    }

    pub fn first_child(&self) -> Option<NodeRef<'a>> {
        self.child(0)
    }

    pub fn right_sibling(&self) -> Option<NodeRef<'a>> {
        self.parent()?.child(self.data().index + 1)
    }

    /// Deep equality of kind, text and ordered children.
    pub fn structurally_eq(&self, other: NodeRef<'_>) -> bool {
        let mut pending = vec![(*self, other)];
        while let Some((a, b)) = pending.pop() {
            if a.kind() != b.kind() || a.child_count() != b.child_count() {
                return false;
            }
            pending.extend(a.children().zip(b.children()));
        }
        true
    }

    /// Leaf texts of the subtree, space separated.
    pub fn text(&self) -> String {
        let mut words = Vec::new();
        let mut pending = vec![*self];
        while let Some(node) = pending.pop() {
            if let NodeKind::Terminal(text) = node.kind() {
                words.push(text.as_str());
            }
            pending.extend(node.children().rev());
        }
        words.join(" ")
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for NodeRef<'_> {}

impl Hash for NodeRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.tree, state);
        self.id.hash(state);
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef(#{} {:?})", self.id.0, self.kind().label())
    }
}

/// Renders the subtree in tree notation.
impl fmt::Display for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            NodeKind::Terminal(text) => write_terminal(f, text),
            NodeKind::Wildcard(Wildcard::Call { name, args }) => {
                if args.is_empty() {
                    return write!(f, "?@{name}");
                }
                write!(f, "(?@{name}")?;
                for arg in args {
                    write!(f, " ?{arg}")?;
                }
                f.write_str(")")
            }
            NodeKind::Wildcard(w @ Wildcard::Body { .. }) => {
                write!(f, "({w}")?;
                for child in self.children() {
                    write!(f, " {child}")?;
                }
                f.write_str(")")
            }
            NodeKind::Wildcard(w) => write!(f, "{w}"),
            NodeKind::Rule(name) => {
                write!(f, "({name}")?;
                for child in self.children() {
                    write!(f, " {child}")?;
                }
                f.write_str(")")
            }
        }
    }
}

fn write_terminal(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    let bare = !text.is_empty()
        && !text.starts_with('?')
        && !text
            .bytes()
            .any(|b| b.is_ascii_whitespace() || b"()\"';\\".contains(&b));
    if bare {
        return f.write_str(text);
    }
    f.write_str("\"")?;
    for ch in text.chars() {
        match ch {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            _ => write!(f, "{ch}")?,
        }
    }
    f.write_str("\"")
}
