use std::fmt;

use serde::Serialize;

use crate::tree::{NodeKind, NodeRef};

/// What a node test compares against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Label {
    /// Accept any node.
    Any,
    /// Internal node of this rule.
    Rule(String),
    /// Terminal with exactly this text.
    Text(String),
}

/// A node test: label plus an inclusive child-count range for internal nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NodeTest {
    pub label: Label,
    pub down: usize,
    /// `None` is unbounded.
    pub up: Option<usize>,
}

impl NodeTest {
    pub fn any() -> Self {
        Self {
            label: Label::Any,
            down: 0,
            up: None,
        }
    }

    pub fn rule(kind: &str, down: usize, up: Option<usize>) -> Self {
        Self {
            label: Label::Rule(kind.to_string()),
            down,
            up,
        }
    }

    pub fn text(text: &str) -> Self {
        Self {
            label: Label::Text(text.to_string()),
            down: 0,
            up: Some(0),
        }
    }

    pub fn accepts(&self, node: NodeRef<'_>) -> bool {
        match (&self.label, node.kind()) {
            (Label::Any, _) => true,
            (Label::Text(expected), NodeKind::Terminal(text)) => expected == text,
            (Label::Rule(expected), NodeKind::Rule(kind)) => {
                let count = node.child_count();
                expected == kind && count >= self.down && self.up.is_none_or(|up| count <= up)
            }
            _ => false,
        }
    }
}

impl fmt::Display for NodeTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Label::Any => f.write_str("_"),
            Label::Text(text) => write!(f, "{text:?}"),
            Label::Rule(kind) => match self.up {
                Some(up) => write!(f, "{kind}[{},{up}]", self.down),
                None => write!(f, "{kind}[{},]", self.down),
            },
        }
    }
}

/// A call into one transformation of a registered macro.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CallTarget {
    pub macro_name: String,
    pub transformation: String,
    /// Caller-side wildcard names, positionally matched to the formals.
    pub args: Vec<String>,
}

impl CallTarget {
    /// Key of the callee automaton in a bundle: `Macro::transformation`.
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.macro_name, &self.transformation)
    }
}

pub fn qualified_name(macro_name: &str, transformation: &str) -> String {
    format!("{macro_name}::{transformation}")
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchCondition {
    Node(NodeTest),
    Named { name: String },
    Call(CallTarget),
}

impl fmt::Display for MatchCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchCondition::Node(test) => test.fmt(f),
            MatchCondition::Named { name } => write!(f, "?{name}"),
            MatchCondition::Call(target) => {
                write!(f, "?@{}", target.qualified_name())?;
                if !target.args.is_empty() {
                    write!(f, "({})", target.args.join(", "))?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notation::parse_subject;

    #[test]
    fn rule_test_checks_kind_and_arity() {
        let tree = parse_subject("(args a b c)").unwrap();
        let root = tree.root();
        assert!(NodeTest::rule("args", 3, Some(3)).accepts(root));
        assert!(NodeTest::rule("args", 2, Some(4)).accepts(root));
        assert!(NodeTest::rule("args", 1, None).accepts(root));
        assert!(!NodeTest::rule("args", 4, Some(6)).accepts(root));
        assert!(!NodeTest::rule("args", 1, Some(2)).accepts(root));
        assert!(!NodeTest::rule("params", 3, Some(3)).accepts(root));
    }

    #[test]
    fn text_test_only_matches_terminals() {
        let tree = parse_subject("(a a)").unwrap();
        let root = tree.root();
        let leaf = root.child(0).unwrap();
        assert!(NodeTest::text("a").accepts(leaf));
        assert!(!NodeTest::text("a").accepts(root));
        assert!(!NodeTest::rule("a", 0, None).accepts(leaf));
        assert!(NodeTest::any().accepts(root));
        assert!(NodeTest::any().accepts(leaf));
    }

    #[test]
    fn conditions_serialize_with_type_tag() {
        let json = serde_json::to_value(MatchCondition::Node(NodeTest::rule("block", 1, None))).unwrap();
        assert_eq!(json["type"], "node");
        assert_eq!(json["label"]["kind"], "rule");
        assert_eq!(json["label"]["value"], "block");
        assert!(json["up"].is_null());

        let call = MatchCondition::Call(CallTarget {
            macro_name: "Incr".into(),
            transformation: "plus_eq".into(),
            args: vec!["i".into()],
        });
        assert_eq!(call.to_string(), "?@Incr::plus_eq(i)");
        assert_eq!(serde_json::to_value(&call).unwrap()["macro_name"], "Incr");
    }
}
