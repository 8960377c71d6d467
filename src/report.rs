use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::matcher::{Match, Step};
use crate::pda::{Label, MatchCondition, StackSymbol};
use crate::tree::NodeRef;

/// The value of one named wildcard in a reported match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundNode {
    pub kind: String,
    /// The subtree in tree notation.
    pub text: String,
    /// 1-indexed line number
    pub line: usize,
    /// 1-indexed column (bytes)
    pub column: usize,
}

impl BoundNode {
    fn new(node: NodeRef<'_>) -> Self {
        let location = node.location();
        Self {
            kind: node.kind().label(),
            text: node.to_string(),
            line: location.line + 1,
            column: location.column + 1,
        }
    }
}

/// A match, detached from the subject tree so it can outlive it.
#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    pub path: String,
    /// Name of the pattern set that matched. Absent for a command-line pattern.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub line: usize,
    pub column: usize,
    pub step: usize,
    pub bindings: BTreeMap<String, Option<BoundNode>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
}

impl MatchReport {
    pub fn from_match(path: &str, found: &Match<'_>, with_trace: bool) -> Self {
        let (line, column) = match anchor(found.trace()) {
            Some(node) => {
                let location = node.location();
                (location.line + 1, location.column + 1)
            }
            None => (1, 1),
        };
        let bindings = found
            .bindings()
            .iter()
            .map(|(name, node)| (name.clone(), node.map(BoundNode::new)))
            .collect();
        let trace = if with_trace {
            found
                .trace()
                .iter()
                .map(|step| format!("{} @ {}", step.transition, step.node.location()))
                .collect()
        } else {
            Vec::new()
        };
        Self {
            path: path.to_string(),
            pattern: None,
            line,
            column,
            step: found.step(),
            bindings,
            trace,
        }
    }

    /// A pattern set that holds on the whole subject without a positive
    /// match to point at, e.g. one built only from `not`.
    pub fn whole_file(path: &str, pattern: Option<&str>) -> Self {
        Self {
            path: path.to_string(),
            pattern: pattern.map(str::to_string),
            line: 1,
            column: 1,
            step: 0,
            bindings: BTreeMap::new(),
            trace: Vec::new(),
        }
    }

    pub fn for_pattern(mut self, pattern: Option<&str>) -> Self {
        self.pattern = pattern.map(str::to_string);
        self
    }

    pub fn sort_key(&self) -> (&str, usize, usize, Option<&str>, usize) {
        (&self.path, self.line, self.column, self.pattern.as_deref(), self.step)
    }
}

/// Where a match is reported: the first node actually tested inside the
/// innermost search or composition region, or the first tested node.
fn anchor<'a>(trace: &[Step<'a>]) -> Option<NodeRef<'a>> {
    let region = trace
        .iter()
        .rposition(|s| s.transition.push.contains(&StackSymbol::Body))
        .unwrap_or(0);
    trace[region..]
        .iter()
        .find(|s| match &s.transition.condition {
            MatchCondition::Node(test) => test.label != Label::Any,
            _ => true,
        })
        .or_else(|| trace.first())
        .map(|s| s.node)
}

impl fmt::Display for MatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}: ", self.path, self.line, self.column)?;
        if let Some(pattern) = &self.pattern {
            write!(f, "{pattern}: ")?;
        }
        f.write_str("match")?;
        for (name, value) in &self.bindings {
            match value {
                Some(node) => write!(f, " ?{name}={}", node.text)?,
                None => write!(f, " ?{name} unbound")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macros::MacroRegistry;
    use crate::matcher::{Bindings, find_matches};
    use crate::testutil::{compile_pattern, subject};

    fn reports(pattern: &str, tree: &str) -> Vec<MatchReport> {
        let registry = MacroRegistry::new();
        let bundle = compile_pattern(pattern, &registry);
        let tree = subject(tree);
        find_matches(&bundle, &registry, &tree, false, Bindings::new())
            .iter()
            .map(|m| MatchReport::from_match("t.tree", m, true))
            .collect()
    }

    #[test]
    fn bindings_are_rendered() {
        let found = reports("(expr_stmt ?x = ?y)", "(expr_stmt (name a)\n  = (number 1))");
        assert_eq!(found.len(), 1);
        let report = &found[0];
        assert_eq!(report.to_string(), "t.tree:1:1: match ?x=(name a) ?y=(number 1)");
        let y = report.bindings["y"].as_ref().unwrap();
        assert_eq!((y.kind.as_str(), y.line, y.column), ("number", 2, 5));
        assert_eq!(report.trace.len(), 4);
    }

    #[test]
    fn search_matches_are_anchored_inside_the_region() {
        let found = reports(
            "(block (?: (return_stmt return ?)))",
            "(block\n (if_stmt if x\n  (return_stmt return x)))",
        );
        assert_eq!(found.len(), 1);
        assert_eq!((found[0].line, found[0].column), (3, 3));
    }

    #[test]
    fn json_omits_empty_trace() {
        let registry = MacroRegistry::new();
        let bundle = compile_pattern("(a ?v)", &registry);
        let tree = subject("(a b)");
        let matches = find_matches(&bundle, &registry, &tree, false, Bindings::new());
        let report = MatchReport::from_match("t.tree", matches.first().unwrap(), false);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("trace").is_none());
        assert_eq!(json["bindings"]["v"]["text"], "b");
        assert_eq!(json["bindings"]["v"]["kind"], "b");
        assert!(json.get("pattern").is_none());
    }

    #[test]
    fn pattern_name_is_shown_and_serialized() {
        let found = reports("(expr_stmt ?x = ?y)", "(expr_stmt (name a) = (number 1))");
        let report = found[0].clone().for_pattern(Some("assign"));
        assert_eq!(report.to_string(), "t.tree:1:1: assign: match ?x=(name a) ?y=(number 1)");
        assert_eq!(serde_json::to_value(&report).unwrap()["pattern"], "assign");

        let whole = MatchReport::whole_file("t.tree", Some("no_globals"));
        assert_eq!(whole.to_string(), "t.tree:1:1: no_globals: match");
        assert!(whole.bindings.is_empty());
    }
}
