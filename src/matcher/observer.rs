use log::{debug, trace};

use super::Match;
use crate::pda::StateId;
use crate::tree::NodeRef;

/// Hooks into a running [`Matcher`](super::Matcher). All methods default to
/// doing nothing.
pub trait MatchObserver {
    fn on_start(&mut self, _entry: &str, _root: NodeRef<'_>) {}

    fn on_step(&mut self, _step: usize, _state: StateId, _node: NodeRef<'_>) {}

    fn on_match(&mut self, _found: &Match<'_>) {}
}

/// Writes search progress to the `log` facade at trace level, and matches at
/// debug level.
#[derive(Debug, Default)]
pub struct LogObserver {
    label: String,
}

impl LogObserver {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl MatchObserver for LogObserver {
    fn on_start(&mut self, entry: &str, root: NodeRef<'_>) {
        trace!("{}: start {entry} at {root:?}", self.label);
    }

    fn on_step(&mut self, step: usize, state: StateId, node: NodeRef<'_>) {
        trace!("{}: step {step} q{state} at {node:?}", self.label);
    }

    fn on_match(&mut self, found: &Match<'_>) {
        let bindings: Vec<String> = found
            .bindings()
            .iter()
            .map(|(name, node)| match node {
                Some(node) => format!("?{name}={node}"),
                None => format!("?{name} unbound"),
            })
            .collect();
        debug!(
            "{}: match at step {} [{}]",
            self.label,
            found.step(),
            bindings.join(", ")
        );
    }
}
