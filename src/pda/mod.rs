//! Pushdown automaton model.
//!
//! Pure data shared by the compiler (which builds automata) and the matcher
//! (which simulates them). An automaton is read-only once compiled and is
//! shared by every search branch through `Arc`.

mod condition;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

pub use condition::{CallTarget, Label, MatchCondition, NodeTest, qualified_name};

pub type StateId = usize;

/// Bundle key of the top-level automaton.
pub const MAIN: &str = "__main__";

/// One tree navigation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Move {
    Parent,
    RightSibling,
    LeftChild,
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Move::Parent => "PARENT",
            Move::RightSibling => "RIGHT_SIBLING",
            Move::LeftChild => "LEFT_CHILD",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StackSymbol {
    /// One level of descent.
    #[serde(rename = "I")]
    Indent,
    /// Start of a search or composition region.
    #[serde(rename = "B")]
    Body,
}

impl StackSymbol {
    pub fn code(self) -> char {
        match self {
            StackSymbol::Indent => 'I',
            StackSymbol::Body => 'B',
        }
    }
}

fn stack_string(symbols: &[StackSymbol]) -> String {
    symbols.iter().map(|s| s.code()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub source: StateId,
    /// Required stack suffix, removed when the transition fires.
    pub pop: Vec<StackSymbol>,
    pub condition: MatchCondition,
    /// Applied atomically after the condition holds.
    pub moves: Vec<Move>,
    pub target: StateId,
    pub push: Vec<StackSymbol>,
}

impl Transition {
    pub fn new(source: StateId, condition: MatchCondition, target: StateId) -> Self {
        Self {
            source,
            pop: Vec::new(),
            condition,
            moves: Vec::new(),
            target,
            push: Vec::new(),
        }
    }

    pub fn popping(mut self, pop: Vec<StackSymbol>) -> Self {
        self.pop = pop;
        self
    }

    pub fn moving(mut self, moves: Vec<Move>) -> Self {
        self.moves = moves;
        self
    }

    pub fn pushing(mut self, push: Vec<StackSymbol>) -> Self {
        self.push = push;
        self
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{} ", self.source)?;
        if !self.pop.is_empty() {
            write!(f, "[-{}] ", stack_string(&self.pop))?;
        }
        write!(f, "{}", self.condition)?;
        for mv in &self.moves {
            write!(f, " {mv}")?;
        }
        if !self.push.is_empty() {
            write!(f, " [+{}]", stack_string(&self.push))?;
        }
        write!(f, " -> q{}", self.target)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Automaton {
    states: usize,
    final_state: StateId,
    named_wildcards: BTreeSet<String>,
    transitions: Vec<Transition>,
    /// States whose search may loop back onto an identical configuration.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    revisitable: BTreeSet<StateId>,
    /// Indices into `transitions`, per source state.
    #[serde(skip)]
    outgoing: Vec<Vec<usize>>,
}

impl Default for Automaton {
    fn default() -> Self {
        Self::new()
    }
}

impl Automaton {
    /// A fresh automaton holding only the initial state.
    pub fn new() -> Self {
        Self {
            states: 1,
            final_state: 0,
            named_wildcards: BTreeSet::new(),
            transitions: Vec::new(),
            revisitable: BTreeSet::new(),
            outgoing: vec![Vec::new()],
        }
    }

    pub fn initial_state(&self) -> StateId {
        0
    }

    pub fn add_state(&mut self) -> StateId {
        self.outgoing.push(Vec::new());
        self.states += 1;
        self.states - 1
    }

    pub fn add_transition(&mut self, transition: Transition) {
        debug_assert!(transition.source < self.states && transition.target < self.states);
        self.outgoing[transition.source].push(self.transitions.len());
        self.transitions.push(transition);
    }

    pub fn state_count(&self) -> usize {
        self.states
    }

    pub fn final_state(&self) -> StateId {
        self.final_state
    }

    pub fn set_final(&mut self, state: StateId) {
        self.final_state = state;
    }

    pub fn is_final(&self, state: StateId) -> bool {
        state == self.final_state
    }

    pub fn declare_wildcard(&mut self, name: &str) {
        self.named_wildcards.insert(name.to_string());
    }

    pub fn named_wildcards(&self) -> &BTreeSet<String> {
        &self.named_wildcards
    }

    /// Every transition, in construction order.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Outgoing transitions of `state`, in construction order.
    pub fn transitions_from(&self, state: StateId) -> impl Iterator<Item = &Transition> + '_ {
        self.outgoing
            .get(state)
            .into_iter()
            .flatten()
            .map(|&i| &self.transitions[i])
    }

    /// Mark `state` as one the matcher must deduplicate configurations at.
    /// Only states whose loops can climb back down to a node they already
    /// visited with the same stack need this.
    pub fn mark_revisitable(&mut self, state: StateId) {
        self.revisitable.insert(state);
    }

    pub fn revisitable_states(&self) -> HashSet<StateId> {
        self.revisitable.iter().copied().collect()
    }
}

impl fmt::Display for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} states, final q{}, wildcards {:?}",
            self.states, self.final_state, self.named_wildcards
        )?;
        for t in &self.transitions {
            writeln!(f, "  {t}")?;
        }
        Ok(())
    }
}

/// A compiled pattern plus every macro transformation reachable from it.
#[derive(Debug, Clone)]
pub struct AutomatonBundle {
    main: Arc<Automaton>,
    callees: BTreeMap<String, Arc<Automaton>>,
}

impl AutomatonBundle {
    pub fn new(main: Automaton) -> Self {
        Self {
            main: Arc::new(main),
            callees: BTreeMap::new(),
        }
    }

    pub fn with_callees(main: Automaton, callees: BTreeMap<String, Arc<Automaton>>) -> Self {
        Self {
            main: Arc::new(main),
            callees,
        }
    }

    pub fn main(&self) -> &Automaton {
        &self.main
    }

    pub fn main_arc(&self) -> Arc<Automaton> {
        Arc::clone(&self.main)
    }

    /// Look up `"__main__"` or a `Macro::transformation` key.
    pub fn get(&self, key: &str) -> Option<&Automaton> {
        if key == MAIN {
            return Some(&self.main);
        }
        self.callees.get(key).map(|a| a.as_ref())
    }

    pub fn callees(&self) -> impl Iterator<Item = (&str, &Arc<Automaton>)> {
        self.callees.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(MAIN).chain(self.callees.keys().map(String::as_str))
    }

    /// Number of automata, counting the main one.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.callees.len() + 1
    }
}

impl Serialize for AutomatonBundle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        map.serialize_entry(MAIN, self.main.as_ref())?;
        for (key, automaton) in &self.callees {
            map.serialize_entry(key, automaton.as_ref())?;
        }
        map.end()
    }
}
