//! Pattern tree to pushdown automaton compilation.
//!
//! The compiler walks the pattern in document order and threads a single
//! "current state" through it. Every pattern element consumes exactly one
//! subject node and then moves on to the node that should hold the next
//! element: its right sibling, or, after the last child of a rule, the right
//! sibling of some ancestor. The number of pending ascents is tracked in
//! `depth` and mirrored on the automaton stack by `I` symbols, so an element
//! that closes several rules at once pops as many `I`s as it moves `PARENT`.
//!
//! The rightmost element of a region (the whole pattern, an anywhere-search
//! body, or a macro transformation) has nowhere to go and exits in place.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::{debug, trace};
use thiserror::Error;

use crate::macros::{Macro, MacroRegistry, Mode};
use crate::pda::{
    Automaton, AutomatonBundle, CallTarget, MatchCondition, Move, NodeTest, StackSymbol, StateId,
    Transition, qualified_name,
};
use crate::tree::{Location, NodeId, NodeKind, NodeRef, Tree, Wildcard};

/// Rules whose children are matched as a subsequence rather than one to one.
pub const DEFAULT_OPEN_CONTAINERS: &[&str] = &["file_input", "block", "if_stmt"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    open_containers: BTreeSet<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self::with_open_containers(DEFAULT_OPEN_CONTAINERS.iter().copied())
    }
}

impl CompileOptions {
    pub fn with_open_containers<I, S>(containers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            open_containers: containers.into_iter().map(Into::into).collect(),
        }
    }

    /// Open containers accept any child count of at least one.
    pub fn is_open_container(&self, kind: &str) -> bool {
        self.open_containers.contains(kind)
    }

    pub fn open_containers(&self) -> impl Iterator<Item = &str> {
        self.open_containers.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("undefined macro '{name}' at {location}")]
    UndefinedMacro { name: String, location: Location },
    #[error("macro '{name}' takes at most {expected} argument(s) but {found} were given at {location}")]
    TooManyArguments {
        name: String,
        expected: usize,
        found: usize,
        location: Location,
    },
    #[error("macro '{name}' needs a value for '?{param}' at {location}")]
    MissingArgument {
        name: String,
        param: String,
        location: Location,
    },
    #[error("macro '{name}' has no transformations")]
    EmptyMacro { name: String },
    #[error("inverted repetition bounds {{{min},{max}}} at {location}")]
    InvertedBounds {
        min: usize,
        max: usize,
        location: Location,
    },
    #[error("repetition at {location} must cover at least one node")]
    EmptyRepetition { location: Location },
    #[error("search depth at {location} must be at least 1")]
    EmptySearchDepth { location: Location },
    #[error("'{wildcard}' cannot stand on its own at {location}")]
    MisplacedWildcard { wildcard: String, location: Location },
}

/// Compile `pattern` into an automaton bundle.
///
/// Macro calls are resolved against `registry` now; the automata of every
/// called transformation are copied into the bundle so that matching needs
/// nothing but the bundle and the registry's parameter lists.
pub fn compile(
    pattern: &Tree,
    registry: &MacroRegistry,
    options: &CompileOptions,
) -> Result<AutomatonBundle, CompileError> {
    let root = pattern.root();
    let mut compiler = Compiler {
        registry,
        options,
        automaton: Automaton::new(),
        callees: BTreeMap::new(),
        current: 0,
        depth: 0,
        saved_depths: Vec::new(),
        closers: vec![closing_element(root)],
    };
    compiler.element(root)?;
    Ok(compiler.finish())
}

/// Inclusive count of subject siblings one pattern child stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bound {
    down: usize,
    up: Option<usize>,
}

impl Bound {
    const OPEN: Bound = Bound { down: 1, up: None };

    fn of(child: NodeRef<'_>) -> Bound {
        match child.kind() {
            NodeKind::Wildcard(Wildcard::Repeat { min, max }) => Bound {
                down: *min,
                up: *max,
            },
            NodeKind::Wildcard(Wildcard::Rest) => Bound { down: 0, up: None },
            _ => Bound {
                down: 1,
                up: Some(1),
            },
        }
    }

    fn add(self, other: Bound) -> Bound {
        Bound {
            down: self.down + other.down,
            up: self.up.zip(other.up).map(|(a, b)| a + b),
        }
    }
}

fn is_rest(node: NodeRef<'_>) -> bool {
    matches!(node.kind(), NodeKind::Wildcard(Wildcard::Rest))
}

/// Children that get transitions of their own; `?*` only widens the bound.
fn compiled_children(node: NodeRef<'_>) -> impl DoubleEndedIterator<Item = NodeRef<'_>> {
    node.children().filter(|c| !is_rest(*c))
}

/// The element that ends a region: follow last compiled children down.
fn closing_element(mut node: NodeRef<'_>) -> NodeId {
    while let NodeKind::Rule(_) = node.kind() {
        match compiled_children(node).next_back() {
            Some(last) => node = last,
            None => break,
        }
    }
    node.id()
}

struct Compiler<'r> {
    registry: &'r MacroRegistry,
    options: &'r CompileOptions,
    automaton: Automaton,
    callees: BTreeMap<String, Arc<Automaton>>,
    current: StateId,
    /// Ascents owed once the current element is matched.
    depth: usize,
    /// Depths suspended while an anywhere-search body is compiled.
    saved_depths: Vec<usize>,
    /// Closing element of each open region, innermost last.
    closers: Vec<NodeId>,
}

impl Compiler<'_> {
    fn finish(mut self) -> AutomatonBundle {
        self.automaton.set_final(self.current);
        debug!(
            "compiled pattern: {} states, {} transitions, {} callee automata",
            self.automaton.state_count(),
            self.automaton.transitions().len(),
            self.callees.len()
        );
        AutomatonBundle::with_callees(self.automaton, self.callees)
    }

    fn emit(&mut self, transition: Transition) {
        trace!("emit {transition}");
        self.automaton.add_transition(transition);
    }

    /// Emit `condition` from the current state to a new one.
    fn advance(&mut self, transition: impl FnOnce(StateId, StateId) -> Transition) {
        let next = self.automaton.add_state();
        let t = transition(self.current, next);
        self.emit(t);
        self.current = next;
    }

    fn element(&mut self, node: NodeRef<'_>) -> Result<(), CompileError> {
        match node.kind() {
            NodeKind::Rule(kind) => self.rule(node, kind),
            NodeKind::Terminal(text) => {
                self.leaf(node, MatchCondition::Node(NodeTest::text(text)));
                Ok(())
            }
            NodeKind::Wildcard(wildcard) => match wildcard {
                Wildcard::Any => {
                    self.leaf(node, MatchCondition::Node(NodeTest::any()));
                    Ok(())
                }
                Wildcard::Named(name) => {
                    self.automaton.declare_wildcard(name);
                    self.leaf(node, MatchCondition::Named { name: name.clone() });
                    Ok(())
                }
                Wildcard::Repeat { min, max } => self.repeat(node, *min, *max),
                Wildcard::Body { max_depth } => self.search(node, *max_depth),
                Wildcard::Call { name, args } => self.call(node, name, args),
                Wildcard::Rest => Err(CompileError::MisplacedWildcard {
                    wildcard: wildcard.to_string(),
                    location: node.location(),
                }),
            },
        }
    }

    /// Stack pops and moves that carry the matcher past `node`.
    fn exit(&mut self, node: NodeRef<'_>) -> (Vec<StackSymbol>, Vec<Move>) {
        let depth = std::mem::take(&mut self.depth);
        if self.closers.last() == Some(&node.id()) {
            return (Vec::new(), Vec::new());
        }
        let mut moves = vec![Move::Parent; depth];
        moves.push(Move::RightSibling);
        (vec![StackSymbol::Indent; depth], moves)
    }

    /// Test the current node and step past it.
    fn leaf(&mut self, node: NodeRef<'_>, condition: MatchCondition) {
        let (pop, moves) = self.exit(node);
        self.advance(|from, to| Transition::new(from, condition, to).popping(pop).moving(moves));
    }

    fn skip_sibling_loop(&mut self) {
        let here = self.current;
        self.emit(
            Transition::new(here, MatchCondition::Node(NodeTest::any()), here)
                .moving(vec![Move::RightSibling]),
        );
    }

    fn rule(&mut self, node: NodeRef<'_>, kind: &str) -> Result<(), CompileError> {
        let bound = if self.options.is_open_container(kind) {
            Bound::OPEN
        } else {
            node.children().map(Bound::of).fold(
                Bound {
                    down: 0,
                    up: Some(0),
                },
                Bound::add,
            )
        };
        let test = MatchCondition::Node(NodeTest::rule(kind, bound.down, bound.up));

        let children: Vec<_> = compiled_children(node).collect();
        if children.is_empty() {
            self.leaf(node, test);
            return Ok(());
        }

        self.advance(|from, to| {
            Transition::new(from, test, to)
                .moving(vec![Move::LeftChild])
                .pushing(vec![StackSymbol::Indent])
        });

        let outer = self.depth;
        let last = children.len() - 1;
        for (i, child) in children.into_iter().enumerate() {
            self.depth = if i == last { outer + 1 } else { 0 };
            self.skip_sibling_loop();
            self.element(child)?;
        }
        Ok(())
    }

    fn repeat(
        &mut self,
        node: NodeRef<'_>,
        min: usize,
        max: Option<usize>,
    ) -> Result<(), CompileError> {
        let location = node.location();
        if min == 0 {
            return Err(CompileError::EmptyRepetition { location });
        }
        if let Some(max) = max {
            if max < min {
                return Err(CompileError::InvertedBounds { min, max, location });
            }
        }

        for _ in 1..min {
            self.advance(|from, to| {
                Transition::new(from, MatchCondition::Node(NodeTest::any()), to)
                    .moving(vec![Move::RightSibling])
            });
        }

        // One branch per optional extra node, all converging on `join`.
        if let Some(max) = max.filter(|&max| max > min) {
            let join = self.automaton.add_state();
            for extra in 0..=max - min {
                let from = self.current;
                self.emit(
                    Transition::new(from, MatchCondition::Node(NodeTest::any()), join)
                        .moving(vec![Move::RightSibling; extra]),
                );
            }
            self.current = join;
        }

        self.leaf(node, MatchCondition::Node(NodeTest::any()));
        Ok(())
    }

    /// `(?: P)`: descend into the current node and find `P` at any position
    /// below it, at most `max_depth` levels down.
    fn search(&mut self, node: NodeRef<'_>, max_depth: Option<usize>) -> Result<(), CompileError> {
        let location = node.location();
        if max_depth == Some(0) {
            return Err(CompileError::EmptySearchDepth { location });
        }
        let Some(inner) = node.children().next() else {
            return Err(CompileError::MisplacedWildcard {
                wildcard: Wildcard::Body { max_depth }.to_string(),
                location,
            });
        };
        if is_rest(inner) {
            return Err(CompileError::MisplacedWildcard {
                wildcard: Wildcard::Rest.to_string(),
                location: inner.location(),
            });
        }

        let depth = std::mem::take(&mut self.depth);
        self.saved_depths.push(depth);

        let any = || MatchCondition::Node(NodeTest::any());
        self.advance(|from, to| {
            Transition::new(from, any(), to)
                .moving(vec![Move::LeftChild])
                .pushing(vec![StackSymbol::Body, StackSymbol::Indent])
        });

        let start = self.automaton.add_state();
        let mut level = self.current;
        let levels = max_depth.unwrap_or(1);
        for i in 0..levels {
            self.emit(Transition::new(level, any(), level).moving(vec![Move::RightSibling]));
            self.emit(Transition::new(level, any(), start));
            if max_depth.is_none() {
                self.emit(
                    Transition::new(level, any(), level)
                        .moving(vec![Move::LeftChild])
                        .pushing(vec![StackSymbol::Indent]),
                );
            } else if i + 1 < levels {
                let deeper = self.automaton.add_state();
                self.emit(
                    Transition::new(level, any(), deeper)
                        .moving(vec![Move::LeftChild])
                        .pushing(vec![StackSymbol::Indent]),
                );
                level = deeper;
            }
        }

        self.current = start;
        self.closers.push(closing_element(inner));
        self.element(inner)?;
        self.closers.pop();

        self.depth = self.saved_depths.pop().unwrap_or_default();
        self.close_region(node);
        Ok(())
    }

    /// Climb back to the region's body marker, pop it, and step past `node`.
    fn close_region(&mut self, node: NodeRef<'_>) {
        let here = self.current;
        self.emit(
            Transition::new(here, MatchCondition::Node(NodeTest::any()), here)
                .popping(vec![StackSymbol::Indent])
                .moving(vec![Move::Parent]),
        );
        let (mut pop, moves) = self.exit(node);
        pop.push(StackSymbol::Body);
        self.advance(|from, to| {
            Transition::new(from, MatchCondition::Node(NodeTest::any()), to)
                .popping(pop)
                .moving(moves)
        });
    }

    fn call(&mut self, node: NodeRef<'_>, name: &str, args: &[String]) -> Result<(), CompileError> {
        let location = node.location();
        let registry = self.registry;
        let Some(mac) = registry.get(name) else {
            return Err(CompileError::UndefinedMacro {
                name: name.to_string(),
                location,
            });
        };
        check_arity(mac, args, location)?;
        if mac.transformations().is_empty() {
            return Err(CompileError::EmptyMacro {
                name: name.to_string(),
            });
        }

        for arg in args {
            self.automaton.declare_wildcard(arg);
        }
        self.import(mac);

        let calls: Vec<MatchCondition> = mac
            .transformations()
            .iter()
            .map(|t| {
                MatchCondition::Call(CallTarget {
                    macro_name: mac.name().to_string(),
                    transformation: t.name().to_string(),
                    args: args.to_vec(),
                })
            })
            .collect();

        match mac.mode() {
            Mode::AnyOf => {
                let (pop, moves) = self.exit(node);
                let from = self.current;
                let next = self.automaton.add_state();
                for call in calls {
                    self.emit(
                        Transition::new(from, call, next)
                            .popping(pop.clone())
                            .moving(moves.clone()),
                    );
                }
                self.current = next;
            }
            Mode::AllOf => {
                self.all_of(calls);
                self.close_region(node);
            }
        }
        Ok(())
    }

    /// One call chain per ordering of `calls`. Between two calls the matcher
    /// may roam freely below the body marker pushed by the first call.
    fn all_of(&mut self, calls: Vec<MatchCondition>) {
        let entry = self.current;
        let end = self.automaton.add_state();
        for order in permutations(calls.len()) {
            let mut at = entry;
            for (step, &i) in order.iter().enumerate() {
                let last = step + 1 == order.len();
                let target = if last {
                    end
                } else {
                    self.automaton.add_state()
                };
                let mut transition = Transition::new(at, calls[i].clone(), target);
                if step == 0 {
                    transition = transition.pushing(vec![StackSymbol::Body]);
                }
                self.emit(transition);
                if !last {
                    self.roaming_loops(target);
                }
                at = target;
            }
        }
        self.current = end;
    }

    fn roaming_loops(&mut self, state: StateId) {
        self.automaton.mark_revisitable(state);
        let any = || MatchCondition::Node(NodeTest::any());
        self.emit(Transition::new(state, any(), state).moving(vec![Move::RightSibling]));
        self.emit(
            Transition::new(state, any(), state)
                .moving(vec![Move::LeftChild])
                .pushing(vec![StackSymbol::Indent]),
        );
        self.emit(
            Transition::new(state, any(), state)
                .popping(vec![StackSymbol::Indent])
                .moving(vec![Move::Parent]),
        );
    }

    /// Copy the automata of every transformation of `mac` into the bundle.
    fn import(&mut self, mac: &Macro) {
        for transformation in mac.transformations() {
            let bundle = transformation.bundle();
            self.callees.insert(
                qualified_name(mac.name(), transformation.name()),
                bundle.main_arc(),
            );
            for (key, automaton) in bundle.callees() {
                self.callees.insert(key.to_string(), Arc::clone(automaton));
            }
        }
    }
}

fn check_arity(mac: &Macro, args: &[String], location: Location) -> Result<(), CompileError> {
    let params = mac.params();
    if args.len() > params.len() {
        return Err(CompileError::TooManyArguments {
            name: mac.name().to_string(),
            expected: params.len(),
            found: args.len(),
            location,
        });
    }
    if let Some(missing) = params[args.len()..].iter().find(|p| p.default().is_none()) {
        return Err(CompileError::MissingArgument {
            name: mac.name().to_string(),
            param: missing.name().to_string(),
            location,
        });
    }
    Ok(())
}

/// All orderings of `0..n`, lexicographic.
fn permutations(n: usize) -> Vec<Vec<usize>> {
    fn extend(n: usize, prefix: &mut Vec<usize>, used: &mut [bool], out: &mut Vec<Vec<usize>>) {
        if prefix.len() == n {
            out.push(prefix.clone());
            return;
        }
        for i in 0..n {
            if !used[i] {
                used[i] = true;
                prefix.push(i);
                extend(n, prefix, used, out);
                prefix.pop();
                used[i] = false;
            }
        }
    }

    let mut out = Vec::new();
    extend(n, &mut Vec::with_capacity(n), &mut vec![false; n], &mut out);
    out
}
