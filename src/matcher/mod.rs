//! Pushdown automaton simulation over a subject tree.
//!
//! The search is a LIFO worklist of configurations. Each configuration owns
//! its stack, bindings and trace, so branching is a plain clone and no branch
//! can observe another. Failing transitions simply produce no successor.

mod call;
mod observer;

use std::collections::{BTreeMap, HashSet};

use log::trace;

use crate::macros::MacroRegistry;
use crate::pda::{
    Automaton, AutomatonBundle, MAIN, MatchCondition, Move, StackSymbol, StateId, Transition,
};
use crate::tree::{NodeRef, Tree};

pub use observer::{LogObserver, MatchObserver};

/// Wildcard name to bound subtree; `None` is declared but unbound.
pub type Bindings<'a> = BTreeMap<String, Option<NodeRef<'a>>>;

/// One fired transition and the node it was tested against.
#[derive(Debug, Clone, Copy)]
pub struct Step<'a> {
    pub transition: &'a Transition,
    pub node: NodeRef<'a>,
}

#[derive(Debug, Clone)]
struct Configuration<'a> {
    state: StateId,
    node: NodeRef<'a>,
    stack: Vec<StackSymbol>,
    bindings: Bindings<'a>,
    trace: Vec<Step<'a>>,
}

/// Everything but the trace; two configurations with the same key have the
/// same future.
#[derive(PartialEq, Eq, Hash)]
struct VisitKey<'a> {
    state: StateId,
    node: NodeRef<'a>,
    stack: Vec<StackSymbol>,
    bindings: Bindings<'a>,
}

impl<'a> Configuration<'a> {
    fn visit_key(&self) -> VisitKey<'a> {
        VisitKey {
            state: self.state,
            node: self.node,
            stack: self.stack.clone(),
            bindings: self.bindings.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Match<'a> {
    step: usize,
    bindings: Bindings<'a>,
    trace: Vec<Step<'a>>,
}

impl<'a> Match<'a> {
    /// Index of the search step that reached the final state.
    pub fn step(&self) -> usize {
        self.step
    }

    pub fn bindings(&self) -> &Bindings<'a> {
        &self.bindings
    }

    pub fn binding(&self, name: &str) -> Option<NodeRef<'a>> {
        self.bindings.get(name).copied().flatten()
    }

    pub fn trace(&self) -> &[Step<'a>] {
        &self.trace
    }
}

/// Matches in discovery order.
#[derive(Debug, Clone, Default)]
pub struct MatchSet<'a> {
    matches: Vec<Match<'a>>,
}

impl<'a> MatchSet<'a> {
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn first(&self) -> Option<&Match<'a>> {
        self.matches.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Match<'a>> {
        self.matches.iter()
    }
}

impl<'a> IntoIterator for MatchSet<'a> {
    type Item = Match<'a>;
    type IntoIter = std::vec::IntoIter<Match<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.into_iter()
    }
}

impl<'s, 'a> IntoIterator for &'s MatchSet<'a> {
    type Item = &'s Match<'a>;
    type IntoIter = std::slice::Iter<'s, Match<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.iter()
    }
}

/// One simulation of one automaton of a bundle, rooted at one subject node.
pub struct Matcher<'a> {
    bundle: &'a AutomatonBundle,
    registry: &'a MacroRegistry,
    entry: String,
    automaton: &'a Automaton,
    /// Search root: nothing above it or beside it is reachable.
    root: NodeRef<'a>,
    stop_at_first: bool,
    revisitable: HashSet<StateId>,
    visited: HashSet<VisitKey<'a>>,
    worklist: Vec<Configuration<'a>>,
    matches: Vec<Match<'a>>,
    steps: usize,
    observers: Vec<Box<dyn MatchObserver + 'a>>,
}

impl<'a> Matcher<'a> {
    /// Match the bundle's main automaton against the whole of `subject`.
    pub fn new(bundle: &'a AutomatonBundle, registry: &'a MacroRegistry, subject: &'a Tree) -> Self {
        Self::build(bundle, registry, MAIN, bundle.main(), subject.root())
    }

    /// Match the bundle entry `key` with `node` as the search root.
    pub fn with_entry(
        bundle: &'a AutomatonBundle,
        key: &str,
        registry: &'a MacroRegistry,
        node: NodeRef<'a>,
    ) -> Option<Self> {
        let automaton = bundle.get(key)?;
        Some(Self::build(bundle, registry, key, automaton, node))
    }

    fn build(
        bundle: &'a AutomatonBundle,
        registry: &'a MacroRegistry,
        entry: &str,
        automaton: &'a Automaton,
        root: NodeRef<'a>,
    ) -> Self {
        Self {
            bundle,
            registry,
            entry: entry.to_string(),
            automaton,
            root,
            stop_at_first: false,
            revisitable: automaton.revisitable_states(),
            visited: HashSet::new(),
            worklist: Vec::new(),
            matches: Vec::new(),
            steps: 0,
            observers: Vec::new(),
        }
    }

    pub fn stop_at_first(mut self, stop: bool) -> Self {
        self.stop_at_first = stop;
        self
    }

    pub fn add_observer(&mut self, observer: Box<dyn MatchObserver + 'a>) {
        self.observers.push(observer);
    }

    /// Steps taken so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Reset the search to its initial configuration. Every declared
    /// wildcard starts unbound unless `initial` says otherwise.
    pub fn start(&mut self, initial: Bindings<'a>) {
        let mut bindings: Bindings<'a> = self
            .automaton
            .named_wildcards()
            .iter()
            .map(|name| (name.clone(), None))
            .collect();
        bindings.extend(initial);

        for observer in &mut self.observers {
            observer.on_start(&self.entry, self.root);
        }
        self.visited.clear();
        self.matches.clear();
        self.steps = 0;
        self.worklist = vec![Configuration {
            state: self.automaton.initial_state(),
            node: self.root,
            stack: Vec::new(),
            bindings,
            trace: Vec::new(),
        }];
    }

    /// Process one configuration. Returns `false` once the search is over.
    pub fn step(&mut self) -> bool {
        let Some(config) = self.worklist.pop() else {
            return false;
        };
        let step = self.steps;
        self.steps += 1;
        for observer in &mut self.observers {
            observer.on_step(step, config.state, config.node);
        }

        if self.automaton.is_final(config.state) {
            let found = Match {
                step,
                bindings: config.bindings,
                trace: config.trace,
            };
            trace!("{}: match at step {step}", self.entry);
            for observer in &mut self.observers {
                observer.on_match(&found);
            }
            self.matches.push(found);
            if self.stop_at_first {
                self.worklist.clear();
                return false;
            }
            return !self.worklist.is_empty();
        }

        if self.revisitable.contains(&config.state) && !self.visited.insert(config.visit_key()) {
            return true;
        }

        let automaton = self.automaton;
        for transition in automaton.transitions_from(config.state) {
            if !config.stack.ends_with(&transition.pop) {
                continue;
            }
            let outcomes = self.evaluate(&transition.condition, config.node, &config.bindings);
            if outcomes.is_empty() {
                continue;
            }
            let Some(next) = self.navigate(config.node, &transition.moves) else {
                continue;
            };

            let mut stack = config.stack[..config.stack.len() - transition.pop.len()].to_vec();
            stack.extend_from_slice(&transition.push);
            let mut trace = config.trace.clone();
            trace.push(Step {
                transition,
                node: config.node,
            });
            for bindings in outcomes {
                self.worklist.push(Configuration {
                    state: transition.target,
                    node: next,
                    stack: stack.clone(),
                    bindings,
                    trace: trace.clone(),
                });
            }
        }
        true
    }

    /// Run from the initial configuration to exhaustion (or the first match).
    pub fn run(self, initial: Bindings<'a>) -> MatchSet<'a> {
        self.run_with_observers(initial).0
    }

    fn run_with_observers(
        mut self,
        initial: Bindings<'a>,
    ) -> (MatchSet<'a>, Vec<Box<dyn MatchObserver + 'a>>) {
        self.start(initial);
        while self.step() {}
        trace!(
            "{}: {} match(es) in {} steps",
            self.entry,
            self.matches.len(),
            self.steps
        );
        (
            MatchSet {
                matches: self.matches,
            },
            self.observers,
        )
    }

    /// Binding outcomes of `condition` at `node`; empty means a dead branch.
    fn evaluate(
        &mut self,
        condition: &MatchCondition,
        node: NodeRef<'a>,
        bindings: &Bindings<'a>,
    ) -> Vec<Bindings<'a>> {
        match condition {
            MatchCondition::Node(test) => {
                if test.accepts(node) {
                    vec![bindings.clone()]
                } else {
                    Vec::new()
                }
            }
            MatchCondition::Named { name } => match bindings.get(name) {
                Some(Some(bound)) if !bound.structurally_eq(node) => Vec::new(),
                Some(Some(_)) => vec![bindings.clone()],
                _ => {
                    let mut bound = bindings.clone();
                    bound.insert(name.clone(), Some(node));
                    vec![bound]
                }
            },
            MatchCondition::Call(target) => {
                call::call_macro(
                    self.bundle,
                    self.registry,
                    target,
                    node,
                    bindings,
                    &mut self.observers,
                )
            }
        }
    }

    /// Apply `moves` in order; `None` if any of them leads nowhere.
    fn navigate(&self, node: NodeRef<'a>, moves: &[Move]) -> Option<NodeRef<'a>> {
        moves.iter().try_fold(node, |node, mv| match mv {
            Move::LeftChild => node.first_child(),
            Move::Parent if node != self.root => node.parent(),
            Move::RightSibling if node != self.root => node.right_sibling(),
            Move::Parent | Move::RightSibling => None,
        })
    }
}

/// Match `bundle` against `subject` from its root.
pub fn find_matches<'a>(
    bundle: &'a AutomatonBundle,
    registry: &'a MacroRegistry,
    subject: &'a Tree,
    stop_at_first: bool,
    initial: Bindings<'a>,
) -> MatchSet<'a> {
    Matcher::new(bundle, registry, subject)
        .stop_at_first(stop_at_first)
        .run(initial)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use proptest::prelude::*;

    use super::*;
    use crate::testutil::{compile_pattern, match_count, registry_with, subject};

    const DEF_ADD_RETURN: &str = r#"
        (file_input
          (stmt (compound_stmt
            (funcdef def (name add)
              (parameters "(" (typedargslist (name x) , (name y)) ")") :
              (block (stmt (simple_stmts
                (simple_stmt (return_stmt return (arith_expr (name x) + (name y))))
                "\n"))))))
          "<EOF>")"#;

    const DEF_ADD_PASS: &str = r#"
        (file_input
          (stmt (compound_stmt
            (funcdef def (name add)
              (parameters "(" (typedargslist (name x) , (name y)) ")") :
              (block (stmt (simple_stmts (simple_stmt (pass_stmt pass)) "\n"))))))
          "<EOF>")"#;

    const DEF_ANY_RETURN: &str = r#"
        (file_input
          (stmt (compound_stmt
            (funcdef def (name ?) (parameters "(" ? ")") :
              (block (stmt (simple_stmts (simple_stmt (return_stmt return ?*)) "\n"))))))
          "<EOF>")"#;

    const INCR: &str = "?#DEFINE Incr | ?i ?v = (number 1)\n\
                        ?#plus_eq (expr_stmt ?i += ?v)\n\
                        ?#plus (expr_stmt ?i = (arith_expr ?i + ?v))\n";

    const ASSIGN: &str = "?#DEFINE Assign &\n\
                          ?#a (expr_stmt (name a) = ?)\n\
                          ?#b (expr_stmt (name b) = ?)\n";

    fn bound_text(m: &Match<'_>, name: &str) -> Option<String> {
        m.binding(name).map(|n| n.to_string())
    }

    #[test]
    fn function_returning_anything() {
        let registry = MacroRegistry::new();
        assert_eq!(match_count(DEF_ANY_RETURN, DEF_ADD_RETURN, &registry), 1);
        assert_eq!(match_count(DEF_ANY_RETURN, DEF_ADD_PASS, &registry), 0);
    }

    #[test]
    fn named_wildcards_must_agree() {
        let registry = MacroRegistry::new();
        let bundle = compile_pattern("(expr_stmt ?x = ?x)", &registry);
        let same = subject("(expr_stmt (name a) = (name a))");
        let matches = find_matches(&bundle, &registry, &same, false, Bindings::new());
        assert_eq!(matches.len(), 1);
        assert_eq!(bound_text(&matches.matches[0], "x").as_deref(), Some("(name a)"));

        let different = subject("(expr_stmt (name a) = (name b))");
        assert!(find_matches(&bundle, &registry, &different, false, Bindings::new()).is_empty());
    }

    #[test]
    fn initial_bindings_constrain_the_search() {
        let registry = MacroRegistry::new();
        let bundle = compile_pattern("(expr_stmt ?x = ?y)", &registry);
        let tree = subject("(expr_stmt (name a) = (name b))");
        let expected = subject("(name b)");
        let other = subject("(name c)");

        let seeded = Bindings::from([("y".to_string(), Some(expected.root()))]);
        assert_eq!(find_matches(&bundle, &registry, &tree, false, seeded).len(), 1);
        let seeded = Bindings::from([("y".to_string(), Some(other.root()))]);
        assert!(find_matches(&bundle, &registry, &tree, false, seeded).is_empty());
    }

    #[test]
    fn repetition_bounds_are_inclusive() {
        let registry = MacroRegistry::new();
        let pattern = r#"(args "(" ?{2,4} ")")"#;
        for n in 1..=5 {
            let items = vec!["a"; n].join(" ");
            let found = match_count(pattern, &format!(r#"(args "(" {items} ")")"#), &registry);
            assert_eq!(found > 0, (2..=4).contains(&n), "{n} items");
        }
    }

    #[test]
    fn open_and_exact_repetition() {
        let registry = MacroRegistry::new();
        for n in 1..=5 {
            let items = vec!["a"; n].join(" ");
            let args = format!(r#"(args "(" {items} ")")"#);
            let at_least = match_count(r#"(args "(" ?{2,} ")")"#, &args, &registry);
            assert_eq!(at_least > 0, n >= 2, "?{{2,}} with {n} items");
            let exactly = match_count(r#"(args "(" ?{3} ")")"#, &args, &registry);
            assert_eq!(exactly > 0, n == 3, "?{{3}} with {n} items");
        }
    }

    #[test]
    fn stop_at_first_reports_one_match() {
        let registry = MacroRegistry::new();
        let bundle = compile_pattern("(block (stmt ?x))", &registry);
        let tree = subject("(block (stmt a) (stmt b) (stmt c))");
        let all = find_matches(&bundle, &registry, &tree, false, Bindings::new());
        assert_eq!(all.len(), 3);
        let first = find_matches(&bundle, &registry, &tree, true, Bindings::new());
        assert_eq!(first.len(), 1);
        assert_eq!(bound_text(&first.matches[0], "x").as_deref(), Some("a"));
    }

    #[test]
    fn search_finds_nested_patterns() {
        let registry = MacroRegistry::new();
        let pattern = r#"(file_input (?: (return_stmt return ?value)) "<EOF>")"#;
        let bundle = compile_pattern(pattern, &registry);
        let tree = subject(DEF_ADD_RETURN);
        let matches = find_matches(&bundle, &registry, &tree, false, Bindings::new());
        assert_eq!(matches.len(), 1);
        assert_eq!(
            bound_text(&matches.matches[0], "value").as_deref(),
            Some("(arith_expr (name x) + (name y))")
        );
        assert_eq!(match_count(pattern, DEF_ADD_PASS, &registry), 0);
    }

    #[test]
    fn search_depth_is_limited() {
        let registry = MacroRegistry::new();
        let tree = "(block (if_stmt if (test x) (suite (return_stmt return x))))";
        assert_eq!(match_count("(block (?:1 (return_stmt return ?)))", tree, &registry), 0);
        assert_eq!(match_count("(block (?:2 (return_stmt return ?)))", tree, &registry), 1);
        assert_eq!(match_count("(block (?: (return_stmt return ?)))", tree, &registry), 1);
    }

    #[test]
    fn search_keeps_hits_that_bind_nothing() {
        let registry = MacroRegistry::new();
        let tree = "(block (if_stmt (suite (return_stmt return a)) (suite (return_stmt return b))))";
        assert_eq!(match_count("(block (?: (return_stmt return ?)))", tree, &registry), 2);
        assert_eq!(match_count("(block (?: (return_stmt return ?v)))", tree, &registry), 2);
    }

    #[test]
    fn any_of_macro_matches_either_transformation() {
        let registry = registry_with(INCR);
        let pattern = "(block (?@Incr ?n ?k))";
        let bundle = compile_pattern(pattern, &registry);

        // `?k` is unbound at the call, so `?v` starts from its default.
        let tree = subject("(block (expr_stmt (name i) += (number 1)))");
        let matches = find_matches(&bundle, &registry, &tree, false, Bindings::new());
        assert_eq!(matches.len(), 1);
        assert_eq!(bound_text(&matches.matches[0], "n").as_deref(), Some("(name i)"));
        assert_eq!(bound_text(&matches.matches[0], "k").as_deref(), Some("(number 1)"));

        let spelled_out = "(block (expr_stmt (name i) = (arith_expr (name i) + (number 1))))";
        assert_eq!(match_count(pattern, spelled_out, &registry), 1);
        let unrelated = "(block (expr_stmt (name i) = (arith_expr (name j) + (number 1))))";
        assert_eq!(match_count(pattern, unrelated, &registry), 0);
    }

    #[test]
    fn unbound_arguments_fall_back_to_defaults() {
        let registry = registry_with(INCR);
        let pattern = "(block (?@Incr ?n ?k))";
        let by_two = "(block (expr_stmt (name i) += (number 2)))";
        assert_eq!(match_count(pattern, by_two, &registry), 0);

        // A bound argument wins over the default.
        let pattern = "(block (expr_stmt ?k = (number 2)) (?@Incr ?n ?k))";
        let by_step = "(block (expr_stmt (name step) = (number 2)) (expr_stmt (name i) += (name step)))";
        assert_eq!(match_count(pattern, by_step, &registry), 1);
    }

    #[test]
    fn macros_can_call_macros() {
        let registry = registry_with(&format!(
            "{INCR}?#DEFINE Loop | ?v\n?#while (while_stmt while ?v : (block (?@Incr ?v)))\n"
        ));
        let pattern = "(file_input (?@Loop ?x))";
        let good = "(file_input (while_stmt while (name i) : (block (expr_stmt (name i) += (number 1)))))";
        let bad = "(file_input (while_stmt while (name i) : (block (expr_stmt (name j) += (number 1)))))";

        let bundle = compile_pattern(pattern, &registry);
        let tree = subject(good);
        let matches = find_matches(&bundle, &registry, &tree, false, Bindings::new());
        assert_eq!(matches.len(), 1);
        assert_eq!(bound_text(&matches.matches[0], "x").as_deref(), Some("(name i)"));
        assert_eq!(match_count(pattern, bad, &registry), 0);
    }

    #[test]
    fn macro_defaults_fill_omitted_arguments() {
        let registry = registry_with(INCR);
        let pattern = "(block (?@Incr ?n))";
        assert_eq!(
            match_count(pattern, "(block (expr_stmt (name i) += (number 1)))", &registry),
            1
        );
        assert_eq!(
            match_count(pattern, "(block (expr_stmt (name i) += (number 2)))", &registry),
            0
        );
    }

    #[test]
    fn caller_bindings_flow_into_macros() {
        let registry = registry_with(INCR);
        let pattern = "(block (expr_stmt ?n = (number 0)) (?@Incr ?n ?k))";
        let good = "(block (expr_stmt (name i) = (number 0)) (expr_stmt (name i) += (number 1)))";
        let bad = "(block (expr_stmt (name i) = (number 0)) (expr_stmt (name j) += (number 1)))";
        assert_eq!(match_count(pattern, good, &registry), 1);
        assert_eq!(match_count(pattern, bad, &registry), 0);
    }

    #[test]
    fn missing_macro_at_match_time_is_a_dead_branch() {
        let registry = registry_with(INCR);
        let bundle = compile_pattern("(block (?@Incr ?n ?k))", &registry);
        let tree = subject("(block (expr_stmt (name i) += (number 2)))");
        let empty = MacroRegistry::new();
        assert!(find_matches(&bundle, &empty, &tree, false, Bindings::new()).is_empty());
    }

    #[test]
    fn all_of_macro_ignores_order() {
        let registry = registry_with(ASSIGN);
        let pattern = r#"(file_input ?@Assign "<EOF>")"#;
        let a_then_b = r#"(file_input (expr_stmt (name a) = (number 1)) (expr_stmt (name b) = (number 2)) "<EOF>")"#;
        let b_then_a = r#"(file_input (expr_stmt (name b) = (number 2)) (expr_stmt (name a) = (number 1)) "<EOF>")"#;
        let only_a = r#"(file_input (expr_stmt (name a) = (number 1)) "<EOF>")"#;
        assert!(match_count(pattern, a_then_b, &registry) > 0);
        assert!(match_count(pattern, b_then_a, &registry) > 0);
        assert_eq!(match_count(pattern, only_a, &registry), 0);
    }

    #[test]
    fn navigation_stops_at_the_search_root() {
        let registry = MacroRegistry::new();
        let tree = subject("(a (b c) d)");
        let bundle = compile_pattern("(b c)", &registry);
        let inner = tree.root().child(0).unwrap();
        let matcher = Matcher::with_entry(&bundle, MAIN, &registry, inner).unwrap();
        assert!(matcher.navigate(inner, &[Move::RightSibling]).is_none());
        assert!(matcher.navigate(inner, &[Move::Parent]).is_none());
        let c = inner.child(0).unwrap();
        assert_eq!(matcher.navigate(inner, &[Move::LeftChild]), Some(c));
        assert_eq!(matcher.navigate(c, &[Move::Parent, Move::LeftChild]), Some(c));
        assert_eq!(matcher.run(Bindings::new()).len(), 1);
        assert!(Matcher::with_entry(&bundle, "Nope::t", &registry, inner).is_none());
    }

    #[derive(Default)]
    struct Counts {
        starts: usize,
        steps: usize,
        matches: usize,
    }

    struct Counting(Rc<RefCell<Counts>>);

    impl MatchObserver for Counting {
        fn on_start(&mut self, _entry: &str, _root: NodeRef<'_>) {
            self.0.borrow_mut().starts += 1;
        }

        fn on_step(&mut self, _step: usize, _state: StateId, _node: NodeRef<'_>) {
            self.0.borrow_mut().steps += 1;
        }

        fn on_match(&mut self, _found: &Match<'_>) {
            self.0.borrow_mut().matches += 1;
        }
    }

    #[test]
    fn observers_see_every_step() {
        let registry = MacroRegistry::new();
        let bundle = compile_pattern("(block (stmt ?x))", &registry);
        let tree = subject("(block (stmt a) (stmt b))");
        let counts = Rc::new(RefCell::new(Counts::default()));
        let mut matcher = Matcher::new(&bundle, &registry, &tree);
        matcher.add_observer(Box::new(Counting(Rc::clone(&counts))));
        let matches = matcher.run(Bindings::new());

        let counts = counts.borrow();
        assert_eq!(counts.starts, 1);
        assert_eq!(counts.matches, 2);
        assert_eq!(matches.len(), 2);
        assert!(counts.steps >= matches.iter().map(|m| m.step()).max().unwrap_or(0));
    }

    #[test]
    fn observers_follow_macro_calls() {
        let registry = registry_with(INCR);
        let bundle = compile_pattern("(block (?@Incr ?n))", &registry);
        let tree = subject("(block (expr_stmt (name i) += (number 1)))");
        let counts = Rc::new(RefCell::new(Counts::default()));
        let mut matcher = Matcher::new(&bundle, &registry, &tree);
        matcher.add_observer(Box::new(Counting(Rc::clone(&counts))));
        assert_eq!(matcher.run(Bindings::new()).len(), 1);

        // One start for the pattern and one per transformation tried.
        let counts = counts.borrow();
        assert_eq!(counts.starts, 3);
        assert_eq!(counts.matches, 2);
    }

    #[test]
    fn trace_records_fired_transitions() {
        let registry = MacroRegistry::new();
        let bundle = compile_pattern("(pair a b)", &registry);
        let tree = subject("(pair a b)");
        let matches = find_matches(&bundle, &registry, &tree, false, Bindings::new());
        let found = matches.first().unwrap();
        let tested: Vec<_> = found.trace().iter().map(|s| s.node.to_string()).collect();
        assert_eq!(tested, vec!["(pair a b)", "a", "b"]);
        assert!(found.bindings().is_empty());
    }

    fn arb_subtree() -> impl Strategy<Value = String> {
        let leaf = prop::sample::select(vec!["a", "b", "x", "+", "="]).prop_map(str::to_string);
        leaf.prop_recursive(3, 24, 4, |inner| {
            (
                prop::sample::select(vec!["expr", "stmt", "args", "call"]),
                prop::collection::vec(inner, 1..4),
            )
                .prop_map(|(kind, children)| format!("({kind} {})", children.join(" ")))
        })
    }

    fn arb_tree() -> impl Strategy<Value = String> {
        (
            prop::sample::select(vec!["expr", "stmt", "args", "call"]),
            prop::collection::vec(arb_subtree(), 1..4),
        )
            .prop_map(|(kind, children)| format!("({kind} {})", children.join(" ")))
    }

    proptest! {
        #[test]
        fn plain_trees_match_themselves_once(src in arb_tree()) {
            let registry = MacroRegistry::new();
            let bundle = compile_pattern(&src, &registry);
            let tree = subject(&src);
            let matches = find_matches(&bundle, &registry, &tree, false, Bindings::new());
            prop_assert_eq!(matches.len(), 1);
            prop_assert!(matches.first().unwrap().bindings().is_empty());
        }

        #[test]
        fn different_plain_trees_do_not_match(a in arb_tree(), b in arb_tree()) {
            prop_assume!(a != b);
            let registry = MacroRegistry::new();
            prop_assert_eq!(match_count(&a, &b, &registry), 0);
        }
    }
}
