use crate::compiler::compile;
use crate::macros::MacroRegistry;
use crate::matcher::{Bindings, find_matches};
use crate::notation::{parse_pattern, parse_subject};
use crate::pda::AutomatonBundle;
use crate::tree::Tree;

/// Parse a subject tree, panicking with the parse error on bad input.
pub fn subject(source: &str) -> Tree {
    parse_subject(source).unwrap_or_else(|e| panic!("bad subject {source:?}: {e}"))
}

pub fn pattern(source: &str) -> Tree {
    parse_pattern(source).unwrap_or_else(|e| panic!("bad pattern {source:?}: {e}"))
}

/// Parse and compile a pattern with the registry's own options.
pub fn compile_pattern(source: &str, registry: &MacroRegistry) -> AutomatonBundle {
    compile(&pattern(source), registry, registry.options())
        .unwrap_or_else(|e| panic!("pattern {source:?} does not compile: {e}"))
}

/// A registry loaded from `?#DEFINE` definition text.
pub fn registry_with(definitions: &str) -> MacroRegistry {
    let mut registry = MacroRegistry::new();
    if let Err(e) = registry.load_definitions(definitions) {
        panic!("bad macro definitions: {e}");
    }
    registry
}

/// Number of matches of `pattern_src` in `subject_src`, searching exhaustively.
pub fn match_count(pattern_src: &str, subject_src: &str, registry: &MacroRegistry) -> usize {
    let bundle = compile_pattern(pattern_src, registry);
    let tree = subject(subject_src);
    find_matches(&bundle, registry, &tree, false, Bindings::new()).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_count_counts_positions() {
        let registry = MacroRegistry::new();
        assert_eq!(match_count("(block (stmt ?))", "(block (stmt a) (stmt b))", &registry), 2);
        assert_eq!(match_count("(block (stmt c))", "(block (stmt a) (stmt b))", &registry), 0);
    }

    #[test]
    fn registry_with_loads_every_macro() {
        let registry = registry_with("?#DEFINE A | ?x\n?#t (a ?x)\n?#DEFINE B & ?y\n?#u (b ?y)\n");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    #[should_panic(expected = "bad subject")]
    fn subject_rejects_wildcards() {
        subject("(a ?x)");
    }

    #[test]
    #[should_panic(expected = "does not compile")]
    fn compile_pattern_reports_errors() {
        compile_pattern("(a ?@Missing)", &MacroRegistry::new());
    }
}
