//! Macro calls: run a transformation's automaton as a nested search.

use log::{trace, warn};

use super::{Bindings, MatchObserver, Matcher};
use crate::macros::MacroRegistry;
use crate::pda::{AutomatonBundle, CallTarget};
use crate::tree::{NodeRef, Tree};

/// Match `target` at `node` and return one caller binding map per callee
/// match.
///
/// Formals are seeded positionally from the caller's arguments. A formal
/// whose argument is omitted or still unbound starts from its declared
/// default, if any. Whatever the callee binds to a formal is copied back onto
/// the matching caller argument.
///
/// The caller's observers follow the nested search and are handed back
/// afterwards.
pub(super) fn call_macro<'a>(
    bundle: &'a AutomatonBundle,
    registry: &'a MacroRegistry,
    target: &CallTarget,
    node: NodeRef<'a>,
    bindings: &Bindings<'a>,
    observers: &mut Vec<Box<dyn MatchObserver + 'a>>,
) -> Vec<Bindings<'a>> {
    let key = target.qualified_name();
    let Some(mac) = registry.get(&target.macro_name) else {
        warn!("macro {} is not registered", target.macro_name);
        return Vec::new();
    };
    if mac.transformation(&target.transformation).is_none() {
        warn!("macro {} has no transformation {}", mac.name(), target.transformation);
        return Vec::new();
    }

    let mut initial = Bindings::new();
    for (i, param) in mac.params().iter().enumerate() {
        let seed = target
            .args
            .get(i)
            .and_then(|arg| bindings.get(arg).copied().flatten())
            .or_else(|| param.default().map(Tree::root));
        initial.insert(param.name().to_string(), seed);
    }

    let Some(mut matcher) = Matcher::with_entry(bundle, &key, registry, node) else {
        warn!("automaton for {key} is missing from the compiled pattern");
        return Vec::new();
    };
    trace!("call {key} at {node:?}");
    matcher.observers = std::mem::take(observers);
    let (matches, returned) = matcher.stop_at_first(false).run_with_observers(initial);
    *observers = returned;

    matches
        .into_iter()
        .map(|found| {
            let mut merged = bindings.clone();
            for (param, arg) in mac.params().iter().zip(&target.args) {
                if let Some(value) = found.binding(param.name()) {
                    merged.insert(arg.clone(), Some(value));
                }
            }
            merged
        })
        .collect()
}
