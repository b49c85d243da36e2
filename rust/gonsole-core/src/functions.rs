//! User-declared functions and the subset reachable from the emitted code.

use std::collections::HashMap;

use tracing::debug;

use crate::fragment::Fragment;
use crate::registry::{DeclarationKind, FragmentId, Owner, SharedRegistry};

#[derive(Debug)]
pub struct FunctionTracker {
    registry: SharedRegistry,
    bodies: HashMap<FragmentId, Fragment>,
}

impl FunctionTracker {
    pub fn new(registry: SharedRegistry) -> Self {
        Self {
            registry,
            bodies: HashMap::new(),
        }
    }

    /// Store a function declaration and return its name. A fragment whose
    /// opener carries no function name is ignored.
    ///
    /// The body is scanned right away so functions it calls are marked live
    /// for the current turn.
    pub fn declare(&mut self, fragment: Fragment) -> Option<String> {
        let name = fragment.function_name()?.to_string();
        let mut registry = self.registry.borrow_mut();
        let id = registry.allocate_id();
        let previous = registry.record(DeclarationKind::Function, &name, Owner::Fragment(id));
        if let Some(old) = previous.and_then(|decl| {
            (decl.kind == DeclarationKind::Function)
                .then_some(decl.owner)
                .and_then(|owner| owner.fragment_id())
        }) {
            self.bodies.remove(&old);
        }

        let callees: Vec<String> = registry
            .all_declared(DeclarationKind::Function)
            .map(|(callee, _)| callee.to_string())
            .filter(|callee| *callee != name && fragment.references(callee))
            .collect();
        for callee in callees {
            registry.mark_live(&callee, DeclarationKind::Function);
        }
        debug!(%id, name = %name, "function declared");

        self.bodies.insert(id, fragment);
        Some(name)
    }

    pub fn len(&self) -> usize {
        self.registry.borrow().count(DeclarationKind::Function)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Declared function names, in declaration order.
    pub fn declared(&self) -> Vec<String> {
        self.registry
            .borrow()
            .all_declared(DeclarationKind::Function)
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Mark live every function referenced by `fragments`, then every
    /// function referenced by a live function's body, until nothing changes.
    pub fn scan_liveness<'a, I>(&self, fragments: I)
    where
        I: IntoIterator<Item = &'a Fragment>,
    {
        let mut worklist: Vec<&Fragment> = fragments.into_iter().collect();
        // Bodies of functions that were already live also count as users.
        worklist.extend(self.live_bodies());

        let mut registry = self.registry.borrow_mut();
        while let Some(fragment) = worklist.pop() {
            let found: Vec<(String, Option<FragmentId>)> = registry
                .all_declared(DeclarationKind::Function)
                .filter(|(name, _)| !registry.is_live(DeclarationKind::Function, name))
                .filter(|(name, _)| fragment.references(name))
                .map(|(name, owner)| (name.to_string(), owner.fragment_id()))
                .collect();
            for (name, owner) in found {
                if registry.mark_live(&name, DeclarationKind::Function) {
                    debug!(name = %name, "function live");
                    if let Some(body) = owner.and_then(|id| self.bodies.get(&id)) {
                        worklist.push(body);
                    }
                }
            }
        }
    }

    /// Bodies of live functions, in declaration order.
    pub fn live_bodies(&self) -> Vec<&Fragment> {
        let registry = self.registry.borrow();
        let ids: Vec<FragmentId> = registry
            .all_declared(DeclarationKind::Function)
            .filter(|(name, _)| registry.is_live(DeclarationKind::Function, name))
            .filter_map(|(_, owner)| owner.fragment_id())
            .collect();
        ids.iter().filter_map(|id| self.bodies.get(id)).collect()
    }

    /// The function block: live bodies separated by a blank line.
    pub fn render(&self) -> String {
        self.live_bodies()
            .into_iter()
            .map(|body| body.render(0))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DeclarationRegistry;

    fn function(opener: &str, body: &[&str]) -> Fragment {
        let mut fragment = Fragment::new(opener);
        for line in body {
            fragment.append(Fragment::new(*line));
        }
        fragment.append("}");
        fragment
    }

    fn live(registry: &SharedRegistry) -> Vec<String> {
        let registry = registry.borrow();
        let mut names: Vec<String> = registry
            .live_set(DeclarationKind::Function)
            .into_iter()
            .map(str::to_string)
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_declare_extracts_name() {
        let registry = DeclarationRegistry::shared();
        let mut tracker = FunctionTracker::new(registry);

        let plain = tracker.declare(function("func add(a, b int) int {", &["return a + b"]));
        let method = tracker.declare(function("func (c *Counter) Inc() {", &["c.n++"]));
        let nameless = tracker.declare(function("func() {", &[]));

        assert_eq!(plain.as_deref(), Some("add"));
        assert_eq!(method.as_deref(), Some("Inc"));
        assert_eq!(nameless, None);
        assert_eq!(tracker.declared(), vec!["add", "Inc"]);
    }

    #[test]
    fn test_declaring_caller_marks_callee_live() {
        let registry = DeclarationRegistry::shared();
        let mut tracker = FunctionTracker::new(registry.clone());
        tracker.declare(function("func helper() int {", &["return 1"]));
        tracker.declare(function("func outer() int {", &["return helper() + 1"]));

        assert_eq!(live(&registry), vec!["helper"]);
    }

    #[test]
    fn test_liveness_follows_call_chain() {
        let registry = DeclarationRegistry::shared();
        let mut tracker = FunctionTracker::new(registry.clone());
        tracker.declare(function("func leaf() int {", &["return 1"]));
        tracker.declare(function("func middle() int {", &["return leaf()"]));
        tracker.declare(function("func top() int {", &["return middle()"]));
        tracker.declare(function("func unused() {", &[]));
        registry.borrow_mut().reset_liveness();

        tracker.scan_liveness([&Fragment::new("fmt.Println(top())")]);

        assert_eq!(live(&registry), vec!["leaf", "middle", "top"]);
    }

    #[test]
    fn test_recursive_function_terminates() {
        let registry = DeclarationRegistry::shared();
        let mut tracker = FunctionTracker::new(registry.clone());
        tracker.declare(function(
            "func fib(n int) int {",
            &["if n < 2 { return n }", "return fib(n-1) + fib(n-2)"],
        ));

        tracker.scan_liveness([&Fragment::new("fmt.Println(fib(10))")]);

        assert_eq!(live(&registry), vec!["fib"]);
    }

    #[test]
    fn test_redeclaration_replaces_body() {
        let registry = DeclarationRegistry::shared();
        let mut tracker = FunctionTracker::new(registry.clone());
        tracker.declare(function("func greet() {", &["fmt.Println(1)"]));
        tracker.declare(function("func greet() {", &["fmt.Println(2)"]));
        tracker.scan_liveness([&Fragment::new("greet()")]);

        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.render(), "func greet() {\n    fmt.Println(2)\n}");
    }

    #[test]
    fn test_function_shadows_variable() {
        let registry = DeclarationRegistry::shared();
        let mut variables = crate::variables::VariableTracker::new(registry.clone());
        let mut functions = FunctionTracker::new(registry.clone());

        variables.add(Fragment::new("a := 1"));
        functions.declare(function("func a(i int) {", &["fmt.Println(i)"]));
        variables.add(Fragment::new("a(2)"));
        functions.scan_liveness(variables.emitted());

        let registry = registry.borrow();
        assert!(registry.live_set(DeclarationKind::Variable).is_empty());
        assert_eq!(registry.live_set(DeclarationKind::Function), vec!["a"]);
    }

    #[test]
    fn test_render_separates_bodies_with_blank_line() {
        let registry = DeclarationRegistry::shared();
        let mut tracker = FunctionTracker::new(registry.clone());
        tracker.declare(function("func one() int {", &["return 1"]));
        tracker.declare(function("func two() int {", &["return 2"]));
        registry.borrow_mut().reset_liveness();
        assert!(tracker.render().is_empty());

        tracker.scan_liveness([&Fragment::new("fmt.Println(one(), two())")]);

        assert_eq!(
            tracker.render(),
            "func one() int {\n    return 1\n}\n\nfunc two() int {\n    return 2\n}"
        );
    }
}
