//! Statement history and the liveness resolution that decides which earlier
//! statements are still needed.
//!
//! Go rejects unused variables, so replaying the whole history would fail as
//! soon as the user declares something they do not use yet. Instead, every
//! time a use statement arrives we walk backwards from it:
//!
//! 1. seed with the declared variables its tokens reference;
//! 2. for each newly visited variable, tokenize the fragment that declared
//!    it and add the other variables referenced there;
//! 3. stop when a pass finds nothing new.
//!
//! The resulting live set selects the emitted fragments: declarations whose
//! own identifier is live, earlier use statements that touch a live variable
//! declared at or before them, and the statement just typed.

use std::collections::HashSet;

use tracing::debug;

use crate::fragment::Fragment;
use crate::registry::{Declaration, DeclarationKind, FragmentId, Owner, SharedRegistry};

#[derive(Debug)]
struct Entry {
    id: FragmentId,
    fragment: Fragment,
    declaration: bool,
    /// Tracker state before this entry was added, for `rollback`.
    undo: Undo,
}

/// The pinned statement is always the newest history entry, so the emission
/// set it selected can be recomputed on rollback instead of being stored.
#[derive(Debug)]
struct Undo {
    pinned: Option<FragmentId>,
    displaced: Vec<(String, Option<Declaration>)>,
}

#[derive(Debug)]
pub struct VariableTracker {
    registry: SharedRegistry,
    history: Vec<Entry>,
    /// The use statement typed this turn; always emitted.
    pinned: Option<FragmentId>,
    /// Emitted fragments, in history order.
    emission: Vec<FragmentId>,
}

impl VariableTracker {
    pub fn new(registry: SharedRegistry) -> Self {
        Self {
            registry,
            history: Vec::new(),
            pinned: None,
            emission: Vec::new(),
        }
    }

    /// Append a fragment to the history.
    ///
    /// Declarations only register their identifiers. Any other fragment is
    /// pinned and the emission set is recomputed from scratch.
    pub fn add(&mut self, fragment: Fragment) -> FragmentId {
        let id = self.registry.borrow_mut().allocate_id();
        let mut undo = Undo {
            pinned: self.pinned.take(),
            displaced: Vec::new(),
        };
        self.emission.clear();

        let declaration = fragment.is_declaration();
        if declaration {
            let names = fragment.declared_identifiers();
            let mut registry = self.registry.borrow_mut();
            for name in names {
                let previous = registry.record(DeclarationKind::Variable, &name, Owner::Fragment(id));
                debug!(%id, name = %name, "variable declared");
                undo.displaced.push((name, previous));
            }
        }

        self.history.push(Entry {
            id,
            fragment,
            declaration,
            undo,
        });
        if !declaration {
            self.pinned = Some(id);
            let live = self.resolve_live(id);
            {
                let mut registry = self.registry.borrow_mut();
                for name in &live {
                    registry.mark_live(name, DeclarationKind::Variable);
                }
            }
            self.emission = self.select_emission(id, &live);
        }
        id
    }

    /// Remove the most recently added fragment, restoring history,
    /// declarations and the emission set to what they were before it was
    /// added.
    pub fn rollback(&mut self) -> Option<Fragment> {
        let entry = self.history.pop()?;
        {
            let mut registry = self.registry.borrow_mut();
            for (name, previous) in entry.undo.displaced.into_iter().rev() {
                registry.restore(&name, previous);
            }
        }
        self.pinned = entry.undo.pinned;
        self.emission = match self.pinned {
            Some(pinned) => {
                let live = self.resolve_live(pinned);
                self.select_emission(pinned, &live)
            }
            None => Vec::new(),
        };
        debug!(id = %entry.id, "rolled back");
        Some(entry.fragment)
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn history(&self) -> impl Iterator<Item = &Fragment> {
        self.history.iter().map(|entry| &entry.fragment)
    }

    pub fn pinned(&self) -> Option<&Fragment> {
        let pinned = self.pinned?;
        self.fragment(pinned)
    }

    pub fn fragment(&self, id: FragmentId) -> Option<&Fragment> {
        self.history
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| &entry.fragment)
    }

    /// Fragments selected for the next program, in history order.
    pub fn emitted(&self) -> Vec<&Fragment> {
        self.history
            .iter()
            .filter(|entry| self.emission.contains(&entry.id))
            .map(|entry| &entry.fragment)
            .collect()
    }

    /// The statement block: emitted fragments indented one level.
    pub fn render(&self) -> String {
        self.emitted()
            .into_iter()
            .map(|fragment| fragment.render(1))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Variables declared at the moment, with their owning fragment.
    fn declared(&self) -> Vec<(String, FragmentId)> {
        self.registry
            .borrow()
            .all_declared(DeclarationKind::Variable)
            .filter_map(|(name, owner)| owner.fragment_id().map(|id| (name.to_string(), id)))
            .collect()
    }

    /// Walk back from the pinned fragment to every variable it depends on.
    fn resolve_live(&self, pinned: FragmentId) -> HashSet<String> {
        let declared = self.declared();
        let mut visited: HashSet<String> = HashSet::new();
        let mut frontier = match self.fragment(pinned) {
            Some(fragment) => referenced(fragment, &declared, &visited),
            None => Vec::new(),
        };
        while !frontier.is_empty() {
            let mut next: Vec<String> = Vec::new();
            for name in frontier {
                if !visited.insert(name.clone()) {
                    continue;
                }
                let owner = declared
                    .iter()
                    .find(|(declared_name, _)| *declared_name == name)
                    .and_then(|(_, id)| self.fragment(*id));
                if let Some(owner) = owner {
                    for found in referenced(owner, &declared, &visited) {
                        if !next.contains(&found) {
                            next.push(found);
                        }
                    }
                }
            }
            frontier = next;
        }
        visited
    }

    fn select_emission(&self, pinned: FragmentId, live: &HashSet<String>) -> Vec<FragmentId> {
        let declared = self.declared();
        let emission: Vec<FragmentId> = self
            .history
            .iter()
            .filter(|entry| self.needs_emit(entry, pinned, &declared, live))
            .map(|entry| entry.id)
            .collect();
        debug!(
            live = ?live,
            emitted = emission.len(),
            history = self.history.len(),
            "liveness resolved"
        );
        emission
    }

    fn needs_emit(
        &self,
        entry: &Entry,
        pinned: FragmentId,
        declared: &[(String, FragmentId)],
        live: &HashSet<String>,
    ) -> bool {
        if entry.id == pinned {
            return true;
        }
        if entry.declaration {
            return entry.fragment.declared_identifiers().iter().any(|name| {
                live.contains(name)
                    && declared
                        .iter()
                        .any(|(declared_name, owner)| declared_name == name && *owner == entry.id)
            });
        }
        // Only declarations at or before this statement are visible to it.
        declared.iter().any(|(name, owner)| {
            *owner <= entry.id && live.contains(name) && entry.fragment.references(name)
        })
    }
}

/// Declared names referenced by `fragment` and not yet visited.
fn referenced(
    fragment: &Fragment,
    declared: &[(String, FragmentId)],
    visited: &HashSet<String>,
) -> Vec<String> {
    let tokens = fragment.tokens();
    declared
        .iter()
        .filter(|(name, _)| !visited.contains(name))
        .filter(|(name, _)| {
            tokens
                .iter()
                .any(|token| crate::tokenizer::references(token, name))
        })
        .map(|(name, _)| name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DeclarationRegistry;

    fn tracker() -> (SharedRegistry, VariableTracker) {
        let registry = DeclarationRegistry::shared();
        let tracker = VariableTracker::new(registry.clone());
        (registry, tracker)
    }

    fn add(tracker: &mut VariableTracker, line: &str) -> FragmentId {
        tracker.add(Fragment::new(line))
    }

    fn emitted(tracker: &VariableTracker) -> Vec<String> {
        tracker
            .emitted()
            .into_iter()
            .map(|fragment| fragment.opener().to_string())
            .collect()
    }

    #[test]
    fn test_declaration_registers_without_emitting() {
        let (registry, mut tracker) = tracker();
        let id = add(&mut tracker, "var a int64");

        assert_eq!(
            registry.borrow().owner(DeclarationKind::Variable, "a"),
            Some(&Owner::Fragment(id))
        );
        assert!(tracker.pinned().is_none());
        assert!(tracker.render().is_empty());
    }

    #[test]
    fn test_use_pins_statement_and_marks_declaration_live() {
        let (registry, mut tracker) = tracker();
        add(&mut tracker, "a := 1");
        add(&mut tracker, "fmt.Println(a)");

        assert_eq!(emitted(&tracker), vec!["a := 1", "fmt.Println(a)"]);
        assert!(registry.borrow().is_live(DeclarationKind::Variable, "a"));
    }

    #[test]
    fn test_liveness_is_transitive_and_skips_unused() {
        let (registry, mut tracker) = tracker();
        add(&mut tracker, "c := 2");
        add(&mut tracker, "a := 1");
        add(&mut tracker, "b := a + 1");
        add(&mut tracker, "fmt.Println(b)");

        assert_eq!(
            emitted(&tracker),
            vec!["a := 1", "b := a + 1", "fmt.Println(b)"]
        );
        let registry = registry.borrow();
        let mut live = registry.live_set(DeclarationKind::Variable);
        live.sort();
        assert_eq!(live, vec!["a", "b"]);
    }

    #[test]
    fn test_statement_without_references_is_still_emitted() {
        let (_, mut tracker) = tracker();
        add(&mut tracker, "x := 1");
        add(&mut tracker, r#"fmt.Println("hi")"#);

        assert_eq!(emitted(&tracker), vec![r#"fmt.Println("hi")"#]);
    }

    #[test]
    fn test_earlier_mutations_are_replayed() {
        let (_, mut tracker) = tracker();
        add(&mut tracker, "a := 1");
        add(&mut tracker, "a++");
        add(&mut tracker, "fmt.Println(a)");

        assert_eq!(emitted(&tracker), vec!["a := 1", "a++", "fmt.Println(a)"]);
    }

    #[test]
    fn test_redeclaration_emits_only_latest_owner() {
        let (_, mut tracker) = tracker();
        add(&mut tracker, "a := 1");
        add(&mut tracker, r#"a := "two""#);
        add(&mut tracker, "fmt.Println(a)");

        assert_eq!(emitted(&tracker), vec![r#"a := "two""#, "fmt.Println(a)"]);
    }

    #[test]
    fn test_use_before_redeclaration_is_not_replayed() {
        let (_, mut tracker) = tracker();
        add(&mut tracker, "a := 1");
        add(&mut tracker, "fmt.Println(a)");
        add(&mut tracker, "var a string");
        add(&mut tracker, "a = \"x\"");

        // The first println saw the old `a`; the new owner comes after it.
        assert_eq!(emitted(&tracker), vec!["var a string", "a = \"x\""]);
    }

    #[test]
    fn test_rollback_restores_previous_state() {
        let (registry, mut tracker) = tracker();
        let first = add(&mut tracker, "a := 1");
        add(&mut tracker, "fmt.Println(a)");
        let before_render = tracker.render();
        let before_len = tracker.len();

        add(&mut tracker, "a := undefinedThing");
        add(&mut tracker, "fmt.Println(a, b)");
        tracker.rollback();

        assert_eq!(tracker.len(), before_len + 1);
        tracker.rollback();
        assert_eq!(tracker.len(), before_len);
        assert_eq!(tracker.render(), before_render);
        assert_eq!(
            registry.borrow().owner(DeclarationKind::Variable, "a"),
            Some(&Owner::Fragment(first))
        );
    }

    #[test]
    fn test_add_then_rollback_is_identity() {
        let (registry, mut tracker) = tracker();
        add(&mut tracker, "a := 1");
        add(&mut tracker, "b := 2");
        add(&mut tracker, "fmt.Println(a)");
        let history: Vec<Fragment> = tracker.history().cloned().collect();
        let render = tracker.render();
        let declared = registry.borrow().count(DeclarationKind::Variable);

        add(&mut tracker, "fmt.Println(b)");
        let removed = tracker.rollback();

        assert_eq!(removed, Some(Fragment::new("fmt.Println(b)")));
        assert_eq!(tracker.history().cloned().collect::<Vec<_>>(), history);
        assert_eq!(tracker.render(), render);
        assert_eq!(registry.borrow().count(DeclarationKind::Variable), declared);
    }

    #[test]
    fn test_rollback_recomputes_emission_without_marking() {
        let (registry, mut tracker) = tracker();
        add(&mut tracker, "a := 1");
        add(&mut tracker, "fmt.Println(a)");
        add(&mut tracker, "a++");
        registry.borrow_mut().reset_liveness();

        tracker.rollback();

        assert_eq!(emitted(&tracker), vec!["a := 1", "fmt.Println(a)"]);
        assert!(!registry.borrow().has_live());

        add(&mut tracker, "b := a");
        assert!(tracker.render().is_empty());
        tracker.rollback();
        assert_eq!(emitted(&tracker), vec!["a := 1", "fmt.Println(a)"]);
    }

    #[test]
    fn test_rollback_on_empty_history() {
        let (_, mut tracker) = tracker();
        assert!(tracker.rollback().is_none());
    }

    #[test]
    fn test_render_is_idempotent_and_indented() {
        let (_, mut tracker) = tracker();
        add(&mut tracker, "a := 1");
        let mut block = Fragment::new("if a > 0 {");
        block.append(Fragment::new("fmt.Println(a)"));
        block.append("}");
        tracker.add(block);

        let first = tracker.render();
        assert_eq!(first, "    a := 1\n    if a > 0 {\n        fmt.Println(a)\n    }");
        assert_eq!(tracker.render(), first);
    }
}
