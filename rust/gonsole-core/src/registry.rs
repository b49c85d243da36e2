//! Session-wide ledger of declarations and of the identifiers found live in
//! the current turn.
//!
//! One registry exists per session. Trackers hold a [`SharedRegistry`] handle
//! created at construction time; nothing here is global.
//!
//! Names form a single namespace across kinds: declaring `func a` after
//! `a := 1` replaces the variable record, so a later `a(2)` keeps only the
//! function live. Within that namespace the last declaration wins.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

/// Identity of a stored fragment, unique within a session and increasing in
/// allocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentId(u64);

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Variable,
    Import,
    Function,
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable => write!(f, "variable"),
            Self::Import => write!(f, "import"),
            Self::Function => write!(f, "function"),
        }
    }
}

/// What a declaration points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    /// A fragment held by the declaring tracker.
    Fragment(FragmentId),
    /// Raw text, e.g. the rendered import spec.
    Text(String),
}

impl Owner {
    pub fn fragment_id(&self) -> Option<FragmentId> {
        match self {
            Owner::Fragment(id) => Some(*id),
            Owner::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclarationKind,
    pub owner: Owner,
}

/// Registry handle shared by the trackers of one session.
pub type SharedRegistry = Rc<RefCell<DeclarationRegistry>>;

#[derive(Debug, Default)]
pub struct DeclarationRegistry {
    /// Declarations in first-declared order.
    declarations: IndexMap<String, Declaration>,
    /// Identifiers marked live this turn, in marking order.
    live: IndexMap<String, DeclarationKind>,
    next_id: u64,
}

impl DeclarationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh registry wrapped for sharing between trackers.
    pub fn shared() -> SharedRegistry {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn allocate_id(&mut self) -> FragmentId {
        let id = FragmentId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Upsert `name`, returning the record it replaced.
    ///
    /// A replaced record keeps its position in declaration order.
    pub fn record(&mut self, kind: DeclarationKind, name: &str, owner: Owner) -> Option<Declaration> {
        let previous = self
            .declarations
            .insert(name.to_string(), Declaration { kind, owner });
        if let Some(previous) = &previous {
            if previous.kind != kind {
                debug!(name, from = %previous.kind, to = %kind, "declaration shadowed");
                self.live.shift_remove(name);
            }
        }
        previous
    }

    /// Put back a record saved from [`record`](Self::record), or forget the
    /// name when there was none.
    pub fn restore(&mut self, name: &str, previous: Option<Declaration>) {
        match previous {
            Some(declaration) => {
                self.declarations.insert(name.to_string(), declaration);
            }
            None => {
                self.declarations.shift_remove(name);
                self.live.shift_remove(name);
            }
        }
    }

    /// Drop every record of `kind` owned by fragment `id`.
    pub fn remove_owned_by(&mut self, kind: DeclarationKind, id: FragmentId) -> Vec<String> {
        let names: Vec<String> = self
            .declarations
            .iter()
            .filter(|(_, decl)| decl.kind == kind && decl.owner == Owner::Fragment(id))
            .map(|(name, _)| name.clone())
            .collect();
        for name in &names {
            self.declarations.shift_remove(name);
            self.live.shift_remove(name);
        }
        names
    }

    pub fn get(&self, name: &str) -> Option<&Declaration> {
        self.declarations.get(name)
    }

    /// Owner of `name` if it is currently declared as `kind`.
    pub fn owner(&self, kind: DeclarationKind, name: &str) -> Option<&Owner> {
        self.declarations
            .get(name)
            .filter(|decl| decl.kind == kind)
            .map(|decl| &decl.owner)
    }

    /// All declarations of `kind`, in declaration order.
    pub fn all_declared(&self, kind: DeclarationKind) -> impl Iterator<Item = (&str, &Owner)> {
        self.declarations
            .iter()
            .filter(move |(_, decl)| decl.kind == kind)
            .map(|(name, decl)| (name.as_str(), &decl.owner))
    }

    pub fn count(&self, kind: DeclarationKind) -> usize {
        self.all_declared(kind).count()
    }

    /// Mark `name` live. Returns false when it is not declared as `kind` or
    /// was already live.
    pub fn mark_live(&mut self, name: &str, kind: DeclarationKind) -> bool {
        if self.owner(kind, name).is_none() || self.live.contains_key(name) {
            return false;
        }
        self.live.insert(name.to_string(), kind);
        true
    }

    pub fn is_live(&self, kind: DeclarationKind, name: &str) -> bool {
        self.live.get(name) == Some(&kind)
    }

    /// Identifiers of `kind` marked live this turn, in marking order.
    pub fn live_set(&self, kind: DeclarationKind) -> Vec<&str> {
        self.live
            .iter()
            .filter(|(_, live_kind)| **live_kind == kind)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn has_live(&self) -> bool {
        !self.live.is_empty()
    }

    /// Forget this turn's liveness. Declarations persist.
    pub fn reset_liveness(&mut self) {
        self.live.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_overrides_same_name() {
        let mut registry = DeclarationRegistry::new();
        let first = registry.allocate_id();
        let second = registry.allocate_id();
        assert!(first < second);

        assert!(registry
            .record(DeclarationKind::Variable, "x", Owner::Fragment(first))
            .is_none());
        let previous = registry.record(DeclarationKind::Variable, "x", Owner::Fragment(second));

        assert_eq!(previous.map(|decl| decl.owner), Some(Owner::Fragment(first)));
        assert_eq!(registry.count(DeclarationKind::Variable), 1);
        assert_eq!(
            registry.owner(DeclarationKind::Variable, "x"),
            Some(&Owner::Fragment(second))
        );
    }

    #[test]
    fn test_shadowing_across_kinds() {
        let mut registry = DeclarationRegistry::new();
        let var = registry.allocate_id();
        let func = registry.allocate_id();
        registry.record(DeclarationKind::Variable, "a", Owner::Fragment(var));
        registry.mark_live("a", DeclarationKind::Variable);

        registry.record(DeclarationKind::Function, "a", Owner::Fragment(func));

        assert!(registry.owner(DeclarationKind::Variable, "a").is_none());
        assert!(!registry.is_live(DeclarationKind::Variable, "a"));
        assert!(registry.mark_live("a", DeclarationKind::Function));
        assert_eq!(registry.live_set(DeclarationKind::Function), vec!["a"]);
    }

    #[test]
    fn test_mark_live_requires_matching_declaration() {
        let mut registry = DeclarationRegistry::new();
        registry.record(DeclarationKind::Import, "fmt", Owner::Text("\"fmt\"".into()));

        assert!(!registry.mark_live("fmt", DeclarationKind::Variable));
        assert!(!registry.mark_live("os", DeclarationKind::Import));
        assert!(registry.mark_live("fmt", DeclarationKind::Import));
        assert!(!registry.mark_live("fmt", DeclarationKind::Import));
    }

    #[test]
    fn test_reset_liveness_keeps_declarations() {
        let mut registry = DeclarationRegistry::new();
        registry.record(DeclarationKind::Import, "fmt", Owner::Text("\"fmt\"".into()));
        registry.mark_live("fmt", DeclarationKind::Import);

        registry.reset_liveness();

        assert!(!registry.has_live());
        assert_eq!(registry.count(DeclarationKind::Import), 1);
    }

    #[test]
    fn test_restore_and_remove_owned_by() {
        let mut registry = DeclarationRegistry::new();
        let id = registry.allocate_id();
        registry.record(DeclarationKind::Variable, "a", Owner::Fragment(id));
        registry.record(DeclarationKind::Variable, "b", Owner::Fragment(id));
        let previous = registry.record(DeclarationKind::Variable, "c", Owner::Fragment(id));

        registry.restore("c", previous);
        assert!(registry.get("c").is_none());

        let removed = registry.remove_owned_by(DeclarationKind::Variable, id);
        assert_eq!(removed, vec!["a", "b"]);
        assert_eq!(registry.count(DeclarationKind::Variable), 0);
    }

    #[test]
    fn test_declaration_order_is_stable_on_overwrite() {
        let mut registry = DeclarationRegistry::new();
        registry.record(DeclarationKind::Import, "fmt", Owner::Text("\"fmt\"".into()));
        registry.record(DeclarationKind::Import, "os", Owner::Text("\"os\"".into()));
        registry.record(DeclarationKind::Import, "fmt", Owner::Text("f \"fmt\"".into()));

        let names: Vec<&str> = registry
            .all_declared(DeclarationKind::Import)
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["fmt", "os"]);
    }
}
