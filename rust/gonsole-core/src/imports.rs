//! Imported packages and the subset referenced by the emitted code.

use std::collections::HashMap;

use tracing::debug;

use crate::fragment::{Fragment, INDENT};
use crate::registry::{DeclarationKind, Owner, SharedRegistry};
use crate::tokenizer;

/// One import: `"math/rand"` or `r "math/rand"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    pub alias: Option<String>,
    pub path: String,
}

impl ImportSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            alias: None,
            path: path.into(),
        }
    }

    /// Parse the body of an import line or batch entry. Quotes, a trailing
    /// comma and surrounding spaces are optional.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim().trim_end_matches(',').trim();
        let (alias, path) = match text.rsplit_once(char::is_whitespace) {
            Some((alias, path)) => (Some(alias.trim()), path),
            None => (None, text),
        };
        let path = path.trim_matches(|c| c == '"' || c == '`');
        if path.is_empty() {
            return None;
        }
        Some(Self {
            alias: alias.filter(|alias| !alias.is_empty()).map(str::to_string),
            path: path.to_string(),
        })
    }

    /// The name code uses to refer to the package: the alias, or the last
    /// segment of the path.
    pub fn identifier(&self) -> &str {
        if let Some(alias) = &self.alias {
            return alias;
        }
        self.path
            .rsplit(['/', '.'])
            .next()
            .unwrap_or(&self.path)
    }

    /// How the import appears inside `import ( ... )`.
    pub fn render(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} \"{}\"", alias, self.path),
            None => format!("\"{}\"", self.path),
        }
    }
}

/// Imports keyed by the identifier code uses for them, so they share the
/// registry's namespace with variables and functions: `sort := 3` hides an
/// earlier `import "sort"`.
#[derive(Debug)]
pub struct ImportTracker {
    registry: SharedRegistry,
    specs: HashMap<String, ImportSpec>,
}

impl ImportTracker {
    pub fn new(registry: SharedRegistry) -> Self {
        Self {
            registry,
            specs: HashMap::new(),
        }
    }

    /// Register an import. Declaring the same path again, under any name,
    /// replaces it.
    pub fn declare(&mut self, spec: ImportSpec) {
        debug!(path = %spec.path, alias = ?spec.alias, "import declared");
        let identifier = spec.identifier().to_string();
        let mut registry = self.registry.borrow_mut();

        // Entries hidden by a later variable or function, or renamed below.
        self.specs.retain(|name, existing| {
            registry.owner(DeclarationKind::Import, name).is_some() && existing.path != spec.path
        });
        let stale: Vec<String> = registry
            .all_declared(DeclarationKind::Import)
            .filter(|(name, _)| *name != identifier && !self.specs.contains_key(*name))
            .map(|(name, _)| name.to_string())
            .collect();
        for name in stale {
            registry.restore(&name, None);
        }

        registry.record(
            DeclarationKind::Import,
            &identifier,
            Owner::Text(spec.render()),
        );
        self.specs.insert(identifier, spec);
    }

    /// Number of declared imports.
    pub fn len(&self) -> usize {
        self.registry.borrow().count(DeclarationKind::Import)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Declared import paths, in declaration order.
    pub fn declared(&self) -> Vec<String> {
        self.registry
            .borrow()
            .all_declared(DeclarationKind::Import)
            .filter_map(|(name, _)| self.specs.get(name))
            .map(|spec| spec.path.clone())
            .collect()
    }

    /// Mark live every declared import whose identifier some token of the
    /// given fragments refers to, e.g. `rand.Intn(3)` for `math/rand`.
    pub fn scan_liveness<'a, I>(&self, fragments: I)
    where
        I: IntoIterator<Item = &'a Fragment>,
    {
        let fragments: Vec<&Fragment> = fragments.into_iter().collect();
        let mut registry = self.registry.borrow_mut();
        let pending: Vec<String> = registry
            .all_declared(DeclarationKind::Import)
            .map(|(name, _)| name)
            .filter(|name| !registry.is_live(DeclarationKind::Import, name))
            .map(str::to_string)
            .collect();

        for identifier in pending {
            let used = fragments.iter().any(|fragment| {
                fragment
                    .tokens()
                    .iter()
                    .any(|token| tokenizer::references(token, &identifier))
            });
            if used {
                registry.mark_live(&identifier, DeclarationKind::Import);
            }
        }
    }

    /// The import block: live imports in declaration order, one per line.
    pub fn render(&self) -> String {
        let registry = self.registry.borrow();
        let lines: Vec<String> = registry
            .all_declared(DeclarationKind::Import)
            .filter(|(name, _)| registry.is_live(DeclarationKind::Import, name))
            .filter_map(|(_, owner)| match owner {
                Owner::Text(text) => Some(format!("{}{}", INDENT, text)),
                Owner::Fragment(_) => None,
            })
            .collect();
        lines.join("\n")
    }
}
