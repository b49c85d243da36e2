//! The program skeleton the three trackers are rendered into.
//!
//! A template is opaque text with exactly one occurrence of each placeholder.
//! Nothing else about its structure is assumed.

use std::fmt;
use std::path::{Path, PathBuf};

const BUILTIN: &str = include_str!("../templates/main.go.tmpl");

/// One of the three regions a template exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Imports,
    Functions,
    Statements,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::Imports, Region::Functions, Region::Statements];

    pub fn placeholder(self) -> &'static str {
        match self {
            Region::Imports => "{%import_area%}",
            Region::Functions => "{%func_area%}",
            Region::Statements => "{%code_area%}",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.placeholder())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("cannot read template {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template must contain {placeholder} exactly once (found {found})")]
    MissingPlaceholder { placeholder: Region, found: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Text(String),
    Slot(Region),
}

/// Rendered text for each region.
#[derive(Debug, Clone, Copy, Default)]
pub struct Regions<'a> {
    pub imports: &'a str,
    pub functions: &'a str,
    pub statements: &'a str,
}

impl<'a> Regions<'a> {
    fn get(&self, region: Region) -> &'a str {
        match region {
            Region::Imports => self.imports,
            Region::Functions => self.functions,
            Region::Statements => self.statements,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    parts: Vec<Part>,
}

impl Template {
    /// The skeleton shipped with the crate.
    pub fn builtin() -> Result<Self, TemplateError> {
        Self::parse(BUILTIN)
    }

    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        let mut slots: Vec<(usize, Region)> = Vec::with_capacity(3);
        for region in Region::ALL {
            let found: Vec<usize> = text
                .match_indices(region.placeholder())
                .map(|(index, _)| index)
                .collect();
            if found.len() != 1 {
                return Err(TemplateError::MissingPlaceholder {
                    placeholder: region,
                    found: found.len(),
                });
            }
            slots.push((found[0], region));
        }
        slots.sort_by_key(|(index, _)| *index);

        let mut parts = Vec::with_capacity(7);
        let mut cursor = 0;
        for (index, region) in slots {
            parts.push(Part::Text(text[cursor..index].to_string()));
            parts.push(Part::Slot(region));
            cursor = index + region.placeholder().len();
        }
        parts.push(Part::Text(text[cursor..].to_string()));
        Ok(Self { parts })
    }

    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let text = std::fs::read_to_string(path).map_err(|source| TemplateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Substitute each region. Region text is inserted verbatim, so code
    /// that happens to contain a placeholder string is left alone.
    pub fn render(&self, regions: Regions<'_>) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Slot(region) => out.push_str(regions.get(*region)),
            }
        }
        out
    }
}
