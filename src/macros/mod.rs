//! Named, parametrized sub-patterns.
//!
//! A macro is a set of alternative pattern fragments ("transformations")
//! that share a parameter list. Patterns invoke macros with
//! `(?@Name ?a ?b)`; the matcher runs each transformation's automaton on the
//! current subject node and maps the bindings of the formal parameters back
//! onto the caller's wildcards.
//!
//! The registry is an explicit object handed to the compiler and the
//! matcher; there is no process-wide macro table.

pub mod source;

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;
use thiserror::Error;

use crate::compiler::{CompileError, CompileOptions, compile};
use crate::notation::ParseError;
use crate::pda::AutomatonBundle;
use crate::tree::{Location, Tree};

/// How the transformations of a macro combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Every transformation must match, in any order.
    AllOf,
    /// At least one transformation must match.
    AnyOf,
}

impl Mode {
    /// `&`/`all` or `|`/`any`.
    pub fn from_symbol(symbol: &str) -> Option<Mode> {
        match symbol {
            "&" | "all" => Some(Mode::AllOf),
            "|" | "any" => Some(Mode::AnyOf),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::AllOf => "all-of",
            Mode::AnyOf => "any-of",
        })
    }
}

#[derive(Debug, Clone)]
pub struct MacroParam {
    name: String,
    default: Option<Tree>,
}

impl MacroParam {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    pub fn with_default(name: impl Into<String>, default: Tree) -> Self {
        Self {
            name: name.into(),
            default: Some(default),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subtree bound to this parameter when the caller has nothing for it.
    pub fn default(&self) -> Option<&Tree> {
        self.default.as_ref()
    }
}

#[derive(Debug, Clone)]
pub struct Transformation {
    name: String,
    pattern: Tree,
    bundle: AutomatonBundle,
}

impl Transformation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &Tree {
        &self.pattern
    }

    pub fn bundle(&self) -> &AutomatonBundle {
        &self.bundle
    }
}

#[derive(Debug, Clone)]
pub struct Macro {
    name: String,
    params: Vec<MacroParam>,
    mode: Mode,
    transformations: Vec<Transformation>,
}

impl Macro {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[MacroParam] {
        &self.params
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn transformations(&self) -> &[Transformation] {
        &self.transformations
    }

    pub fn transformation(&self, name: &str) -> Option<&Transformation> {
        self.transformations.iter().find(|t| t.name == name)
    }
}

#[derive(Debug, Error)]
pub enum MacroError {
    #[error("macro '{0}' is already defined")]
    Duplicate(String),
    #[error("macro '{name}' defines transformation '{transformation}' twice")]
    DuplicateTransformation { name: String, transformation: String },
    #[error("macro '{name}' declares parameter '?{param}' twice")]
    DuplicateParameter { name: String, param: String },
    #[error("macro '{0}' has no transformations")]
    NoTransformations(String),
    #[error("default for '?{param}' of macro '{name}' must be a plain tree")]
    WildcardDefault { name: String, param: String },
    #[error("{message} at {location}")]
    Malformed { message: String, location: Location },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("transformation '{transformation}' of macro '{name}': {source}")]
    Compile {
        name: String,
        transformation: String,
        #[source]
        source: CompileError,
    },
    #[error("failed to read macro file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct MacroRegistry {
    macros: BTreeMap<String, Macro>,
    options: CompileOptions,
    allow_override: bool,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry whose transformations are compiled with `options`.
    pub fn with_options(options: CompileOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Let a later definition replace an earlier one of the same name.
    pub fn allow_override(mut self, allow: bool) -> Self {
        self.allow_override = allow;
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.macros.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Register a macro whose transformations are given as `?#name` sections.
    ///
    /// ```text
    /// ?#plus_eq (expr_stmt ?i += ?v)
    /// ?#plus    (expr_stmt ?i = (arith_expr ?i + ?v))
    /// ```
    pub fn register(
        &mut self,
        name: &str,
        params: Vec<MacroParam>,
        mode: Mode,
        source: &str,
    ) -> Result<&Macro, MacroError> {
        let sections = source::parse_transformations(source)?;
        self.define(name, params, mode, sections)
    }

    /// Register every `?#DEFINE` block of a definition file, in order.
    /// Returns the names defined.
    ///
    /// All or nothing: if any block fails, the registry is left unchanged.
    /// Later blocks may call macros defined by earlier ones.
    pub fn load_definitions(&mut self, text: &str) -> Result<Vec<String>, MacroError> {
        let definitions = source::parse_definitions(text)?;
        let mut staged = self.clone();
        let mut names = Vec::with_capacity(definitions.len());
        for definition in definitions {
            staged.define(
                &definition.name,
                definition.params,
                definition.mode,
                definition.transformations,
            )?;
            names.push(definition.name);
        }
        *self = staged;
        Ok(names)
    }

    pub fn load_file(&mut self, path: &Path) -> Result<Vec<String>, MacroError> {
        let text = std::fs::read_to_string(path).map_err(|source| MacroError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let names = self.load_definitions(&text)?;
        info!("loaded {} macro(s) from {}", names.len(), path.display());
        Ok(names)
    }

    fn define(
        &mut self,
        name: &str,
        params: Vec<MacroParam>,
        mode: Mode,
        sections: Vec<(String, Tree)>,
    ) -> Result<&Macro, MacroError> {
        if !self.allow_override && self.macros.contains_key(name) {
            return Err(MacroError::Duplicate(name.to_string()));
        }
        for (i, param) in params.iter().enumerate() {
            if params[..i].iter().any(|p| p.name == param.name) {
                return Err(MacroError::DuplicateParameter {
                    name: name.to_string(),
                    param: param.name.clone(),
                });
            }
            if param.default.as_ref().is_some_and(Tree::has_wildcards) {
                return Err(MacroError::WildcardDefault {
                    name: name.to_string(),
                    param: param.name.clone(),
                });
            }
        }
        if sections.is_empty() {
            return Err(MacroError::NoTransformations(name.to_string()));
        }

        let mut transformations: Vec<Transformation> = Vec::with_capacity(sections.len());
        for (transformation, pattern) in sections {
            if transformations.iter().any(|t| t.name == transformation) {
                return Err(MacroError::DuplicateTransformation {
                    name: name.to_string(),
                    transformation,
                });
            }
            let bundle = compile(&pattern, self, &self.options).map_err(|source| {
                MacroError::Compile {
                    name: name.to_string(),
                    transformation: transformation.clone(),
                    source,
                }
            })?;
            transformations.push(Transformation {
                name: transformation,
                pattern,
                bundle,
            });
        }

        debug!(
            "registered macro {name} ({mode}) with {} parameter(s) and {} transformation(s)",
            params.len(),
            transformations.len()
        );
        let mac = Macro {
            name: name.to_string(),
            params,
            mode,
            transformations,
        };
        Ok(match self.macros.entry(name.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.insert(mac);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(mac),
        })
    }
}
