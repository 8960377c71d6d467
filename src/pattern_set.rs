//! Named patterns loaded from disk, combined with `and`, `or` and `not`.
//!
//! A pattern file holds one pattern in tree notation. A pattern directory
//! holds pattern files plus optional `and/`, `or/` and `not/` subdirectories;
//! the directory itself is an `and` over everything it contains. Subject files
//! are reported per named pattern.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use log::debug;
use serde::Serialize;

use crate::compiler::compile;
use crate::macros::MacroRegistry;
use crate::matcher::{Match, MatchSet};
use crate::notation::parse_pattern;
use crate::pda::AutomatonBundle;

/// Extension of pattern files inside a pattern directory.
pub const PATTERN_EXTENSION: &str = "pat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    And,
    Or,
    Not,
}

impl Combinator {
    /// The combinator a subdirectory name stands for.
    pub fn from_dir_name(name: &str) -> Option<Self> {
        match name {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            "not" => Some(Self::Not),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PatternExpr {
    Pattern {
        name: String,
        bundle: AutomatonBundle,
    },
    Group {
        op: Combinator,
        members: Vec<PatternExpr>,
    },
}

/// Whether an expression holds on one subject, and the matches that made it
/// hold. Matches under `not` never surface.
pub struct Verdict<'a> {
    pub holds: bool,
    pub matches: Vec<Match<'a>>,
}

impl Verdict<'_> {
    fn failed() -> Self {
        Self {
            holds: false,
            matches: Vec::new(),
        }
    }
}

impl PatternExpr {
    /// The single compiled pattern, if this is a leaf.
    pub fn as_bundle(&self) -> Option<&AutomatonBundle> {
        match self {
            Self::Pattern { bundle, .. } => Some(bundle),
            Self::Group { .. } => None,
        }
    }

    /// Evaluate against one subject. `run` searches the subject with one
    /// compiled pattern. `and` stops at the first member that fails, `not`
    /// at the first member that holds.
    pub fn evaluate<'a, F>(&'a self, run: &mut F) -> Verdict<'a>
    where
        F: FnMut(&'a AutomatonBundle) -> MatchSet<'a>,
    {
        match self {
            Self::Pattern { bundle, .. } => {
                let matches: Vec<Match<'a>> = run(bundle).into_iter().collect();
                Verdict {
                    holds: !matches.is_empty(),
                    matches,
                }
            }
            Self::Group {
                op: Combinator::And,
                members,
            } => {
                let mut matches = Vec::new();
                for member in members {
                    let verdict = member.evaluate(run);
                    if !verdict.holds {
                        return Verdict::failed();
                    }
                    matches.extend(verdict.matches);
                }
                Verdict {
                    holds: true,
                    matches,
                }
            }
            Self::Group {
                op: Combinator::Or,
                members,
            } => {
                let mut holds = false;
                let mut matches = Vec::new();
                for member in members {
                    let verdict = member.evaluate(run);
                    if verdict.holds {
                        holds = true;
                        matches.extend(verdict.matches);
                    }
                }
                Verdict { holds, matches }
            }
            Self::Group {
                op: Combinator::Not,
                members,
            } => {
                if members.iter().any(|member| member.evaluate(run).holds) {
                    Verdict::failed()
                } else {
                    Verdict {
                        holds: true,
                        matches: Vec::new(),
                    }
                }
            }
        }
    }

    fn pattern_count(&self) -> usize {
        match self {
            Self::Pattern { .. } => 1,
            Self::Group { members, .. } => members.iter().map(Self::pattern_count).sum(),
        }
    }
}

/// A pattern as the search runs it. Patterns given on the command line have
/// no name.
#[derive(Debug, Clone, Serialize)]
pub struct NamedPattern {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "pattern")]
    expr: PatternExpr,
}

impl NamedPattern {
    pub fn unnamed(bundle: AutomatonBundle) -> Self {
        Self {
            name: None,
            expr: PatternExpr::Pattern {
                name: String::new(),
                bundle,
            },
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn expr(&self) -> &PatternExpr {
        &self.expr
    }
}

/// Load a pattern file or a pattern directory. The name is the file stem or
/// the directory name.
pub fn load_pattern(path: &Path, registry: &MacroRegistry) -> Result<NamedPattern> {
    let name = display_name(path);
    let expr = if path.is_dir() {
        load_group(path, Combinator::And, registry)?
    } else {
        compile_file(path, registry)?
    };
    debug!("pattern {name}: {} compiled patterns", expr.pattern_count());
    Ok(NamedPattern {
        name: Some(name),
        expr,
    })
}

fn load_group(dir: &Path, op: Combinator, registry: &MacroRegistry) -> Result<PatternExpr> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("failed to read pattern directory {}", dir.display()))?
        .collect::<std::io::Result<_>>()
        .with_context(|| format!("failed to read pattern directory {}", dir.display()))?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut members = Vec::new();
    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            match entry.file_name().to_str().and_then(Combinator::from_dir_name) {
                Some(sub) => members.push(load_group(&path, sub, registry)?),
                None => debug!("skipping {}: not and/or/not", path.display()),
            }
        } else if path.extension().is_some_and(|ext| ext == PATTERN_EXTENSION) {
            members.push(compile_file(&path, registry)?);
        } else {
            debug!("skipping {}: not a .{PATTERN_EXTENSION} file", path.display());
        }
    }
    if members.is_empty() {
        bail!("pattern directory {} contains no patterns", dir.display());
    }
    Ok(PatternExpr::Group { op, members })
}

fn compile_file(path: &Path, registry: &MacroRegistry) -> Result<PatternExpr> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read pattern file {}", path.display()))?;
    let pattern =
        parse_pattern(&source).with_context(|| format!("invalid pattern in {}", path.display()))?;
    let bundle = compile(&pattern, registry, registry.options())
        .with_context(|| format!("failed to compile pattern {}", path.display()))?;
    Ok(PatternExpr::Pattern {
        name: display_name(path),
        bundle,
    })
}

fn display_name(path: &Path) -> String {
    let name = if path.is_dir() {
        path.file_name()
    } else {
        path.file_stem()
    };
    name.map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
