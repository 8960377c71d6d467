use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;

use crate::config::ResolvedConfig;

/// Discover subject files from the given paths, respecting .gitignore, the
/// configured `include` globs and the `exclude` patterns.
pub fn discover_files(paths: &[PathBuf], config: &ResolvedConfig) -> Result<Vec<PathBuf>> {
    let include = include_set(config.include_patterns())?;
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            // Direct file paths bypass include filtering
            files.push(path.clone());
        } else if path.is_dir() {
            files.extend(walk_directory(path, &include, config)?);
        } else {
            anyhow::bail!("path does not exist: {}", path.display());
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn include_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).with_context(|| format!("invalid include pattern: {pattern}"))?;
        builder.add(glob);
    }
    builder.build().context("failed to build include patterns")
}

fn walk_directory(dir: &Path, include: &GlobSet, config: &ResolvedConfig) -> Result<Vec<PathBuf>> {
    let mut builder = WalkBuilder::new(dir);
    builder.hidden(true).git_ignore(true).git_global(true);

    let excludes = config.exclude_patterns();
    if !excludes.is_empty() {
        let mut overrides = OverrideBuilder::new(dir);
        for pattern in excludes {
            // ignore crate overrides: prefix with ! to exclude
            overrides
                .add(&format!("!{pattern}"))
                .with_context(|| format!("invalid exclude pattern: {pattern}"))?;
        }
        let overrides = overrides.build().context("failed to build overrides")?;
        builder.overrides(overrides);
    }

    let mut files = Vec::new();
    for entry in builder.build() {
        let entry = entry.context("error walking directory")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let relative = path.strip_prefix(dir).unwrap_or(path);
        if include.is_match(relative) {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}
