use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::{debug, warn};
use serde_yml::Value;

use crate::compiler::CompileOptions;

pub const CONFIG_FILE: &str = ".treepat.yml";
pub const DEFAULT_INCLUDE: &str = "**/*.tree";

/// Resolved configuration from `.treepat.yml`.
///
/// Every key is optional. Macro file paths are resolved against the
/// directory holding the config file.
#[derive(Debug)]
pub struct ResolvedConfig {
    config_dir: Option<PathBuf>,
    macro_files: Vec<PathBuf>,
    include: Vec<String>,
    exclude: Vec<String>,
    open_containers: Option<Vec<String>>,
    stop_at_first: bool,
}

impl ResolvedConfig {
    fn empty() -> Self {
        Self {
            config_dir: None,
            macro_files: Vec::new(),
            include: vec![DEFAULT_INCLUDE.to_string()],
            exclude: Vec::new(),
            open_containers: None,
            stop_at_first: false,
        }
    }

    /// Directory of the loaded config file, if one was found.
    pub fn config_dir(&self) -> Option<&Path> {
        self.config_dir.as_deref()
    }

    pub fn macro_files(&self) -> &[PathBuf] {
        &self.macro_files
    }

    /// Globs a walked file must match to be searched.
    pub fn include_patterns(&self) -> &[String] {
        &self.include
    }

    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude
    }

    pub fn stop_at_first(&self) -> bool {
        self.stop_at_first
    }

    pub fn compile_options(&self) -> CompileOptions {
        match &self.open_containers {
            Some(kinds) => CompileOptions::with_open_containers(kinds.iter().cloned()),
            None => CompileOptions::default(),
        }
    }
}

/// Load config from the given path, or look for `.treepat.yml` in
/// `target_dir` and then the current directory. Returns defaults if no file
/// is found; an explicitly named file must exist.
pub fn load_config(path: Option<&Path>, target_dir: Option<&Path>) -> Result<ResolvedConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                bail!("config file {} does not exist", p.display());
            }
            p.to_path_buf()
        }
        None => {
            let candidates = target_dir
                .map(|d| d.join(CONFIG_FILE))
                .into_iter()
                .chain(std::iter::once(PathBuf::from(CONFIG_FILE)));
            match candidates.into_iter().find(|p| p.is_file()) {
                Some(p) => p,
                None => {
                    debug!("no {CONFIG_FILE} found, using defaults");
                    return Ok(ResolvedConfig::empty());
                }
            }
        }
    };

    let contents = std::fs::read_to_string(&config_path)
        .with_context(|| format!("failed to read config {}", config_path.display()))?;
    let raw: Value = serde_yml::from_str(&contents)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    let config_dir = config_path
        .parent()
        .map(|d| {
            if d.as_os_str().is_empty() {
                PathBuf::from(".")
            } else {
                d.to_path_buf()
            }
        })
        .unwrap_or_else(|| PathBuf::from("."));

    let mut config = ResolvedConfig::empty();
    match &raw {
        Value::Null => {}
        Value::Mapping(map) => {
            for (key, value) in map {
                let Some(key) = key.as_str() else {
                    continue;
                };
                match key {
                    "macros" => {
                        config.macro_files = string_list(value, key)?
                            .into_iter()
                            .map(|f| config_dir.join(f))
                            .collect();
                    }
                    "include" => config.include = string_list(value, key)?,
                    "exclude" => config.exclude = string_list(value, key)?,
                    "open_containers" => config.open_containers = Some(string_list(value, key)?),
                    "stop_at_first" => match value.as_bool() {
                        Some(b) => config.stop_at_first = b,
                        None => bail!("'stop_at_first' must be true or false"),
                    },
                    other => warn!("{}: unknown key '{other}'", config_path.display()),
                }
            }
        }
        _ => bail!("{} must be a mapping", config_path.display()),
    }

    debug!("config loaded from {}", config_path.display());
    config.config_dir = Some(config_dir);
    Ok(config)
}

/// A single string is accepted as a one-element list.
fn string_list(value: &Value, key: &str) -> Result<Vec<String>> {
    if let Some(s) = value.as_str() {
        return Ok(vec![s.to_string()]);
    }
    let Some(seq) = value.as_sequence() else {
        bail!("'{key}' must be a list of strings");
    };
    seq.iter()
        .map(|v| match v.as_str() {
            Some(s) => Ok(s.to_string()),
            None => bail!("'{key}' must be a list of strings"),
        })
        .collect()
}
