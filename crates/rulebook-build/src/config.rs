use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AppError;

const DEFAULT_OUTPUT: &str = "site/data/stacks.json";
const RULES_DIR: &str = "rules";
const README_FILE: &str = "README.md";

/// Built-in stacks in display order: `(id, name, icon, summary, focus)`.
/// Each stack lives under `stacks/<id>`.
const BUILTIN_STACKS: &[(&str, &str, &str, &str, &str)] = &[
    (
        "nextjs",
        "Next.js",
        "icons/nextjs.svg",
        "App Router projects with React Server Components and TypeScript.",
        "Server/client boundaries, data fetching, routing",
    ),
    (
        "python-fastapi",
        "Python + FastAPI",
        "icons/python.svg",
        "Async HTTP APIs with FastAPI, Pydantic and pytest.",
        "Typed request models, dependency injection, testing",
    ),
    (
        "rust",
        "Rust",
        "icons/rust.svg",
        "Libraries and services written in idiomatic Rust.",
        "Error handling, ownership, async with Tokio",
    ),
    (
        "go",
        "Go",
        "icons/go.svg",
        "Backend services and CLIs in Go.",
        "Package layout, error wrapping, concurrency",
    ),
];

/// Display identity and location of one stack.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StackConfig {
    /// Fixed identifier, e.g. "rust"
    pub id: String,
    pub name: String,
    /// Icon path relative to the site root
    pub icon: String,
    pub summary: String,
    pub focus: String,
    /// Stack directory relative to the repository root
    pub dir: String,
}

impl StackConfig {
    pub fn rules_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.dir).join(RULES_DIR)
    }

    pub fn readme_path(&self, root: &Path) -> PathBuf {
        root.join(&self.dir).join(README_FILE)
    }
}

pub fn builtin_stacks() -> Vec<StackConfig> {
    BUILTIN_STACKS
        .iter()
        .map(|&(id, name, icon, summary, focus)| StackConfig {
            id: id.to_string(),
            name: name.to_string(),
            icon: icon.to_string(),
            summary: summary.to_string(),
            focus: focus.to_string(),
            dir: format!("stacks/{id}"),
        })
        .collect()
}

/// Build configuration loaded explicitly from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Repository root; stack directories are resolved against it.
    pub root: PathBuf,
    /// Snapshot destination.
    pub output: PathBuf,
    /// Stacks in snapshot order.
    pub stacks: Vec<StackConfig>,
}

impl Config {
    /// Optional:
    /// - `RULEBOOK_ROOT`: repository root (default: ".")
    /// - `RULEBOOK_OUTPUT`: snapshot path, relative to the root unless absolute
    ///   (default: "site/data/stacks.json")
    /// - `RULEBOOK_STACKS`: JSON file with an ordered array of stack records
    ///   (default: the built-in table)
    pub fn from_env() -> Result<Self, AppError> {
        let root = std::env::var("RULEBOOK_ROOT").unwrap_or_else(|_| ".".to_string());
        let output = std::env::var("RULEBOOK_OUTPUT").unwrap_or_else(|_| DEFAULT_OUTPUT.to_string());
        let stacks = match std::env::var("RULEBOOK_STACKS") {
            Ok(path) => load_stacks(Path::new(&path))?,
            Err(_) => builtin_stacks(),
        };
        Self::new(PathBuf::from(root), PathBuf::from(output), stacks)
    }

    pub fn new(root: PathBuf, output: PathBuf, stacks: Vec<StackConfig>) -> Result<Self, AppError> {
        if !root.is_dir() {
            return Err(AppError::Config(format!(
                "repository root not found: {}",
                root.display()
            )));
        }
        validate_stacks(&stacks)?;

        let output = if output.is_absolute() {
            output
        } else {
            root.join(output)
        };

        Ok(Self {
            root,
            output,
            stacks,
        })
    }
}

pub fn load_stacks(path: &Path) -> Result<Vec<StackConfig>, AppError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("failed to read {}: {e}", path.display())))?;
    serde_json::from_str(&json)
        .map_err(|e| AppError::Config(format!("invalid stack list in {}: {e}", path.display())))
}

fn validate_stacks(stacks: &[StackConfig]) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    for stack in stacks {
        if stack.id.trim().is_empty() {
            return Err(AppError::Config("stack id must not be empty".to_string()));
        }
        if !seen.insert(stack.id.as_str()) {
            return Err(AppError::Config(format!("duplicate stack id: {}", stack.id)));
        }
    }
    Ok(())
}
