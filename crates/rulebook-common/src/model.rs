use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CommonError;
use crate::frontmatter::{self, Frontmatter};
use crate::slug;

/// A single rule document inside a stack (e.g. `error-handling.mdc`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guide {
    /// Slug derived from the file name, e.g. "error-handling"
    pub id: String,
    /// Display title derived from the file name, e.g. "Error Handling"
    pub title: String,
    /// Original file name, used for downloads
    pub file_name: String,
    /// Parsed header mapping, unknown keys included
    pub frontmatter: Frontmatter,
    /// Raw body, unrendered
    pub content: String,
    pub always_apply: bool,
    pub globs: Vec<String>,
}

impl Guide {
    /// Parse a raw document and derive its identity from `file_name`.
    pub fn from_document(file_name: &str, raw: &str) -> Self {
        let (frontmatter, content) = frontmatter::parse(raw);
        Self {
            id: slug::guide_id(file_name),
            title: slug::guide_title(file_name),
            file_name: file_name.to_string(),
            always_apply: frontmatter.always_apply(),
            globs: frontmatter.globs(),
            frontmatter,
            content,
        }
    }

    /// The document as it would be written back to disk.
    pub fn source(&self) -> String {
        frontmatter::compose(&self.frontmatter, &self.content)
    }
}

/// A statically configured collection of guides sharing a directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stack {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub summary: String,
    pub focus: String,
    /// Raw text of the stack's README, empty when absent
    pub readme: String,
    pub guides: Vec<Guide>,
}

impl Stack {
    pub fn guide(&self, id: &str) -> Option<&Guide> {
        self.guides.iter().find(|g| g.id == id)
    }
}

/// Everything the UI needs, rebuilt wholesale on each build run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub generated_at: String,
    pub stacks: Vec<Stack>,
}

impl Snapshot {
    pub fn new(stacks: Vec<Stack>) -> Self {
        Self {
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            stacks,
        }
    }

    pub fn stack(&self, id: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.id == id)
    }

    pub fn guide(&self, stack_id: &str, guide_id: &str) -> Option<&Guide> {
        self.stack(stack_id)?.guide(guide_id)
    }

    /// SHA-256 over the serialized stacks. Stable across runs with unchanged
    /// inputs since the timestamp is excluded.
    pub fn content_digest(&self) -> Result<String, CommonError> {
        let bytes = serde_json::to_vec(&self.stacks)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Write the snapshot as pretty JSON. The destination is only replaced once
    /// the whole file has been written.
    pub fn write_atomic(&self, path: &Path) -> Result<(), CommonError> {
        let json = serde_json::to_string_pretty(self)?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|source| CommonError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let io_err = |source| CommonError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| CommonError::Persist {
            path: path.to_path_buf(),
            source: e.error,
        })?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, CommonError> {
        let json = fs::read_to_string(path).map_err(|source| CommonError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}
