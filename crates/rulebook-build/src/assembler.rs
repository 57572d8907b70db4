/// Assembles every configured stack into one snapshot.
///
/// Layout per stack (relative to the repository root):
/// - `<dir>/rules/*.mdc`, `<dir>/rules/*.md`: guide documents
/// - `<dir>/README.md`: stack overview, optional
///
/// A failure reading any stack's directory or guide aborts the whole build, so
/// a partial snapshot is never produced. Malformed documents are handled by the
/// header parser and never fail here.
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use rulebook_common::model::{Guide, Snapshot, Stack};
use rulebook_common::slug;

use crate::config::StackConfig;
use crate::error::AppError;

const GUIDE_EXTENSIONS: &[&str] = &["mdc", "md"];

pub fn build(root: &Path, stacks: &[StackConfig]) -> Result<Snapshot, AppError> {
    let mut assembled = Vec::with_capacity(stacks.len());
    for config in stacks {
        let stack = assemble_stack(root, config)?;
        info!(
            stack = %stack.id,
            guides = stack.guides.len(),
            readme = !stack.readme.is_empty(),
            "stack assembled"
        );
        assembled.push(stack);
    }
    Ok(Snapshot::new(assembled))
}

pub fn assemble_stack(root: &Path, config: &StackConfig) -> Result<Stack, AppError> {
    let rules_dir = config.rules_dir(root);
    let file_names = list_guide_files(&rules_dir)?;

    let mut guides = Vec::with_capacity(file_names.len());
    for file_name in file_names {
        let path = rules_dir.join(&file_name);
        let bytes = fs::read(&path).map_err(|source| AppError::Io {
            path: path.clone(),
            source,
        })?;
        let guide = Guide::from_document(&file_name, &String::from_utf8_lossy(&bytes));
        if guide.frontmatter.is_empty() {
            debug!(stack = %config.id, file = %file_name, "guide has no header");
        }
        guides.push(guide);
    }
    sort_guides(&mut guides);

    let readme = read_optional(&config.readme_path(root))?;

    Ok(Stack {
        id: config.id.clone(),
        name: config.name.clone(),
        icon: config.icon.clone(),
        summary: config.summary.clone(),
        focus: config.focus.clone(),
        readme,
        guides,
    })
}

/// Guide file names in `dir`, sorted by name so builds are reproducible.
fn list_guide_files(dir: &Path) -> Result<Vec<String>, AppError> {
    let io_err = |source| AppError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path: PathBuf = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!(path = %path.display(), "skipping file with non UTF-8 name");
            continue;
        };
        if is_guide_file(&name) {
            names.push(name);
        }
    }

    names.sort();
    Ok(names)
}

fn is_guide_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| GUIDE_EXTENSIONS.iter().any(|g| ext.eq_ignore_ascii_case(g)))
}

/// Overview documents first, then by title. The sort is stable, so equal titles
/// keep directory order.
fn sort_guides(guides: &mut [Guide]) {
    guides.sort_by(|a, b| {
        let a_overview = slug::is_overview(&a.file_name);
        let b_overview = slug::is_overview(&b.file_name);
        b_overview
            .cmp(&a_overview)
            .then_with(|| slug::compare_titles(&a.title, &b.title))
    });
}

/// Contents of `path`, or an empty string if it does not exist.
fn read_optional(path: &Path) -> Result<String, AppError> {
    match fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(source) => Err(AppError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack_config(id: &str) -> StackConfig {
        StackConfig {
            id: id.to_string(),
            name: id.to_uppercase(),
            icon: format!("icons/{id}.svg"),
            summary: format!("{id} summary"),
            focus: format!("{id} focus"),
            dir: format!("stacks/{id}"),
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn overview_first_then_title_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        write(root, "stacks/rust/rules/b-guide.mdc", "---\ndescription: B\n---\nB body");
        write(root, "stacks/rust/rules/a-guide.mdc", "---\nalwaysApply: true\n---\nA body");
        write(root, "stacks/rust/rules/README.md", "# Rules overview");
        write(root, "stacks/rust/rules/notes.txt", "ignored");
        fs::create_dir_all(root.join("stacks/rust/rules/nested.md")).unwrap();

        let stack = assemble_stack(root, &stack_config("rust")).unwrap();
        let ids: Vec<&str> = stack.guides.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["readme", "a-guide", "b-guide"]);

        let a = &stack.guides[1];
        assert_eq!(a.title, "A Guide");
        assert!(a.always_apply);
        assert_eq!(a.content, "A body");
        assert_eq!(stack.guides[0].content, "# Rules overview");
    }

    #[test]
    fn title_order_ignores_case() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        write(root, "stacks/go/rules/Zeta.md", "z");
        write(root, "stacks/go/rules/alpha.mdc", "a");
        write(root, "stacks/go/rules/Beta.mdc", "b");

        let stack = assemble_stack(root, &stack_config("go")).unwrap();
        let titles: Vec<&str> = stack.guides.iter().map(|g| g.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Beta", "Zeta"]);
    }

    #[test]
    fn equal_titles_keep_file_name_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        write(root, "stacks/go/rules/a_guide.mdc", "second");
        write(root, "stacks/go/rules/a-guide.md", "first");
        write(root, "stacks/go/rules/Émile.md", "accented");
        write(root, "stacks/go/rules/zeta.md", "last");

        let stack = assemble_stack(root, &stack_config("go")).unwrap();
        let files: Vec<&str> = stack.guides.iter().map(|g| g.file_name.as_str()).collect();
        assert_eq!(files, vec!["a-guide.md", "a_guide.mdc", "Émile.md", "zeta.md"]);
        assert_eq!(stack.guides[0].title, stack.guides[1].title);
    }

    #[test]
    fn readme_is_optional() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        write(root, "stacks/go/rules/errors.mdc", "wrap errors");

        let stack = assemble_stack(root, &stack_config("go")).unwrap();
        assert_eq!(stack.readme, "");

        write(root, "stacks/go/README.md", "# Go\n\nOverview.");
        let stack = assemble_stack(root, &stack_config("go")).unwrap();
        assert_eq!(stack.readme, "# Go\n\nOverview.");
        assert_eq!(stack.name, "GO");
        assert_eq!(stack.icon, "icons/go.svg");
    }

    #[test]
    fn malformed_document_does_not_fail() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        write(root, "stacks/go/rules/broken.mdc", "---\ndescription: never closed\n");
        fs::write(root.join("stacks/go/rules/binary.md"), [0xff, 0xfe, b'o', b'k']).unwrap();

        let stack = assemble_stack(root, &stack_config("go")).unwrap();
        assert_eq!(stack.guides.len(), 2);
        let broken = stack.guides.iter().find(|g| g.id == "broken").unwrap();
        assert!(broken.frontmatter.is_empty());
        assert_eq!(broken.content, "---\ndescription: never closed\n");
    }

    #[test]
    fn missing_rules_dir_aborts_build() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        write(root, "stacks/rust/rules/ok.mdc", "fine");

        let err = build(root, &[stack_config("rust"), stack_config("go")]).unwrap_err();
        match err {
            AppError::Io { path, .. } => assert!(path.ends_with("stacks/go/rules")),
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn build_keeps_config_order_and_is_repeatable() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        write(root, "stacks/rust/rules/ownership.mdc", "---\nglobs:\n  - \"**/*.rs\"\n---\nBorrow.");
        write(root, "stacks/go/rules/errors.mdc", "Wrap.");
        let stacks = [stack_config("rust"), stack_config("go")];

        let first = build(root, &stacks).unwrap();
        let ids: Vec<&str> = first.stacks.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["rust", "go"]);
        assert_eq!(first.stacks[0].guides[0].globs, vec!["**/*.rs"]);

        let second = build(root, &stacks).unwrap();
        assert_eq!(first.content_digest().unwrap(), second.content_digest().unwrap());
    }

    #[test]
    fn guide_extensions() {
        assert!(is_guide_file("a.mdc"));
        assert!(is_guide_file("README.MD"));
        assert!(!is_guide_file("a.txt"));
        assert!(!is_guide_file("mdc"));
    }
}
