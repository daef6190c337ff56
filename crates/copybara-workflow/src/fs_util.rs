use crate::error::{Result, WorkflowError};
use copybara_core::Glob;
use serde::Serialize;
use similar::TextDiff;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// What to do with symlinks that point outside the tree being copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutsideSymlinks {
    /// Fail with a validation error.
    Fail,
    /// Copy the target's content instead of the link.
    Materialize,
}

/// Relative `/`-separated path of `path` under `root`.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// All non-directory entries under `root`, relative and sorted.
pub fn list_files(root: &Path) -> Result<BTreeSet<String>> {
    let mut files = BTreeSet::new();
    if !root.exists() {
        return Ok(files);
    }
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            files.insert(relative_path(root, entry.path()));
        }
    }
    Ok(files)
}

/// Delete every file under `root` that `keep` does not match. Returns the
/// number of files removed.
pub fn delete_files_not_matching(root: &Path, keep: &Glob) -> Result<usize> {
    let mut deleted = 0;
    for file in list_files(root)? {
        if !keep.matches(&file) {
            fs::remove_file(root.join(&file))?;
            deleted += 1;
        }
    }
    Ok(deleted)
}

/// Delete every file under `root` that `glob` matches.
pub fn delete_files_matching(root: &Path, glob: &Glob) -> Result<usize> {
    let mut deleted = 0;
    for file in list_files(root)? {
        if glob.matches(&file) {
            fs::remove_file(root.join(&file))?;
            deleted += 1;
        }
    }
    Ok(deleted)
}

/// Remove `dir` and everything below it, if it exists.
pub fn delete_recursively(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    Ok(())
}

/// Copy the tree at `src` into `dst`, creating `dst` if needed. Symlinks
/// that stay inside `src` are recreated as symlinks.
pub fn copy_tree(src: &Path, dst: &Path, outside: OutsideSymlinks) -> Result<()> {
    fs::create_dir_all(dst)?;
    let src_root = src.canonicalize()?;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &src_root, &target, outside)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn copy_symlink(link: &Path, src_root: &Path, target: &Path, outside: OutsideSymlinks) -> Result<()> {
    let resolved: Option<PathBuf> = link.canonicalize().ok();
    let inside = resolved.as_ref().is_some_and(|r| r.starts_with(src_root));
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    if inside {
        return make_symlink(&fs::read_link(link)?, target);
    }
    match (outside, resolved) {
        (OutsideSymlinks::Fail, _) => Err(WorkflowError::Validation(format!(
            "Failed to perform reversible check of transformations due to symlink '{}' \
             that points outside the checkout dir. Consider removing this symlink from \
             your origin_files or, alternatively, set reversible_check = false in your \
             workflow.",
            link.display()
        ))),
        (OutsideSymlinks::Materialize, Some(real)) if real.is_file() => {
            fs::copy(&real, target)?;
            Ok(())
        }
        (OutsideSymlinks::Materialize, _) => {
            debug!(link = %link.display(), "skipping dangling or directory symlink");
            Ok(())
        }
    }
}

#[cfg(unix)]
fn make_symlink(original: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(original, link)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_symlink(original: &Path, link: &Path) -> Result<()> {
    let source = link.parent().map(|p| p.join(original)).unwrap_or_else(|| original.to_path_buf());
    fs::copy(source, link)?;
    Ok(())
}

fn read_entry(root: &Path, rel: &str) -> Result<Option<Vec<u8>>> {
    let path = root.join(rel);
    let meta = match fs::symlink_metadata(&path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if meta.file_type().is_symlink() {
        let target = fs::read_link(&path)?;
        return Ok(Some(format!("symlink -> {}", target.display()).into_bytes()));
    }
    Ok(Some(fs::read(path)?))
}

/// Unified diff between two trees. Empty when they hold the same files with
/// the same content.
pub fn diff_trees(left: &Path, right: &Path) -> Result<String> {
    let files: BTreeSet<String> = list_files(left)?
        .into_iter()
        .chain(list_files(right)?)
        .collect();
    let mut out = String::new();
    for file in files {
        let a = read_entry(left, &file)?;
        let b = read_entry(right, &file)?;
        if a == b {
            continue;
        }
        let old_name = if a.is_some() { format!("a/{}", file) } else { "/dev/null".to_string() };
        let new_name = if b.is_some() { format!("b/{}", file) } else { "/dev/null".to_string() };
        let a = a.unwrap_or_default();
        let b = b.unwrap_or_default();
        match (std::str::from_utf8(&a), std::str::from_utf8(&b)) {
            (Ok(a), Ok(b)) => {
                out.push_str(&format!("diff --copybara {} {}\n", old_name, new_name));
                out.push_str(
                    &TextDiff::from_lines(a, b)
                        .unified_diff()
                        .context_radius(3)
                        .header(&old_name, &new_name)
                        .to_string(),
                );
            }
            _ => out.push_str(&format!("Binary files {} and {} differ\n", old_name, new_name)),
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiffOperation {
    Add,
    Delete,
    Modify,
}

/// A file that differs between two trees.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DiffFile {
    pub name: String,
    pub operation: DiffOperation,
}

/// Files that differ between `before` and `after`, sorted by name.
pub fn diff_files(before: &Path, after: &Path) -> Result<Vec<DiffFile>> {
    let files: BTreeSet<String> = list_files(before)?
        .into_iter()
        .chain(list_files(after)?)
        .collect();
    let mut out = Vec::new();
    for name in files {
        let operation = match (read_entry(before, &name)?, read_entry(after, &name)?) {
            (None, Some(_)) => DiffOperation::Add,
            (Some(_), None) => DiffOperation::Delete,
            (Some(a), Some(b)) if a != b => DiffOperation::Modify,
            _ => continue,
        };
        out.push(DiffFile { name, operation });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn delete_not_matching_counts_files() {
        let dir = tempdir().unwrap();
        write(dir.path(), "src/a.rs", "a");
        write(dir.path(), "src/b.rs", "b");
        write(dir.path(), "docs/readme.md", "r");
        let glob = Glob::new(["src/**"], Vec::<String>::new()).unwrap();
        assert_eq!(delete_files_not_matching(dir.path(), &glob).unwrap(), 1);
        let left: Vec<_> = list_files(dir.path()).unwrap().into_iter().collect();
        assert_eq!(left, vec!["src/a.rs", "src/b.rs"]);
    }

    #[test]
    fn copy_and_diff_identical_trees() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        write(src.path(), "a/b/c.txt", "hello\n");
        write(src.path(), "top.txt", "top\n");
        copy_tree(src.path(), dst.path(), OutsideSymlinks::Fail).unwrap();
        assert_eq!(diff_trees(src.path(), dst.path()).unwrap(), "");
        assert!(diff_files(src.path(), dst.path()).unwrap().is_empty());
    }

    #[test]
    fn diff_reports_changes() {
        let left = tempdir().unwrap();
        let right = tempdir().unwrap();
        write(left.path(), "same.txt", "x\n");
        write(right.path(), "same.txt", "x\n");
        write(left.path(), "changed.txt", "foo\n");
        write(right.path(), "changed.txt", "bar\n");
        write(right.path(), "added.txt", "new\n");

        let diff = diff_trees(left.path(), right.path()).unwrap();
        assert!(diff.contains("-foo"));
        assert!(diff.contains("+bar"));
        assert!(diff.contains("b/added.txt"));
        assert!(!diff.contains("same.txt"));

        let files = diff_files(left.path(), right.path()).unwrap();
        assert_eq!(
            files,
            vec![
                DiffFile { name: "added.txt".into(), operation: DiffOperation::Add },
                DiffFile { name: "changed.txt".into(), operation: DiffOperation::Modify },
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn outside_symlink_fails_when_requested() {
        let outside = tempdir().unwrap();
        write(outside.path(), "secret.txt", "s");
        let src = tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), src.path().join("link"))
            .unwrap();
        let dst = tempdir().unwrap();
        let err = copy_tree(src.path(), dst.path(), OutsideSymlinks::Fail).unwrap_err();
        assert!(err.to_string().contains("points outside the checkout dir"));

        let dst = tempdir().unwrap();
        copy_tree(src.path(), dst.path(), OutsideSymlinks::Materialize).unwrap();
        assert_eq!(fs::read_to_string(dst.path().join("link")).unwrap(), "s");
    }
}
