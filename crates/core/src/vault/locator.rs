//! Locating attachment files (images, SVGs) referenced from notes.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

/// Finds attachments the way note links are written: by relative path or by
/// bare file name anywhere below the note or the vault root.
#[derive(Debug, Clone)]
pub struct AssetLocator {
    vault_root: PathBuf,
}

impl AssetLocator {
    pub fn new(vault_root: &Path) -> Self {
        Self { vault_root: vault_root.to_path_buf() }
    }

    /// Search order:
    /// 1. relative to the note's directory, when that file exists;
    /// 2. a target containing `/` is taken relative to the vault root;
    /// 3. breadth-first search for the file name below the note's directory;
    /// 4. breadth-first search below the vault root.
    pub fn locate(&self, target: &str, note_dir: &Path) -> Option<PathBuf> {
        let target_path = Path::new(target);
        if target_path.is_absolute() {
            return target_path.is_file().then(|| target_path.to_path_buf());
        }

        let beside = note_dir.join(target_path);
        if beside.is_file() {
            return Some(beside);
        }

        if target.contains('/') {
            let from_root = self.vault_root.join(target_path);
            if from_root.is_file() {
                return Some(from_root);
            }
        }

        let file_name = target_path.file_name()?;
        if let Some(found) = bfs_search(note_dir, file_name.as_ref()) {
            return Some(found);
        }
        if note_dir != self.vault_root {
            return bfs_search(&self.vault_root, file_name.as_ref());
        }
        None
    }
}

fn bfs_search(start_dir: &Path, file_name: &Path) -> Option<PathBuf> {
    let mut queue = VecDeque::from([start_dir.to_path_buf()]);

    while let Some(dir) = queue.pop_front() {
        let candidate = dir.join(file_name);
        if candidate.is_file() {
            return Some(candidate);
        }

        // Unreadable directories are skipped
        let Ok(entries) = fs::read_dir(&dir) else { continue };
        let mut children: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
            .map(|e| e.path())
            .collect();
        children.sort();
        queue.extend(children);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vault() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("notes/assets")).unwrap();
        fs::create_dir_all(root.join("attachments/deep")).unwrap();
        fs::write(root.join("notes/assets/local.png"), "x").unwrap();
        fs::write(root.join("attachments/deep/shared.png"), "x").unwrap();
        fs::write(root.join("attachments/dup.png"), "root copy").unwrap();
        fs::write(root.join("notes/assets/dup.png"), "local copy").unwrap();
        dir
    }

    #[test]
    fn test_finds_below_note_directory_first() {
        let dir = vault();
        let locator = AssetLocator::new(dir.path());
        let found = locator.locate("dup.png", &dir.path().join("notes")).unwrap();
        assert_eq!(found, dir.path().join("notes/assets/dup.png"));
    }

    #[test]
    fn test_falls_back_to_vault_wide_search() {
        let dir = vault();
        let locator = AssetLocator::new(dir.path());
        let found = locator.locate("shared.png", &dir.path().join("notes")).unwrap();
        assert_eq!(found, dir.path().join("attachments/deep/shared.png"));
    }

    #[test]
    fn test_path_with_slash_is_vault_relative() {
        let dir = vault();
        let locator = AssetLocator::new(dir.path());
        let found = locator.locate("attachments/dup.png", &dir.path().join("notes")).unwrap();
        assert_eq!(found, dir.path().join("attachments/dup.png"));
    }

    #[test]
    fn test_missing_asset() {
        let dir = vault();
        let locator = AssetLocator::new(dir.path());
        assert!(locator.locate("nope.png", dir.path()).is_none());
    }
}
