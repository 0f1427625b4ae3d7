use crossbeam_channel::Sender;
use ignore::{WalkBuilder, WalkState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use crate::config::ScanOptions;
use crate::git;
use crate::model::{TreeDataset, TreeNode};
use crate::progress::Progress;

#[derive(Debug, Clone)]
pub enum ScanMsg {
    Progress(Progress),
    File { path: String, complexity: u64 },
    Done(TreeDataset),
    Error(String),
}

/// One measured source file, path relative to the scanned root with `/`
/// separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: String,
    pub complexity: u64,
}

pub struct Scanner {
    cancel: Arc<AtomicBool>,
}

impl Scanner {
    pub fn new(cancel: Arc<AtomicBool>) -> Self {
        Self { cancel }
    }

    /// Walks `root`, measures every file, and sends the resulting dataset as
    /// [`ScanMsg::Done`]. Missing git history is reported but not fatal: every
    /// file then counts as changed once.
    pub fn scan(&self, root: PathBuf, options: &ScanOptions, tx: Sender<ScanMsg>) {
        let changes = match git::change_counts(&root, options.days) {
            Ok(counts) => counts,
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "no change history");
                let _ = tx.send(ScanMsg::Error(e.to_string()));
                HashMap::new()
            }
        };

        let discovered = Arc::new(AtomicU64::new(0));
        let scanned = Arc::new(AtomicU64::new(0));
        let skipped = Arc::new(AtomicU64::new(0));
        let files: Arc<Mutex<Vec<ScannedFile>>> = Arc::new(Mutex::new(Vec::with_capacity(4096)));

        let mut builder = WalkBuilder::new(&root);
        builder
            .hidden(false)
            .git_global(false)
            .follow_links(false)
            .threads(num_cpus::get());

        let walker = builder.build_parallel();
        walker.run(|| {
            let cancel = self.cancel.clone();
            let tx = tx.clone();
            let root = root.clone();
            let discovered = discovered.clone();
            let scanned = scanned.clone();
            let skipped = skipped.clone();
            let files = files.clone();
            Box::new(move |entry| {
                if cancel.load(Ordering::Relaxed) {
                    return WalkState::Quit;
                }
                let ent = match entry {
                    Ok(ent) => ent,
                    Err(e) => {
                        let _ = tx.send(ScanMsg::Error(e.to_string()));
                        return WalkState::Continue;
                    }
                };
                if ent.file_type().is_some_and(|ft| ft.is_dir()) {
                    // Patterns like `/.git/` need the trailing separator to match a directory.
                    return if options.is_excluded(&ent.path().join("")) {
                        WalkState::Skip
                    } else {
                        WalkState::Continue
                    };
                }
                if options.is_excluded(ent.path()) {
                    return WalkState::Continue;
                }
                if !ent.file_type().is_some_and(|ft| ft.is_file()) {
                    return WalkState::Continue;
                }

                discovered.fetch_add(1, Ordering::Relaxed);
                let complexity = file_complexity(ent.path());
                if complexity >= options.complexity_threshold {
                    skipped.fetch_add(1, Ordering::Relaxed);
                } else if let Some(path) = relative_path(&root, ent.path()) {
                    let _ = tx.send(ScanMsg::File {
                        path: path.clone(),
                        complexity,
                    });
                    files.lock().push(ScannedFile { path, complexity });
                }
                scanned.fetch_add(1, Ordering::Relaxed);
                let _ = tx.send(ScanMsg::Progress(Progress {
                    discovered: discovered.load(Ordering::Relaxed),
                    scanned: scanned.load(Ordering::Relaxed),
                    skipped: skipped.load(Ordering::Relaxed),
                }));
                WalkState::Continue
            })
        });

        let mut files = std::mem::take(&mut *files.lock());
        // The parallel walk visits entries in no particular order.
        files.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::info!(
            root = %root.display(),
            files = files.len(),
            skipped = skipped.load(Ordering::Relaxed),
            "scan finished"
        );
        let dataset = build_dataset(&files, &changes, options);
        let _ = tx.send(ScanMsg::Done(dataset));
    }
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Indentation complexity: one plus the leading whitespace of every line.
/// Deeply nested code scores high regardless of the language it is in.
pub fn indentation_complexity(text: &str) -> u64 {
    1 + text
        .split_inclusive('\n')
        .map(|line| {
            let rest = line.trim_start();
            line[..line.len() - rest.len()].chars().count() as u64
        })
        .sum::<u64>()
}

/// Complexity of a file on disk. Binary content only counts up to the first
/// invalid UTF-8 sequence; unreadable files score the minimum.
pub fn file_complexity(path: &Path) -> u64 {
    let Ok(bytes) = std::fs::read(path) else {
        return 1;
    };
    match std::str::from_utf8(&bytes) {
        Ok(text) => indentation_complexity(text),
        Err(e) => {
            let valid = &bytes[..e.valid_up_to()];
            indentation_complexity(std::str::from_utf8(valid).unwrap_or_default())
        }
    }
}

/// Assembles the nested tree the diagram consumes from a flat list of files.
pub fn build_dataset(files: &[ScannedFile], changes: &HashMap<String, u64>, options: &ScanOptions) -> TreeDataset {
    let mut root = TreeNode::dir("root", Vec::new());
    let mut changes_range: Option<(f64, f64)> = None;
    let mut complexity_range: Option<(f64, f64)> = None;

    for file in files {
        let changed = changes.get(&file.path).copied().unwrap_or(0).max(1) as f64;
        let complexity = file.complexity as f64;
        changes_range = Some(widen(changes_range, changed));
        complexity_range = Some(widen(complexity_range, complexity));

        let mut leaf = TreeNode::file(file.path.clone(), complexity, changed);
        leaf.repo_link = options.repo_link(&file.path);

        let parts: Vec<&str> = file.path.split('/').collect();
        let dirs = &parts[..parts.len() - 1];
        let mut node = &mut root;
        for (depth, dir) in dirs.iter().enumerate() {
            let idx = match node.children.iter().position(|c| !c.is_file() && c.name == *dir) {
                Some(idx) => idx,
                None => {
                    // Directories carry their full path so hosts can address them.
                    let mut child = TreeNode::dir(*dir, Vec::new());
                    child.path = parts[..=depth].join("/");
                    node.children.push(child);
                    node.children.len() - 1
                }
            };
            node = &mut node.children[idx];
        }
        node.children.push(leaf);
    }

    let (min_changes, max_changes) = changes_range.unwrap_or_default();
    let (min_complexity, max_complexity) = complexity_range.unwrap_or_default();
    TreeDataset {
        tree: Some(root),
        min_changes,
        max_changes,
        min_complexity,
        max_complexity,
    }
}

fn widen(range: Option<(f64, f64)>, v: f64) -> (f64, f64) {
    match range {
        Some((lo, hi)) => (lo.min(v), hi.max(v)),
        None => (v, v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, complexity: u64) -> ScannedFile {
        ScannedFile {
            path: path.to_string(),
            complexity,
        }
    }

    #[test]
    fn complexity_counts_leading_whitespace() {
        assert_eq!(indentation_complexity(""), 1);
        assert_eq!(indentation_complexity("fn main() {\n    x();\n}\n"), 5);
        // Blank lines count their newline, like a stripped empty line would.
        assert_eq!(indentation_complexity("a\n\nb"), 2);
        assert_eq!(indentation_complexity("\tif x:\n\t\treturn\n"), 4);
    }

    #[test]
    fn binary_files_count_valid_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, b"  a\n\xff\xfe  b\n").unwrap();
        assert_eq!(file_complexity(&path), 3);
        assert_eq!(file_complexity(&dir.path().join("missing")), 1);
    }

    #[test]
    fn dataset_nests_directories() {
        let files = vec![file("README.md", 3), file("src/lib.rs", 40), file("src/ui/view.rs", 12)];
        let changes = HashMap::from([("src/lib.rs".to_string(), 7)]);
        let options = ScanOptions {
            repo_url: Some("https://github.com/acme/app".into()),
            ..ScanOptions::default()
        };
        let dataset = build_dataset(&files, &changes, &options);
        let tree = dataset.tree.as_ref().unwrap();

        assert_eq!(tree.name, "root");
        assert_eq!(tree.children.len(), 2);
        let src = &tree.children[1];
        assert_eq!(src.name, "src");
        assert_eq!(src.path, "src");
        assert!(!src.is_file());
        assert_eq!(src.children[1].name, "ui");
        assert_eq!(src.children[1].path, "src/ui");
        assert!(!src.children[1].is_file());

        let lib = tree.find_leaf("src/lib.rs").unwrap();
        assert_eq!(lib.changes, 7.0);
        assert_eq!(lib.size, 40.0);
        assert_eq!(
            lib.repo_link.as_deref(),
            Some("https://github.com/acme/app/blame/master/src/lib.rs")
        );
        assert_eq!(tree.find_leaf("README.md").unwrap().changes, 1.0);

        assert_eq!((dataset.min_changes, dataset.max_changes), (1.0, 7.0));
        assert_eq!((dataset.min_complexity, dataset.max_complexity), (3.0, 40.0));
    }

    #[test]
    fn scan_of_plain_directory_still_builds_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("pkg")).unwrap();
        std::fs::write(dir.path().join("pkg/a.py"), "def f():\n    return 1\n").unwrap();
        std::fs::write(dir.path().join("package-lock.json"), "{}").unwrap();

        let (tx, rx) = crossbeam_channel::unbounded();
        let scanner = Scanner::new(Arc::new(AtomicBool::new(false)));
        scanner.scan(dir.path().to_path_buf(), &ScanOptions::default(), tx);

        let dataset = rx
            .iter()
            .find_map(|msg| match msg {
                ScanMsg::Done(d) => Some(d),
                _ => None,
            })
            .unwrap();
        let tree = dataset.tree.unwrap();
        let leaf = tree.find_leaf("pkg/a.py").unwrap();
        assert_eq!(leaf.size, 5.0);
        assert!(tree.find_leaf("package-lock.json").is_none());
    }

    #[test]
    fn scanning_a_subdirectory_keeps_its_history() {
        if !crate::git::fixture::git_available() {
            return;
        }
        let repo = crate::git::fixture::nested_repo();

        let (tx, rx) = crossbeam_channel::unbounded();
        let scanner = Scanner::new(Arc::new(AtomicBool::new(false)));
        scanner.scan(repo.path().join("pkg"), &ScanOptions::default(), tx);

        let dataset = rx
            .iter()
            .find_map(|msg| match msg {
                ScanMsg::Done(d) => Some(d),
                _ => None,
            })
            .unwrap();
        let tree = dataset.tree.unwrap();
        assert_eq!(tree.find_leaf("a.py").unwrap().changes, 2.0);
        assert_eq!(dataset.max_changes, 2.0);
    }
}
