//! Repository walk producing candidate source files.
//!
//! The walk is lazy and single-threaded. Directory pruning happens in
//! [`ignore::WalkBuilder::filter_entry`], so excluded trees such as
//! `node_modules` are never descended into.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use ignore::DirEntry;

use crate::hash::fingerprint;

/// Extensions treated as source files when no configuration overrides them.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "py", "js", "jsx", "ts", "tsx", "java", "cpp", "hpp", "c", "h", "cs", "go", "rb", "php",
    "swift", "kt", "tf", "toml",
];

/// Directory names pruned from every walk by default.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] =
    &[".git", "__pycache__", "venv", "node_modules", "build", "dist"];

/// Why a file that passed the extension filter was left out of a pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanSkip {
    #[error("content is not valid UTF-8")]
    NotUtf8,
    #[error("read failed: {0}")]
    Read(String),
    /// Nothing but whitespace within the embedded prefix.
    #[error("no text to embed")]
    Empty,
}

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Allowed extensions, with or without a leading dot. Matching is case-sensitive.
    pub extensions: Vec<String>,
    /// Directory names excluded at any depth.
    pub excluded_dirs: Vec<String>,
    pub respect_gitignore: bool,
    pub follow_links: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
            excluded_dirs: DEFAULT_EXCLUDED_DIRS
                .iter()
                .map(ToString::to_string)
                .collect(),
            respect_gitignore: false,
            follow_links: true,
        }
    }
}

/// A readable source file discovered during a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Repository-relative path with `/` separators.
    pub path: String,
    pub content: String,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanItem {
    File(ScannedFile),
    Skipped { path: String, reason: ScanSkip },
}

impl ScanItem {
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::File(file) => &file.path,
            Self::Skipped { path, .. } => path,
        }
    }
}

/// Walks a repository root and yields candidate files.
#[derive(Debug, Clone)]
pub struct FileScanner {
    root: PathBuf,
    extensions: Arc<HashSet<String>>,
    excluded_dirs: Arc<HashSet<String>>,
    respect_gitignore: bool,
    follow_links: bool,
}

impl FileScanner {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, config: ScannerConfig) -> Self {
        let extensions = config
            .extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_owned())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self {
            root: root.into(),
            extensions: Arc::new(extensions),
            excluded_dirs: Arc::new(config.excluded_dirs.into_iter().collect()),
            respect_gitignore: config.respect_gitignore,
            follow_links: config.follow_links,
        }
    }

    /// Lazily walk the root, yielding files in a stable (name-sorted) order.
    ///
    /// Unreadable and non-UTF-8 files come back as [`ScanItem::Skipped`].
    /// Walk errors such as broken symlinks or cycles are logged at debug and
    /// dropped. Each physical directory is entered at most once, even when
    /// several symlinks lead to it. A symlinked directory whose target lies
    /// inside the root is not followed, so files keep their real path.
    pub fn scan(&self) -> impl Iterator<Item = ScanItem> + '_ {
        let excluded = Arc::clone(&self.excluded_dirs);
        let visited: Arc<Mutex<HashSet<PathBuf>>> = Arc::default();
        let canonical_root = self.root.canonicalize().ok();
        if let Some(root) = &canonical_root {
            visited
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(root.clone());
        }
        let gitignore = self.respect_gitignore;

        ignore::WalkBuilder::new(&self.root)
            .hidden(false)
            .ignore(false)
            .parents(gitignore)
            .git_ignore(gitignore)
            .git_exclude(gitignore)
            .git_global(gitignore)
            .require_git(false)
            .follow_links(self.follow_links)
            .sort_by_file_name(Ord::cmp)
            .filter_entry(move |entry| {
                keep_entry(entry, canonical_root.as_deref(), &excluded, &visited)
            })
            .build()
            .filter_map(move |entry| match entry {
                Ok(entry) => self.visit(&entry),
                Err(e) => {
                    tracing::debug!("walk entry skipped: {e}");
                    None
                }
            })
    }

    fn visit(&self, entry: &DirEntry) -> Option<ScanItem> {
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            return None;
        }
        let ext = entry.path().extension()?.to_str()?;
        if !self.extensions.contains(ext) {
            return None;
        }

        let path = relative_path(&self.root, entry.path());
        let bytes = match std::fs::read(entry.path()) {
            Ok(bytes) => bytes,
            Err(e) => {
                return Some(ScanItem::Skipped {
                    path,
                    reason: ScanSkip::Read(e.kind().to_string()),
                });
            }
        };
        let fingerprint = fingerprint(&bytes);
        match String::from_utf8(bytes) {
            Ok(content) => Some(ScanItem::File(ScannedFile {
                path,
                content,
                fingerprint,
            })),
            Err(_) => Some(ScanItem::Skipped {
                path,
                reason: ScanSkip::NotUtf8,
            }),
        }
    }
}

fn keep_entry(
    entry: &DirEntry,
    root: Option<&Path>,
    excluded: &HashSet<String>,
    visited: &Mutex<HashSet<PathBuf>>,
) -> bool {
    if !entry.file_type().is_some_and(|ft| ft.is_dir()) {
        return true;
    }
    if entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| excluded.contains(name))
    {
        return false;
    }
    let Ok(canonical) = entry.path().canonicalize() else {
        return false;
    };
    // The real directory is reached by the walk itself.
    if entry.depth() > 0
        && entry.path_is_symlink()
        && root.is_some_and(|root| canonical.starts_with(root))
    {
        return false;
    }
    visited
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(canonical)
}

/// Repository-relative path joined with `/` on every platform.
fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
