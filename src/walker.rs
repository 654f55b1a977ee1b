//! Source discovery: find the result files of one category under a variant root.
//!
//! Layout is `<root>/<category>/N_<size><suffix>`, e.g. `resultadosT1/flops/N_256.txt`.
//! Only names starting with `N_` are candidates; a candidate whose size does not
//! parse is reported back as skipped rather than silently dropped.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Candidate file name prefix.
pub const SIZE_PREFIX: &str = "N_";

static SIZE_IN_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^N_(\d+)").unwrap());

/// A result file with its decoded problem size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub size: u64,
}

/// Files found in one category directory, in name order.
#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<SourceFile>,
    /// Candidates whose name does not encode a positive size.
    pub skipped: Vec<PathBuf>,
    /// Entries that could not be inspected, with the error text.
    pub failed: Vec<(PathBuf, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootState {
    Present,
    Missing,
}

/// Where the aggregator gets its files from.
pub trait SourceWalker {
    /// Classify a variant root. An existing root that is not a readable
    /// directory is an error.
    fn check_root(&self, root: &Path) -> Result<RootState, WalkError>;

    /// List the candidate files of `category` under `root`.
    ///
    /// Returns `Ok(None)` when the category directory does not exist.
    fn discover(&self, root: &Path, category: &str) -> Result<Option<Discovery>, WalkError>;

    /// Read one file's full text.
    fn read(&self, file: &SourceFile) -> Result<String, WalkError>;
}

/// Decode the problem size from a file name like `N_1024.log`.
pub fn parse_size(file_name: &str) -> Option<u64> {
    let caps = SIZE_IN_NAME.captures(file_name)?;
    let size: u64 = caps[1].parse().ok()?;
    (size > 0).then_some(size)
}

/// Walks the real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsWalker;

impl FsWalker {
    pub fn new() -> Self {
        FsWalker
    }
}

impl SourceWalker for FsWalker {
    fn check_root(&self, root: &Path) -> Result<RootState, WalkError> {
        if !root.exists() {
            return Ok(RootState::Missing);
        }
        if !root.is_dir() {
            return Err(WalkError::NotADirectory {
                path: root.to_path_buf(),
            });
        }
        std::fs::read_dir(root).map_err(|e| WalkError::Io {
            path: root.to_path_buf(),
            source: e,
        })?;
        Ok(RootState::Present)
    }

    fn discover(&self, root: &Path, category: &str) -> Result<Option<Discovery>, WalkError> {
        let dir = root.join(category);
        if !dir.exists() {
            return Ok(None);
        }
        if !dir.is_dir() {
            return Err(WalkError::NotADirectory { path: dir });
        }

        let pattern = format!(
            "{}/{SIZE_PREFIX}*",
            glob::Pattern::escape(&dir.to_string_lossy())
        );
        let entries = glob::glob(&pattern).map_err(|e| WalkError::Pattern {
            pattern: pattern.clone(),
            detail: e.to_string(),
        })?;

        let mut discovery = Discovery::default();
        for entry in entries {
            let path = match entry {
                Ok(p) => p,
                Err(e) => {
                    discovery
                        .failed
                        .push((e.path().to_path_buf(), e.error().to_string()));
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            let size = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_size);
            match size {
                Some(size) => discovery.files.push(SourceFile { path, size }),
                None => discovery.skipped.push(path),
            }
        }
        discovery.files.sort_by(|a, b| a.path.cmp(&b.path));
        discovery.skipped.sort();
        Ok(Some(discovery))
    }

    fn read(&self, file: &SourceFile) -> Result<String, WalkError> {
        std::fs::read_to_string(&file.path).map_err(|e| WalkError::Io {
            path: file.path.clone(),
            source: e,
        })
    }
}

/// Errors from filesystem walking.
#[derive(Debug)]
pub enum WalkError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    NotADirectory {
        path: PathBuf,
    },
    Pattern {
        pattern: String,
        detail: String,
    },
}

impl std::fmt::Display for WalkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalkError::Io { path, source } => write!(f, "{}: {source}", path.display()),
            WalkError::NotADirectory { path } => {
                write!(f, "{} is not a directory", path.display())
            }
            WalkError::Pattern { pattern, detail } => {
                write!(f, "bad glob pattern '{pattern}': {detail}")
            }
        }
    }
}

impl std::error::Error for WalkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WalkError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("N_64"), Some(64));
        assert_eq!(parse_size("N_1024.txt"), Some(1024));
        assert_eq!(parse_size("N_256_run2.log"), Some(256));
        assert_eq!(parse_size("N_0.txt"), None);
        assert_eq!(parse_size("N_abc"), None);
        assert_eq!(parse_size("N_"), None);
        assert_eq!(parse_size("xN_64"), None);
        assert_eq!(parse_size("N_99999999999999999999999"), None);
    }

    #[test]
    fn test_check_root() {
        let dir = tempdir().unwrap();
        let walker = FsWalker::new();
        assert_eq!(walker.check_root(dir.path()).unwrap(), RootState::Present);
        assert_eq!(
            walker.check_root(&dir.path().join("missing")).unwrap(),
            RootState::Missing
        );

        let file = dir.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();
        let err = walker.check_root(&file).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_discover_missing_category() {
        let dir = tempdir().unwrap();
        let found = FsWalker::new().discover(dir.path(), "flops").unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = tempdir().unwrap();
        let cat = dir.path().join("mem");
        std::fs::create_dir_all(cat.join("N_7_subdir")).unwrap();
        for name in ["N_512.txt", "N_64.txt", "N_bad.txt", "README", "N_0.txt"] {
            std::fs::write(cat.join(name), "").unwrap();
        }

        let found = FsWalker::new().discover(dir.path(), "mem").unwrap().unwrap();
        let sizes: Vec<u64> = found.files.iter().map(|f| f.size).collect();
        // Name order, not numeric order; the aggregator sorts by size.
        assert_eq!(sizes, vec![512, 64]);
        let skipped: Vec<String> = found
            .skipped
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(skipped, vec!["N_0.txt", "N_bad.txt"]);
    }

    #[test]
    fn test_discover_category_that_is_a_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("mem"), "not a directory").unwrap();
        let err = FsWalker::new().discover(dir.path(), "mem").unwrap_err();
        assert!(matches!(err, WalkError::NotADirectory { .. }));
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_discover_root_with_glob_characters() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("run[1]");
        std::fs::create_dir_all(root.join("l2")).unwrap();
        std::fs::write(root.join("l2").join("N_32"), "").unwrap();

        let found = FsWalker::new().discover(&root, "l2").unwrap().unwrap();
        assert_eq!(found.files.len(), 1);
        assert_eq!(found.files[0].size, 32);
    }

    #[test]
    fn test_read_invalid_utf8_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("N_8");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        let file = SourceFile { path, size: 8 };
        assert!(FsWalker::new().read(&file).is_err());
    }

    #[test]
    fn test_read_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("N_8");
        std::fs::write(&path, "0.1\n0.2\n").unwrap();
        let file = SourceFile { path, size: 8 };
        assert_eq!(FsWalker::new().read(&file).unwrap(), "0.1\n0.2\n");
    }
}
