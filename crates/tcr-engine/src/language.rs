//! Source-language collaborator: classifies the workspace into source
//! and test directories, which drives both the watch set and the
//! selective revert (test directories are never restored).

use std::path::{Path, PathBuf};

use crate::domain::{Result, TcrError};

/// Workspace layout knowledge consumed by the cycle and the watcher.
pub trait Language: Send + Sync {
    fn name(&self) -> &str;

    /// Directories holding implementation code, relative to the base
    /// directory. These are restored on a failing cycle.
    fn src_dirs(&self) -> Vec<PathBuf>;

    /// Directories holding test code, relative to the base directory.
    /// These are never restored.
    fn test_dirs(&self) -> Vec<PathBuf>;

    /// Whether a path looks like a file of this language, by extension.
    fn is_language_file(&self, path: &Path) -> bool;

    /// Whether a path is an implementation (non-test) source file.
    fn is_src_file(&self, path: &Path) -> bool;

    /// Absolute directories the file watcher should observe.
    fn dirs_to_watch(&self) -> Vec<PathBuf>;
}

/// A built-in language layout rooted at a base directory.
#[derive(Debug)]
pub struct KnownLanguage {
    name: &'static str,
    extensions: &'static [&'static str],
    src_dirs: &'static [&'static str],
    test_dirs: &'static [&'static str],
    base_dir: PathBuf,
}

impl KnownLanguage {
    pub fn rust(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: "rust",
            extensions: &["rs"],
            src_dirs: &["src"],
            test_dirs: &["tests"],
            base_dir: base_dir.into(),
        }
    }

    pub fn go(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: "go",
            extensions: &["go"],
            src_dirs: &["src"],
            test_dirs: &["test"],
            base_dir: base_dir.into(),
        }
    }

    pub fn java(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: "java",
            extensions: &["java"],
            src_dirs: &["src/main/java"],
            test_dirs: &["src/test/java"],
            base_dir: base_dir.into(),
        }
    }

    /// Detect the language of a workspace from its marker files.
    pub fn detect(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        if base_dir.join("Cargo.toml").exists() {
            Ok(Self::rust(base_dir))
        } else if base_dir.join("go.mod").exists() {
            Ok(Self::go(base_dir))
        } else if base_dir.join("pom.xml").exists() || base_dir.join("build.gradle").exists() {
            Ok(Self::java(base_dir))
        } else {
            Err(TcrError::Configuration(format!(
                "no supported language detected in {}",
                base_dir.display()
            )))
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The path relative to the base directory, if it lives under it.
    fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        if path.is_absolute() {
            path.strip_prefix(&self.base_dir).ok()
        } else {
            Some(path)
        }
    }

    fn is_under(relative: &Path, dirs: &[&str]) -> bool {
        dirs.iter().any(|dir| relative.starts_with(dir))
    }
}

impl Language for KnownLanguage {
    fn name(&self) -> &str {
        self.name
    }

    fn src_dirs(&self) -> Vec<PathBuf> {
        self.src_dirs.iter().map(PathBuf::from).collect()
    }

    fn test_dirs(&self) -> Vec<PathBuf> {
        self.test_dirs.iter().map(PathBuf::from).collect()
    }

    fn is_language_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.contains(&ext))
            .unwrap_or(false)
    }

    fn is_src_file(&self, path: &Path) -> bool {
        if !self.is_language_file(path) {
            return false;
        }
        match self.relative(path) {
            // Test dirs win over src dirs when nested (java layout).
            Some(relative) => {
                !Self::is_under(relative, self.test_dirs)
                    && Self::is_under(relative, self.src_dirs)
            }
            None => false,
        }
    }

    fn dirs_to_watch(&self) -> Vec<PathBuf> {
        self.src_dirs
            .iter()
            .chain(self.test_dirs.iter())
            .map(|dir| self.base_dir.join(dir))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_rust_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();
        let language = KnownLanguage::detect(dir.path()).unwrap();
        assert_eq!(language.name(), "rust");
    }

    #[test]
    fn test_detect_go_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module x").unwrap();
        assert_eq!(KnownLanguage::detect(dir.path()).unwrap().name(), "go");
    }

    #[test]
    fn test_detect_fails_on_unknown_layout() {
        let dir = tempfile::tempdir().unwrap();
        let err = KnownLanguage::detect(dir.path()).unwrap_err();
        assert!(matches!(err, TcrError::Configuration(_)));
    }

    #[test]
    fn test_rust_classification() {
        let language = KnownLanguage::rust("/repo");
        assert!(language.is_src_file(Path::new("/repo/src/lib.rs")));
        assert!(language.is_src_file(Path::new("src/engine/cycle.rs")));
        assert!(!language.is_src_file(Path::new("/repo/tests/integration.rs")));
        assert!(!language.is_src_file(Path::new("/repo/src/data.json")));
        assert!(!language.is_src_file(Path::new("/elsewhere/src/lib.rs")));
    }

    #[test]
    fn test_java_nested_test_dir_wins() {
        let language = KnownLanguage::java("/repo");
        assert!(language.is_src_file(Path::new("/repo/src/main/java/App.java")));
        assert!(!language.is_src_file(Path::new("/repo/src/test/java/AppTest.java")));
    }

    #[test]
    fn test_language_file_by_extension() {
        let language = KnownLanguage::rust("/repo");
        assert!(language.is_language_file(Path::new("anywhere/foo.rs")));
        assert!(!language.is_language_file(Path::new("anywhere/foo.toml")));
        assert!(!language.is_language_file(Path::new("Makefile")));
    }

    #[test]
    fn test_dirs_to_watch_are_absolute() {
        let language = KnownLanguage::rust("/repo");
        let dirs = language.dirs_to_watch();
        assert_eq!(
            dirs,
            vec![PathBuf::from("/repo/src"), PathBuf::from("/repo/tests")]
        );
    }
}
