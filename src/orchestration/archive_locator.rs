//! Archive Locator - resolves the built archive glob inside the build directory

use crate::core::error::DeployError;
use globset::{GlobBuilder, GlobMatcher};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Finds built archives matching a filename pattern
///
/// The pattern is relative to the build directory and may contain
/// `{package}` and `{platform}` placeholders plus glob wildcards. A `*` never
/// crosses a `/`, so `{platform}/{package}-*.tar.bz2` only looks one level down.
/// The walk is limited to the pattern's own depth unless it contains `**`.
#[derive(Debug, Clone)]
pub struct ArchiveLocator {
    build_dir: PathBuf,
    pattern: String,
}

impl ArchiveLocator {
    pub fn new<P: AsRef<Path>>(build_dir: P, pattern: impl Into<String>) -> Self {
        Self {
            build_dir: build_dir.as_ref().to_path_buf(),
            pattern: pattern.into(),
        }
    }

    /// Pattern with placeholders substituted, relative to the build directory
    pub fn resolved_pattern(&self, package: &str, platform: &str) -> String {
        self.pattern
            .replace("{package}", package)
            .replace("{platform}", platform)
    }

    /// Full pattern for messages
    pub fn display_pattern(&self, package: &str, platform: &str) -> String {
        self.build_dir
            .join(self.resolved_pattern(package, platform))
            .display()
            .to_string()
    }

    /// Locate all matching archives, sorted by path.
    ///
    /// # Errors
    ///
    /// - `DeployError::ArchiveNotFound` - No file matched, or the build directory is missing
    /// - `DeployError::Config` - The pattern is not a valid glob
    pub fn locate(&self, package: &str, platform: &str) -> Result<Vec<PathBuf>, DeployError> {
        let pattern = self.resolved_pattern(package, platform);
        let matcher = Self::compile(&pattern)?;

        if !self.build_dir.is_dir() {
            tracing::debug!(build_dir = %self.build_dir.display(), "build directory does not exist");
            return Err(DeployError::ArchiveNotFound {
                pattern: self.display_pattern(package, platform),
            });
        }

        let mut walker = WalkDir::new(&self.build_dir).min_depth(1);
        if !pattern.contains("**") {
            walker = walker.max_depth(Path::new(&pattern).components().count().max(1));
        }

        let mut archives: Vec<PathBuf> = walker
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.build_dir)
                    .map(|relative| matcher.is_match(relative))
                    .unwrap_or(false)
            })
            .map(|entry| entry.into_path())
            .collect();

        if archives.is_empty() {
            return Err(DeployError::ArchiveNotFound {
                pattern: self.display_pattern(package, platform),
            });
        }

        archives.sort();
        tracing::debug!(count = archives.len(), pattern = %pattern, "located archives");
        Ok(archives)
    }

    fn compile(pattern: &str) -> Result<GlobMatcher, DeployError> {
        GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map(|glob| glob.compile_matcher())
            .map_err(|e| DeployError::config(format!("invalid archive pattern {:?}: {}", pattern, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DEFAULT_ARCHIVE_PATTERN;
    use tempfile::TempDir;

    fn touch(dir: &Path, relative: &str) -> PathBuf {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, b"archive").unwrap();
        path
    }

    #[test]
    fn test_locates_single_archive() {
        let build_dir = TempDir::new().unwrap();
        let expected = touch(build_dir.path(), "mypkg-1.0-linux-64.tar.bz2");
        touch(build_dir.path(), "otherpkg-1.0-linux-64.tar.bz2");
        touch(build_dir.path(), "mypkg-1.0-osx-64.tar.bz2");

        let locator = ArchiveLocator::new(build_dir.path(), DEFAULT_ARCHIVE_PATTERN);
        let archives = locator.locate("mypkg", "linux-64").unwrap();

        assert_eq!(archives, vec![expected]);
    }

    #[test]
    fn test_locates_all_matches_sorted() {
        let build_dir = TempDir::new().unwrap();
        let second = touch(build_dir.path(), "mypkg-1.1-linux-64.tar.bz2");
        let first = touch(build_dir.path(), "mypkg-1.0-linux-64.tar.bz2");

        let locator = ArchiveLocator::new(build_dir.path(), DEFAULT_ARCHIVE_PATTERN);
        let archives = locator.locate("mypkg", "linux-64").unwrap();

        assert_eq!(archives, vec![first, second]);
    }

    #[test]
    fn test_zero_matches_is_archive_not_found() {
        let build_dir = TempDir::new().unwrap();
        touch(build_dir.path(), "otherpkg-1.0-linux-64.tar.bz2");

        let locator = ArchiveLocator::new(build_dir.path(), DEFAULT_ARCHIVE_PATTERN);
        match locator.locate("mypkg", "linux-64") {
            Err(DeployError::ArchiveNotFound { pattern }) => {
                assert!(pattern.ends_with("mypkg-*-linux-64.tar.bz2"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_build_dir_is_archive_not_found() {
        let locator = ArchiveLocator::new("/nonexistent/conda-bld", DEFAULT_ARCHIVE_PATTERN);
        assert!(matches!(
            locator.locate("mypkg", "linux-64"),
            Err(DeployError::ArchiveNotFound { .. })
        ));
    }

    #[test]
    fn test_wildcard_does_not_descend_into_subdirectories() {
        let build_dir = TempDir::new().unwrap();
        touch(build_dir.path(), "nested/mypkg-1.0-linux-64.tar.bz2");

        let locator = ArchiveLocator::new(build_dir.path(), DEFAULT_ARCHIVE_PATTERN);
        assert!(locator.locate("mypkg", "linux-64").is_err());
    }

    #[test]
    fn test_platform_subdirectory_pattern() {
        let build_dir = TempDir::new().unwrap();
        let expected = touch(build_dir.path(), "linux-64/mypkg-1.0-h123_0.tar.bz2");
        touch(build_dir.path(), "osx-64/mypkg-1.0-h123_0.tar.bz2");

        let locator = ArchiveLocator::new(build_dir.path(), "{platform}/{package}-*.tar.bz2");
        let archives = locator.locate("mypkg", "linux-64").unwrap();

        assert_eq!(archives, vec![expected]);
    }

    #[test]
    fn test_recursive_wildcard_searches_every_level() {
        let build_dir = TempDir::new().unwrap();
        let shallow = touch(build_dir.path(), "linux-64/mypkg-1.0-h1_0.tar.bz2");
        let deep = touch(build_dir.path(), "a/b/linux-64/mypkg-1.1-h1_0.tar.bz2");

        let locator = ArchiveLocator::new(build_dir.path(), "**/{platform}/{package}-*.tar.bz2");
        let archives = locator.locate("mypkg", "linux-64").unwrap();

        assert_eq!(archives, vec![deep, shallow]);
    }

    #[test]
    fn test_directories_are_not_archives() {
        let build_dir = TempDir::new().unwrap();
        std::fs::create_dir(build_dir.path().join("mypkg-1.0-linux-64.tar.bz2")).unwrap();

        let locator = ArchiveLocator::new(build_dir.path(), DEFAULT_ARCHIVE_PATTERN);
        assert!(locator.locate("mypkg", "linux-64").is_err());
    }

    #[test]
    fn test_invalid_glob_is_config_error() {
        let build_dir = TempDir::new().unwrap();
        let locator = ArchiveLocator::new(build_dir.path(), "{package}-[.tar.bz2");
        assert!(matches!(
            locator.locate("mypkg", "linux-64"),
            Err(DeployError::Config { .. })
        ));
    }
}
