//! Exclude pattern matching for sync operations.
//!
//! Patterns are glob-style and matched against the relative path of a
//! change. Directory paths carry a trailing `/` by the time they reach the
//! matcher, so directory-level excludes behave the same no matter how the
//! raw event source spelled the path.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled exclude pattern set.
///
/// Built once at startup and immutable afterwards. The raw pattern strings
/// are kept alongside the compiled set so they can be re-rendered as
/// `--exclude=` arguments for the transfer tool.
#[derive(Debug, Clone)]
pub struct ExcludePatterns {
    glob_set: GlobSet,
    patterns: Vec<String>,
}

impl Default for ExcludePatterns {
    fn default() -> Self {
        Self {
            glob_set: GlobSet::empty(),
            patterns: Vec::new(),
        }
    }
}

impl ExcludePatterns {
    /// Compile a list of glob patterns. Fails on the first invalid pattern.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        let mut pattern_list = Vec::new();

        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = Glob::new(pattern)
                .with_context(|| format!("invalid exclude pattern: {}", pattern))?;
            builder.add(glob);
            pattern_list.push(pattern.to_string());
        }

        Ok(Self {
            glob_set: builder.build()?,
            patterns: pattern_list,
        })
    }

    /// Parse the pipe-separated form used on the command line
    /// (e.g. `target/**|*.swp`). Empty segments are skipped.
    pub fn parse(spec: &str) -> Result<Self> {
        let patterns: Vec<&str> = spec.split('|').filter(|p| !p.is_empty()).collect();
        Self::from_patterns(&patterns)
    }

    /// Check whether a relative path matches any configured pattern.
    ///
    /// Logical OR over all patterns, no negation support. Pure function.
    pub fn is_excluded(&self, relative_path: &str) -> bool {
        self.glob_set.is_match(relative_path)
    }

    /// Raw pattern strings, in configuration order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_patterns() {
        let excludes = ExcludePatterns::from_patterns(&["*.swp", "target/**"]).unwrap();

        assert!(excludes.is_excluded("file.swp"));
        assert!(excludes.is_excluded("target/debug/app"));

        assert!(!excludes.is_excluded("src/main.rs"));
        assert!(!excludes.is_excluded("README.md"));
    }

    #[test]
    fn test_first_match_wins() {
        let excludes = ExcludePatterns::from_patterns(&["*.log", "*.tmp"]).unwrap();

        assert!(excludes.is_excluded("debug.log"));
        assert!(excludes.is_excluded("scratch.tmp"));
        assert!(!excludes.is_excluded("notes.txt"));
    }

    #[test]
    fn test_directory_trailing_slash() {
        let excludes = ExcludePatterns::from_patterns(&["build/"]).unwrap();

        // Directory events arrive normalized with a trailing separator.
        assert!(excludes.is_excluded("build/"));
        // A bare file named like the directory does not match.
        assert!(!excludes.is_excluded("build"));
    }

    #[test]
    fn test_empty_set_excludes_nothing() {
        let excludes = ExcludePatterns::default();

        assert!(!excludes.is_excluded("anything"));
        assert!(excludes.is_empty());
    }

    #[test]
    fn test_parse_pipe_separated() {
        let excludes = ExcludePatterns::parse("*.log|target/**||*.swp").unwrap();

        assert_eq!(excludes.patterns(), &["*.log", "target/**", "*.swp"]);
        assert!(excludes.is_excluded("a.log"));
        assert!(excludes.is_excluded("x.swp"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(ExcludePatterns::from_patterns(&["["]).is_err());
    }
}
