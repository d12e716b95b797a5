//! Include/exclude glob matching for local resource collection

use std::path::Path;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::error::{Result, SyncError};

/// Resource-specific include and exclude patterns, matched against paths
/// relative to the collection root
#[derive(Debug, Clone)]
pub struct GlobFilter {
    include_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl GlobFilter {
    /// Build a filter; an empty include list matches nothing
    pub fn new(include_patterns: &[String], exclude_patterns: &[String]) -> Result<Self> {
        let include_set = Self::build_globset(include_patterns)?;
        let exclude_set = if exclude_patterns.is_empty() {
            None
        } else {
            Some(Self::build_globset(exclude_patterns)?)
        };

        Ok(Self {
            include_set,
            exclude_set,
        })
    }

    /// Check if a relative path is selected
    pub fn matches(&self, relative_path: &Path) -> bool {
        if !self.include_set.is_match(relative_path) {
            return false;
        }

        match &self.exclude_set {
            Some(exclude_set) => !exclude_set.is_match(relative_path),
            None => true,
        }
    }

    fn build_globset(patterns: &[String]) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            let compiled_glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| {
                    SyncError::FilterPattern(format!("Failed to compile glob '{}': {}", pattern, e))
                })?;

            builder.add(compiled_glob);
        }

        builder.build().map_err(|e| {
            SyncError::FilterPattern(format!("Failed to build globset: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use test_case::test_case;

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test_case("index.html", true ; "top level file")]
    #[test_case("css/site.css", true ; "nested file")]
    #[test_case("js/app.js.map", false ; "excluded map")]
    #[test_case(".DS_Store", false ; "excluded dotfile")]
    fn test_include_exclude(path: &str, expected: bool) {
        let filter = GlobFilter::new(&patterns(&["**/*"]), &patterns(&["**/*.map", "**/.DS_Store"])).unwrap();
        assert_eq!(filter.matches(&PathBuf::from(path)), expected);
    }

    #[test]
    fn test_literal_separator() {
        let filter = GlobFilter::new(&patterns(&["*.lua"]), &[]).unwrap();
        assert!(filter.matches(Path::new("api.lua")));
        assert!(!filter.matches(Path::new("nested/api.lua")));
    }

    #[test]
    fn test_empty_include_matches_nothing() {
        let filter = GlobFilter::new(&[], &[]).unwrap();
        assert!(!filter.matches(Path::new("anything")));
    }

    #[test]
    fn test_invalid_pattern() {
        let result = GlobFilter::new(&patterns(&["a[b"]), &[]);
        assert!(matches!(result, Err(SyncError::FilterPattern(_))));
    }
}
