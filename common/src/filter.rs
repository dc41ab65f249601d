//! Glob-based key exclusion (`--exclude`).
//!
//! Patterns match the relative key; `*` crosses directory boundaries.
//! A pattern without a `/` also matches against the bare object name, so
//! `--exclude "*.log"` drops `a/b/debug.log`.

use anyhow::{anyhow, Context, Result};

#[derive(Debug, Clone)]
struct ExcludePattern {
    original: String,
    matcher: globset::GlobMatcher,
}

impl ExcludePattern {
    fn parse(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(anyhow!("empty exclude pattern is not allowed"));
        }
        let glob = globset::Glob::new(pattern)
            .with_context(|| format!("invalid exclude pattern: {}", pattern))?;
        Ok(Self {
            original: pattern.to_string(),
            matcher: glob.compile_matcher(),
        })
    }

    fn matches(&self, key: &str) -> bool {
        if self.matcher.is_match(key) {
            return true;
        }
        if !self.original.contains('/') {
            if let Some((_, name)) = key.rsplit_once('/') {
                return self.matcher.is_match(name);
            }
        }
        false
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterSettings {
    excludes: Vec<ExcludePattern>,
}

impl FilterSettings {
    pub fn parse(patterns: &[String]) -> Result<Self> {
        let excludes = patterns
            .iter()
            .map(|pattern| ExcludePattern::parse(pattern))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { excludes })
    }

    /// True when `key` should be left out of the sync entirely.
    pub fn excludes(&self, key: &str) -> bool {
        self.excludes.iter().any(|pattern| pattern.matches(key))
    }

    pub fn is_empty(&self) -> bool {
        self.excludes.is_empty()
    }
}
