//! Tolerated restore diagnostics

use crate::error::{Error, Result};
use regex::{Regex, RegexBuilder};

/// Pattern matching pg_restore's summary line when it skipped failing statements
pub const ERRORS_IGNORED_ON_RESTORE: &str = "errors ignored on restore";

/// Predicate over tool diagnostics deciding whether a non-zero exit is tolerated
///
/// pg_restore exits non-zero whenever a single statement fails, even when the
/// dump otherwise loaded. Those runs end with an "errors ignored on restore"
/// summary and are treated as warnings. Patterns match case-insensitively
/// anywhere in the diagnostic.
#[derive(Debug, Clone)]
pub struct BenignDiagnostics {
    patterns: Vec<Regex>,
}

impl BenignDiagnostics {
    /// Compile the given patterns
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first pattern that does not compile.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern.as_ref())
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        Error::config(
                            format!("invalid benign restore pattern '{}': {}", pattern.as_ref(), e),
                            "benign_restore_patterns",
                        )
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// A predicate that tolerates nothing
    pub fn none() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// Whether `diagnostic` matches any tolerated pattern
    pub fn is_benign(&self, diagnostic: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(diagnostic))
    }
}

impl Default for BenignDiagnostics {
    fn default() -> Self {
        Self::from_patterns(&[ERRORS_IGNORED_ON_RESTORE]).unwrap_or_else(|_| Self::none())
    }
}
