use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use glob::{MatchOptions, Pattern};
use regex::Regex;

use crate::error::RuleError;

/// Matcher used by the `like` operator
pub trait PatternMatcher: Send + Sync + fmt::Debug {
    /// Whether the whole of `text` matches the pattern
    fn matches(&self, text: &str) -> bool;
}

/// Pattern language for `like`, selected by configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PatternSyntax {
    /// Regular expressions, case-insensitive, anchored at both ends
    #[default]
    Regex,
    /// Shell-style wildcards (`*`, `?`, `[...]`), case-insensitive
    Glob,
}

impl PatternSyntax {
    pub fn compile(&self, pattern: &str) -> Result<Arc<dyn PatternMatcher>, RuleError> {
        match self {
            Self::Regex => Ok(Arc::new(RegexMatcher::new(pattern)?)),
            Self::Glob => Ok(Arc::new(GlobMatcher::new(pattern)?)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regex => "regex",
            Self::Glob => "glob",
        }
    }
}

impl FromStr for PatternSyntax {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "regex" | "regexp" => Ok(Self::Regex),
            "glob" | "wildcard" => Ok(Self::Glob),
            _ => Err(RuleError::UnknownSyntax(s.to_string())),
        }
    }
}

impl fmt::Display for PatternSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Regular-expression matcher
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    pub fn new(pattern: &str) -> Result<Self, RuleError> {
        // Anchor so `like` matches the whole value, not a substring
        let regex = Regex::new(&format!("(?i)^(?:{})$", pattern)).map_err(|e| {
            RuleError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self { regex })
    }
}

impl PatternMatcher for RegexMatcher {
    fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Wildcard matcher
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    pattern: Pattern,
}

impl GlobMatcher {
    pub fn new(pattern: &str) -> Result<Self, RuleError> {
        let pattern = Pattern::new(pattern).map_err(|e| RuleError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { pattern })
    }
}

impl PatternMatcher for GlobMatcher {
    fn matches(&self, text: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        self.pattern.matches_with(text, options)
    }
}
