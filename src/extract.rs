//! Identifier extraction from line-oriented variant and genotype files.
//!
//! Handles raw genotype exports (`rsid chrom pos genotype`) and VCF bodies
//! alike: any whitespace-separated token that fully matches the identifier
//! pattern is collected, and comment/header lines are ignored.

use std::collections::BTreeSet;

use regex::Regex;
use sha2::{Digest, Sha256};

/// Default identifier pattern: dbSNP reference ids.
pub const DEFAULT_IDENTIFIER_PATTERN: &str = r"^rs\d+$";

/// Default comment marker for header and comment lines.
pub const DEFAULT_COMMENT_MARKER: &str = "#";

/// Extracts distinct candidate identifiers from file contents.
#[derive(Debug, Clone)]
pub struct IdentifierExtractor {
    pattern: Regex,
    comment_marker: String,
}

impl Default for IdentifierExtractor {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_IDENTIFIER_PATTERN).expect("default pattern is valid"),
            comment_marker: DEFAULT_COMMENT_MARKER.to_string(),
        }
    }
}

impl IdentifierExtractor {
    /// Build an extractor with a custom pattern and comment marker.
    ///
    /// The pattern is matched against whole tokens, so unanchored patterns
    /// are anchored here.
    pub fn new(pattern: &str, comment_marker: &str) -> Result<Self, regex::Error> {
        let anchored = match (pattern.starts_with('^'), pattern.ends_with('$')) {
            (true, true) => pattern.to_string(),
            (true, false) => format!("{}$", pattern),
            (false, true) => format!("^{}", pattern),
            (false, false) => format!("^(?:{})$", pattern),
        };
        Ok(Self {
            pattern: Regex::new(&anchored)?,
            comment_marker: comment_marker.to_string(),
        })
    }

    /// Extract the set of distinct identifiers in `content`.
    ///
    /// An empty result is not an error here; callers decide how to report
    /// "nothing to process".
    pub fn extract(&self, content: &str) -> BTreeSet<String> {
        content
            .lines()
            .map(str::trim_start)
            .filter(|line| !line.is_empty() && !self.is_comment(line))
            .flat_map(str::split_whitespace)
            .filter(|token| self.pattern.is_match(token))
            .map(str::to_string)
            .collect()
    }

    fn is_comment(&self, line: &str) -> bool {
        !self.comment_marker.is_empty() && line.starts_with(&self.comment_marker)
    }
}

/// Extract identifiers with the default pattern.
pub fn extract_identifiers(content: &str) -> BTreeSet<String> {
    IdentifierExtractor::default().extract(content)
}

/// SHA-256 over the sorted identifier list, one per line.
///
/// Stored on the session at creation so a resume can tell whether it was
/// handed the same identifier list.
pub fn identifier_digest(identifiers: &BTreeSet<String>) -> String {
    let mut hasher = Sha256::new();
    for id in identifiers {
        hasher.update(id.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
