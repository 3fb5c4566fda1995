//! Extraction of citation URLs and category tags from revision text.
//!
//! A single combined regex pass over the body picks up either a target-host
//! citation URL (terminated by whitespace or a `|`, so wikilink pipes don't
//! leak into the URL) or a `[[Category:...]]` marker. This is pattern
//! matching, not a markup parser; it lives behind [`CitationScanner`] so a
//! real parser could replace it without touching the diff engine or the
//! aggregator.

use std::collections::BTreeSet;

use compact_str::CompactString;
use regex::Regex;

use crate::dump_parser::{Editor, Revision};

/// Chronicling America, the Library of Congress newspaper archive.
pub const DEFAULT_CITATION_HOST: &str = "chroniclingamerica.loc.gov";

/// Compiled extraction pattern for one citation host.
#[derive(Debug, Clone)]
pub struct CitationScanner {
    pattern: Regex,
}

impl Default for CitationScanner {
    fn default() -> Self {
        Self::for_host(DEFAULT_CITATION_HOST)
    }
}

impl CitationScanner {
    /// Builds a scanner for citation links on `host`.
    pub fn for_host(host: &str) -> Self {
        // capture 1: the citation URL, up to whitespace or a pipe
        // capture 2: a category name
        let pattern = Regex::new(&format!(
            r"(https?://{}/[^\s|]+)|(?:\[\[Category:(.*?)\]\])",
            regex::escape(host)
        ))
        .expect("escaped host always forms a valid pattern");
        Self { pattern }
    }

    /// Scans a body once, returning the deduplicated URL set and the
    /// category tags in document order.
    fn scan(&self, text: &str) -> (BTreeSet<String>, Vec<String>) {
        let mut urls = BTreeSet::new();
        let mut categories = Vec::new();

        for captures in self.pattern.captures_iter(text) {
            if let Some(url) = captures.get(1) {
                urls.insert(url.as_str().to_owned());
            } else if let Some(category) = captures.get(2) {
                categories.push(category.as_str().to_owned());
            }
        }

        (urls, categories)
    }
}

/// Everything the analysis needs to know about one revision, derived once
/// and never mutated.
///
/// `citation_urls` and `categories` are purely a function of `text`; they
/// are recomputed for every revision, never inherited from the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionFacts {
    pub id: CompactString,
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
    pub editor: Editor,
    pub comment: Option<CompactString>,
    /// Revision body; an absent body in the export becomes the empty string
    /// here, so diffing sees a deletion rather than "no change".
    pub text: String,
    /// Set semantics: a URL cited twice counts once. `BTreeSet` keeps
    /// iteration (and thus report output) deterministic.
    pub citation_urls: BTreeSet<String>,
    /// Document order, not deduplicated; a category can legitimately repeat
    /// across separate markers.
    pub categories: Vec<String>,
}

impl RevisionFacts {
    /// Derives the facts for one raw revision.
    pub fn extract(revision: &Revision, scanner: &CitationScanner) -> Self {
        let text = revision.text.clone().unwrap_or_default();
        let (citation_urls, categories) = scanner.scan(&text);

        Self {
            id: revision.id.clone(),
            timestamp: revision.timestamp,
            editor: revision.editor.clone(),
            comment: revision.comment.clone(),
            text,
            citation_urls,
            categories,
        }
    }

    /// Synthetic predecessor of the first revision in a page: empty body,
    /// empty URL set.
    pub fn start_of_page() -> Self {
        Self {
            id: CompactString::default(),
            timestamp: None,
            editor: Editor::Unknown,
            comment: None,
            text: String::new(),
            citation_urls: BTreeSet::new(),
            categories: Vec::new(),
        }
    }
}
