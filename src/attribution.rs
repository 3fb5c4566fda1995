//! Per-page analysis: citation-change detection and per-editor attribution.
//!
//! A page is processed as a small state machine seeded with a synthetic
//! empty predecessor. Every revision is diffed against its predecessor's
//! full text (feeding the editor's tally) and has its citation-URL set
//! compared against the predecessor's (possibly firing a
//! [`CitationChangeEvent`]). All accumulation state is owned by one
//! [`analyse_page`] call and dropped when it returns; nothing is shared
//! across pages, so pages can be analysed in parallel freely.

use std::collections::BTreeSet;

use compact_str::CompactString;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::diff::char_diff;
use crate::dump_parser::{Editor, Page};
use crate::extract::{CitationScanner, RevisionFacts};
use crate::report::page_url;

/// Citation URLs that entered and left between two consecutive revisions
/// (standard set difference, both directions).
pub fn citation_delta(
    previous: &RevisionFacts,
    current: &RevisionFacts,
) -> (BTreeSet<String>, BTreeSet<String>) {
    let added = current
        .citation_urls
        .difference(&previous.citation_urls)
        .cloned()
        .collect();
    let deleted = previous
        .citation_urls
        .difference(&current.citation_urls)
        .cloned()
        .collect();
    (added, deleted)
}

/// Fired for every revision whose citation-URL set differs from its
/// predecessor's. Category-only and comment-only edits never fire one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationChangeEvent {
    pub page_title: CompactString,
    pub page_url: String,
    pub revision_id: CompactString,
    pub editor: Editor,
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
    pub comment: Option<CompactString>,
    pub added_urls: usize,
    pub deleted_urls: usize,
    /// The full citation-URL set of the current revision.
    pub urls: BTreeSet<String>,
    /// The full category sequence of the current revision.
    pub categories: Vec<String>,
}

/// Running character totals for one editor on one page. Created lazily on
/// the editor's first contribution; dropped with the page's analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditorTally {
    pub added_chars: usize,
    pub deleted_chars: usize,
}

impl EditorTally {
    fn churn(&self) -> usize {
        self.added_chars + self.deleted_chars
    }
}

/// Summary line for one coincident editor.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorSummary {
    pub editor: Editor,
    pub added_chars: usize,
    pub deleted_chars: usize,
    /// Share of the page-wide churn, in percent. A page with zero total
    /// churn reports 0.0 here rather than dividing by zero.
    pub percent_contribution: f64,
}

/// Result of analysing one page's full history.
#[derive(Debug, Clone, PartialEq)]
pub struct PageAnalysis {
    pub page_title: CompactString,
    pub page_url: String,
    /// Citation-change events in revision order.
    pub events: Vec<CitationChangeEvent>,
    /// One entry per coincident editor (an editor whose revision fired at
    /// least one event), ordered by first coincidence. Editors who touched
    /// the page without ever changing the citation set get no summary, but
    /// their churn still counts towards the totals below.
    pub summaries: Vec<EditorSummary>,
    pub total_added_chars: usize,
    pub total_deleted_chars: usize,
}

/// Walks a page's revisions in the given order (the export is
/// chronological; we never re-sort) and accumulates events and tallies.
///
/// Never fails: an empty page yields an analysis with no events and no
/// summaries.
pub fn analyse_page(page: &Page, scanner: &CitationScanner, wiki_host: &str) -> PageAnalysis {
    let url = page_url(wiki_host, &page.title);

    let mut tallies: FxHashMap<Editor, EditorTally> = FxHashMap::default();
    let mut coincident_seen: FxHashSet<Editor> = FxHashSet::default();
    let mut coincident_order: Vec<Editor> = Vec::new();
    let mut events = Vec::new();

    let mut previous = RevisionFacts::start_of_page();
    for revision in &page.revisions {
        let current = RevisionFacts::extract(revision, scanner);

        let counts = char_diff(&previous.text, &current.text);
        let tally = tallies.entry(current.editor.clone()).or_default();
        tally.added_chars += counts.added;
        tally.deleted_chars += counts.deleted;

        let (added, deleted) = citation_delta(&previous, &current);
        if !added.is_empty() || !deleted.is_empty() {
            tracing::debug!(
                page = page.title.as_str(),
                revision = current.id.as_str(),
                editor = %current.editor,
                added = added.len(),
                deleted = deleted.len(),
                "citation set changed"
            );

            if coincident_seen.insert(current.editor.clone()) {
                coincident_order.push(current.editor.clone());
            }
            events.push(CitationChangeEvent {
                page_title: page.title.clone(),
                page_url: url.clone(),
                revision_id: current.id.clone(),
                editor: current.editor.clone(),
                timestamp: current.timestamp,
                comment: current.comment.clone(),
                added_urls: added.len(),
                deleted_urls: deleted.len(),
                urls: current.citation_urls.clone(),
                categories: current.categories.clone(),
            });
        }

        previous = current;
    }

    let total_added_chars: usize = tallies.values().map(|t| t.added_chars).sum();
    let total_deleted_chars: usize = tallies.values().map(|t| t.deleted_chars).sum();
    let total_churn = total_added_chars + total_deleted_chars;

    let summaries = coincident_order
        .into_iter()
        .map(|editor| {
            let tally = tallies.get(&editor).copied().unwrap_or_default();
            let percent_contribution = if total_churn == 0 {
                0.0
            } else {
                tally.churn() as f64 / total_churn as f64 * 100.0
            };
            EditorSummary {
                editor,
                added_chars: tally.added_chars,
                deleted_chars: tally.deleted_chars,
                percent_contribution,
            }
        })
        .collect();

    PageAnalysis {
        page_title: page.title.clone(),
        page_url: url,
        events,
        summaries,
        total_added_chars,
        total_deleted_chars,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dump_parser::Revision;

    const CITE_X1: &str = "http://chroniclingamerica.loc.gov/x1";
    const CITE_X2: &str = "http://chroniclingamerica.loc.gov/x2";

    fn revision(id: &str, editor: Editor, text: &str) -> Revision {
        Revision {
            id: id.into(),
            timestamp: None,
            editor,
            comment: None,
            text: Some(text.to_owned()),
        }
    }

    fn page(revisions: Vec<Revision>) -> Page {
        Page {
            title: "Test Page".into(),
            revisions,
        }
    }

    fn analyse(revisions: Vec<Revision>) -> PageAnalysis {
        analyse_page(&page(revisions), &CitationScanner::default(), "en.wikipedia.org")
    }

    fn alice() -> Editor {
        Editor::Registered("Alice".into())
    }

    fn bob() -> Editor {
        Editor::Registered("Bob".into())
    }

    #[test]
    fn event_fires_when_a_citation_appears() {
        let text = format!("hello {CITE_X1}");
        let analysis = analyse(vec![
            revision("1", alice(), ""),
            revision("2", bob(), &text),
        ]);

        assert_eq!(analysis.events.len(), 1);
        let event = &analysis.events[0];
        assert_eq!(event.revision_id, "2");
        assert_eq!(event.editor, bob());
        assert_eq!(event.added_urls, 1);
        assert_eq!(event.deleted_urls, 0);
        assert_eq!(event.urls.iter().collect::<Vec<_>>(), [CITE_X1]);

        // Alice never coincided with a citation change; only Bob gets a
        // summary, and he owns all the churn
        assert_eq!(analysis.summaries.len(), 1);
        let summary = &analysis.summaries[0];
        assert_eq!(summary.editor, bob());
        assert_eq!(summary.added_chars, text.chars().count());
        assert_eq!(summary.percent_contribution, 100.0);
    }

    #[test]
    fn text_change_without_url_change_fires_no_event_but_counts_churn() {
        let analysis = analyse(vec![
            revision("1", alice(), &format!("intro {CITE_X1}")),
            revision("2", bob(), &format!("intro, expanded {CITE_X1}")),
        ]);

        assert_eq!(analysis.events.len(), 1); // only revision 1
        assert_eq!(analysis.events[0].editor, alice());
        // Bob's churn is counted in the page totals all the same
        assert!(analysis.total_added_chars > format!("intro {CITE_X1}").chars().count());
        // ... but he gets no summary row
        assert!(analysis.summaries.iter().all(|s| s.editor != bob()));
    }

    #[test]
    fn url_deletion_fires_an_event() {
        let analysis = analyse(vec![
            revision("1", alice(), &format!("{CITE_X1} {CITE_X2}")),
            revision("2", bob(), CITE_X2),
        ]);

        assert_eq!(analysis.events.len(), 2);
        let event = &analysis.events[1];
        assert_eq!(event.added_urls, 0);
        assert_eq!(event.deleted_urls, 1);
        assert_eq!(event.urls.iter().collect::<Vec<_>>(), [CITE_X2]);
    }

    #[test]
    fn category_only_change_fires_no_event() {
        let analysis = analyse(vec![
            revision("1", alice(), &format!("{CITE_X1} [[Category:A]]")),
            revision("2", bob(), &format!("{CITE_X1} [[Category:B]]")),
        ]);

        assert_eq!(analysis.events.len(), 1);
        assert_eq!(analysis.events[0].revision_id, "1");
    }

    #[test]
    fn summaries_sum_to_page_totals() {
        let analysis = analyse(vec![
            revision("1", alice(), &format!("a {CITE_X1}")),
            revision("2", bob(), &format!("a b {CITE_X1} {CITE_X2}")),
            revision("3", alice(), "a b"),
        ]);

        // every editor coincided at least once here
        let summed_added: usize = analysis.summaries.iter().map(|s| s.added_chars).sum();
        let summed_deleted: usize = analysis.summaries.iter().map(|s| s.deleted_chars).sum();
        assert_eq!(summed_added, analysis.total_added_chars);
        assert_eq!(summed_deleted, analysis.total_deleted_chars);

        let percent_total: f64 = analysis
            .summaries
            .iter()
            .map(|s| s.percent_contribution)
            .sum();
        assert!((percent_total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn zero_churn_page_emits_no_rows_and_no_error() {
        // absent bodies throughout: no churn, no URLs, nothing to divide by
        let analysis = analyse(vec![
            Revision {
                id: "1".into(),
                timestamp: None,
                editor: alice(),
                comment: None,
                text: None,
            },
            Revision {
                id: "2".into(),
                timestamp: None,
                editor: bob(),
                comment: Some("still nothing".into()),
                text: None,
            },
        ]);
        assert!(analysis.events.is_empty());
        assert!(analysis.summaries.is_empty());
        assert_eq!(analysis.total_added_chars, 0);
        assert_eq!(analysis.total_deleted_chars, 0);
    }

    #[test]
    fn page_with_no_revisions_is_fine() {
        let analysis = analyse(Vec::new());
        assert!(analysis.events.is_empty());
        assert!(analysis.summaries.is_empty());
        assert_eq!(analysis.total_added_chars + analysis.total_deleted_chars, 0);
    }

    #[test]
    fn single_revision_without_citations_emits_nothing() {
        let analysis = analyse(vec![revision("1", alice(), "plain prose, no links")]);
        assert!(analysis.events.is_empty());
        assert!(analysis.summaries.is_empty());
    }

    #[test]
    fn absent_body_diffs_as_deletion_not_no_change() {
        let analysis = analyse(vec![
            revision("1", alice(), "some text here"),
            Revision {
                id: "2".into(),
                timestamp: None,
                editor: bob(),
                comment: None,
                text: None,
            },
        ]);

        let total = analysis.total_deleted_chars;
        assert_eq!(total, "some text here".chars().count());
    }

    #[test]
    fn coincident_editors_keep_first_coincidence_order() {
        let analysis = analyse(vec![
            revision("1", bob(), CITE_X1),
            revision("2", alice(), &format!("{CITE_X1} {CITE_X2}")),
            revision("3", bob(), CITE_X2),
        ]);

        let order: Vec<&Editor> = analysis.summaries.iter().map(|s| &s.editor).collect();
        assert_eq!(order, [&bob(), &alice()]);
    }
}
