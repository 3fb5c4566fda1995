//! CSV emission of the two report tables.
//!
//! The analysis produces one [`PageAnalysis`] per page; this module flattens
//! it into rows of the per-edit log and the per-editor summary. Row order
//! within a page follows revision order; across pages no order is promised.
//! When pages are analysed in parallel the emitter must sit behind a mutex
//! so row appends serialize (the binary does exactly that).

use std::io::{self, Write};

use crate::attribution::PageAnalysis;

/// Default host used to derive page URLs from titles.
pub const DEFAULT_WIKI_HOST: &str = "en.wikipedia.org";

const EDIT_LOG_HEADER: [&str; 10] = [
    "page_title",
    "page_url",
    "revision_id",
    "editor",
    "timestamp",
    "comment",
    "added_urls",
    "deleted_urls",
    "urls",
    "categories",
];

const EDITOR_SUMMARY_HEADER: [&str; 8] = [
    "page_title",
    "page_url",
    "editor",
    "added_chars",
    "deleted_chars",
    "page_added_chars",
    "page_deleted_chars",
    "percent_contribution",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Canonical URL of a wiki page: spaces become underscores, the rest is
/// percent-encoded.
pub fn page_url(host: &str, title: &str) -> String {
    let underscored = title.replace(' ', "_");
    format!("http://{host}/wiki/{}", urlencoding::encode(&underscored))
}

/// Quotes a field iff CSV requires it (embedded comma, quote or newline).
fn push_field(line: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        line.push('"');
        for c in field.chars() {
            if c == '"' {
                line.push('"');
            }
            line.push(c);
        }
        line.push('"');
    } else {
        line.push_str(field);
    }
}

fn write_record<W: Write>(out: &mut W, fields: &[&str]) -> io::Result<()> {
    let mut line = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        push_field(&mut line, field);
    }
    line.push('\n');
    out.write_all(line.as_bytes())
}

/// Writes the per-edit log and the per-editor summary tables.
pub struct ReportEmitter<W: Write> {
    edit_log: W,
    editor_summary: W,
}

impl<W: Write> ReportEmitter<W> {
    /// Wraps the two output streams and writes a header row to each.
    pub fn new(mut edit_log: W, mut editor_summary: W) -> io::Result<Self> {
        write_record(&mut edit_log, &EDIT_LOG_HEADER)?;
        write_record(&mut editor_summary, &EDITOR_SUMMARY_HEADER)?;
        Ok(Self {
            edit_log,
            editor_summary,
        })
    }

    /// Appends all rows for one analysed page: one edit-log row per
    /// citation-change event, one summary row per coincident editor.
    pub fn emit_page(&mut self, analysis: &PageAnalysis) -> io::Result<()> {
        for event in &analysis.events {
            let editor = event.editor.to_string();
            let timestamp = event
                .timestamp
                .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
                .unwrap_or_default();
            let urls = event
                .urls
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" | ");
            let categories = event.categories.join(" | ");

            write_record(
                &mut self.edit_log,
                &[
                    &event.page_title,
                    &event.page_url,
                    &event.revision_id,
                    &editor,
                    &timestamp,
                    event.comment.as_deref().unwrap_or(""),
                    &event.added_urls.to_string(),
                    &event.deleted_urls.to_string(),
                    &urls,
                    &categories,
                ],
            )?;
        }

        for summary in &analysis.summaries {
            write_record(
                &mut self.editor_summary,
                &[
                    &analysis.page_title,
                    &analysis.page_url,
                    &summary.editor.to_string(),
                    &summary.added_chars.to_string(),
                    &summary.deleted_chars.to_string(),
                    &analysis.total_added_chars.to_string(),
                    &analysis.total_deleted_chars.to_string(),
                    &format!("{:.2}%", summary.percent_contribution),
                ],
            )?;
        }

        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.edit_log.flush()?;
        self.editor_summary.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::{analyse_page, PageAnalysis};
    use crate::dump_parser::{Editor, Page, Revision};
    use crate::extract::CitationScanner;
    use std::io::Read;

    #[test]
    fn page_url_underscores_and_encodes() {
        assert_eq!(
            page_url("en.wikipedia.org", "Abigail Kuaihelani Campbell"),
            "http://en.wikipedia.org/wiki/Abigail_Kuaihelani_Campbell"
        );
        assert_eq!(
            page_url("en.wikipedia.org", "A & B"),
            "http://en.wikipedia.org/wiki/A_%26_B"
        );
    }

    #[test]
    fn csv_quoting() {
        let mut out = Vec::new();
        write_record(&mut out, &["plain", "with, comma", "with \"quote\"", "line\nbreak"]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "plain,\"with, comma\",\"with \"\"quote\"\"\",\"line\nbreak\"\n"
        );
    }

    fn analysed_page() -> PageAnalysis {
        let page = Page {
            title: "Test Page".into(),
            revisions: vec![
                Revision {
                    id: "10".into(),
                    timestamp: Some(
                        chrono::DateTime::parse_from_rfc3339("2012-04-01T12:00:00Z")
                            .unwrap()
                            .to_utc(),
                    ),
                    editor: Editor::Registered("Alice".into()),
                    comment: Some("add citation".into()),
                    text: Some(
                        "see http://chroniclingamerica.loc.gov/x1 [[Category:News]]".to_owned(),
                    ),
                },
                Revision {
                    id: "11".into(),
                    timestamp: None,
                    editor: Editor::Anonymous("10.0.0.1".into()),
                    comment: None,
                    text: Some("see also".to_owned()),
                },
            ],
        };
        analyse_page(&page, &CitationScanner::default(), DEFAULT_WIKI_HOST)
    }

    #[test]
    fn emits_edit_log_and_summary_rows() {
        let analysis = analysed_page();

        let mut edit_log = Vec::new();
        let mut summary = Vec::new();
        let mut emitter = ReportEmitter::new(&mut edit_log, &mut summary).unwrap();
        emitter.emit_page(&analysis).unwrap();
        drop(emitter);

        let edit_log = String::from_utf8(edit_log).unwrap();
        let lines: Vec<&str> = edit_log.lines().collect();
        assert_eq!(lines[0], EDIT_LOG_HEADER.join(","));
        // revision 10 adds the URL, revision 11 removes it
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with(
            "Test Page,http://en.wikipedia.org/wiki/Test_Page,10,Alice,2012-04-01T12:00:00Z,add citation,1,0,"
        ));
        assert!(lines[1].ends_with("http://chroniclingamerica.loc.gov/x1,News"));
        assert!(lines[2].contains(",11,10.0.0.1,,,0,1,,"));

        let summary = String::from_utf8(summary).unwrap();
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines[0], EDITOR_SUMMARY_HEADER.join(","));
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("Test Page,http://en.wikipedia.org/wiki/Test_Page,Alice,"));
        assert!(lines[1].ends_with('%'));
    }

    #[test]
    fn percent_is_formatted_to_two_decimals() {
        let analysis = analysed_page();
        let mut edit_log = Vec::new();
        let mut summary = Vec::new();
        let mut emitter = ReportEmitter::new(&mut edit_log, &mut summary).unwrap();
        emitter.emit_page(&analysis).unwrap();
        drop(emitter);

        let summary = String::from_utf8(summary).unwrap();
        for line in summary.lines().skip(1) {
            let pct = line.rsplit(',').next().unwrap();
            assert!(pct.ends_with('%'));
            let digits = &pct[..pct.len() - 1];
            let (_, frac) = digits.split_once('.').unwrap();
            assert_eq!(frac.len(), 2);
        }
    }

    #[test]
    fn writes_to_real_files() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("edits.csv");
        let summary_path = dir.path().join("editors.csv");

        {
            let mut emitter = ReportEmitter::new(
                std::fs::File::create(&log_path).unwrap(),
                std::fs::File::create(&summary_path).unwrap(),
            )
            .unwrap();
            emitter.emit_page(&analysed_page()).unwrap();
            emitter.flush().unwrap();
        }

        let mut contents = String::new();
        std::fs::File::open(&log_path)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert!(contents.starts_with("page_title,"));
        assert!(contents.contains("chroniclingamerica.loc.gov"));
    }
}
