//! Streaming parser for MediaWiki XML export documents.
//!
//! Reads one [`Page`] at a time from any [`BufRead`], so memory usage stays
//! constant relative to the export size. Only the handful of tags the
//! analysis needs are recognized; everything else is skipped. Tested against
//! the `Special:Export` format (export-0.8 and later), which nests as
//! `<mediawiki><page><title/><revision>...</revision></page></mediawiki>`.

use std::fmt::{self, Debug, Display};
use std::io::BufRead;

use compact_str::CompactString;
use quick_xml::events::{BytesStart, Event};

/// Tags relevant to page extraction, plus a catch-all for everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Tag {
    MediaWiki,
    Page,
    Title,
    Revision,
    Id,
    Timestamp,
    Contributor,
    Username,
    Ip,
    Comment,
    Text { deleted: bool },
    Unknown,
}

impl Tag {
    fn from_start(e: &BytesStart) -> Result<Self, quick_xml::Error> {
        Ok(match e.name().as_ref() {
            b"mediawiki" => Tag::MediaWiki,
            b"page" => Tag::Page,
            b"title" => Tag::Title,
            b"revision" => Tag::Revision,
            b"id" => Tag::Id,
            b"timestamp" => Tag::Timestamp,
            b"contributor" => Tag::Contributor,
            b"username" => Tag::Username,
            b"ip" => Tag::Ip,
            b"comment" => Tag::Comment,
            b"text" => {
                let mut deleted = false;
                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    if attr.key.as_ref() == b"deleted" {
                        deleted = true;
                    }
                }
                Tag::Text { deleted }
            }
            _ => Tag::Unknown,
        })
    }
}

/// The identity a revision is attributed to.
///
/// MediaWiki records either an account name or, for anonymous edits, the
/// editor's IP address. Exports with a suppressed (`deleted`) contributor
/// carry neither; those resolve to [`Editor::Unknown`], which is a regular
/// identity value and participates in tallies like any other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Editor {
    Registered(CompactString),
    Anonymous(CompactString),
    Unknown,
}

impl Display for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Editor::Registered(name) => write!(f, "{name}"),
            Editor::Anonymous(ip) => write!(f, "{ip}"),
            Editor::Unknown => write!(f, "(unknown)"),
        }
    }
}

/// One historical snapshot of a page. Only `id` is mandatory; everything
/// else falls back as described in the field docs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub id: CompactString,
    /// `None` if the export carried no parsable timestamp.
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
    pub editor: Editor,
    pub comment: Option<CompactString>,
    /// Full page text at this revision. `None` means the body was deleted or
    /// absent from the export; the analysis treats that as an empty body.
    pub text: Option<String>,
}

#[derive(Debug, Default)]
struct RevisionBuilder {
    id: Option<CompactString>,
    timestamp: Option<chrono::DateTime<chrono::Utc>>,
    username: Option<CompactString>,
    ip: Option<CompactString>,
    comment: Option<CompactString>,
    text: Option<String>,
}

impl RevisionBuilder {
    /// `None` if the revision has no id; such revisions are dropped.
    fn build(self) -> Option<Revision> {
        let id = self.id?;
        let editor = match (self.username, self.ip) {
            (Some(name), _) => Editor::Registered(name),
            (None, Some(ip)) => Editor::Anonymous(ip),
            (None, None) => Editor::Unknown,
        };
        Some(Revision {
            id,
            timestamp: self.timestamp,
            editor,
            comment: self.comment,
            text: self.text,
        })
    }
}

/// A page title plus its revisions in export order (oldest first). The
/// export is chronological already; the analysis relies on that and never
/// re-sorts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub title: CompactString,
    pub revisions: Vec<Revision>,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("XML error")]
    Xml(#[from] quick_xml::Error),
    #[error("unexpected end of file inside a <page> element")]
    Eof,
}

// Source: https://github.com/mediawiki-utilities/python-mwtypes/blob/523a93f/mwtypes/timestamp.py#L12
const TIMESTAMP_FORMAT_LONG: &str = "%Y-%m-%dT%H:%M:%SZ";
const TIMESTAMP_FORMAT_SHORT: &str = "%Y%m%d%H%M%S";

fn parse_timestamp(text: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT_LONG)
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT_SHORT))
        .map(|dt| chrono::DateTime::from_naive_utc_and_offset(dt, chrono::Utc))
        .ok()
}

/// Underscores in exported titles stand for spaces; a leading namespace
/// prefix ("Category:Foo") is split off.
fn normalize_title(raw: &str) -> CompactString {
    let base = match raw.split_once(':') {
        Some((_, rest)) => rest,
        None => raw,
    };
    if base.contains('_') {
        CompactString::from(base.replace('_', " "))
    } else {
        CompactString::from(base)
    }
}

pub struct DumpParser<R: BufRead> {
    xml: quick_xml::Reader<R>,
    buf: Vec<u8>,
    path: Vec<Tag>,
}

impl<R: BufRead> Debug for DumpParser<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DumpParser")
            .field("buf.len", &self.buf.len())
            .field("path", &self.path)
            .finish()
    }
}

impl<R: BufRead> DumpParser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            xml: quick_xml::Reader::from_reader(reader),
            // a full article revision is commonly tens of KiB
            buf: Vec::with_capacity(64 * 1024),
            path: Vec::new(),
        }
    }

    /// Parses the next `<page>` element, or returns `Ok(None)` at the end of
    /// the document.
    ///
    /// Revisions missing their mandatory id are dropped with a warning so
    /// the caller never sees a partially valid revision.
    pub fn parse_page(&mut self) -> Result<Option<Page>, ParseError> {
        let mut page: Option<Page> = None;
        let mut revision: Option<RevisionBuilder> = None;

        loop {
            match self.xml.read_event_into(&mut self.buf)? {
                Event::Start(ref e) => {
                    let tag = Tag::from_start(e)?;
                    match tag {
                        Tag::Page => {
                            page = Some(Page {
                                title: CompactString::default(),
                                revisions: Vec::new(),
                            });
                        }
                        Tag::Revision => revision = Some(RevisionBuilder::default()),
                        _ => {}
                    }
                    self.path.push(tag);
                }
                Event::Empty(ref e) => {
                    // <text deleted="deleted" /> and <contributor deleted="deleted" />
                    // show up as empty elements; their fallbacks are the
                    // builder defaults, so nothing to record.
                    let tag = Tag::from_start(e)?;
                    if tag == (Tag::Text { deleted: false }) {
                        if let Some(rev) = &mut revision {
                            rev.text = Some(String::new());
                        }
                    }
                }
                Event::Text(e) => {
                    let text = e.unescape()?;

                    use Tag::*;
                    match self.path.as_slice() {
                        [.., Page, Title] => {
                            if let Some(page) = &mut page {
                                page.title = normalize_title(&text);
                            }
                        }
                        [.., Revision, Id] => {
                            if let Some(rev) = &mut revision {
                                rev.id = Some(CompactString::from(text.as_ref()));
                            }
                        }
                        [.., Revision, Timestamp] => {
                            if let Some(rev) = &mut revision {
                                rev.timestamp = parse_timestamp(&text);
                                if rev.timestamp.is_none() {
                                    tracing::warn!(
                                        timestamp = text.as_ref(),
                                        position = self.xml.buffer_position(),
                                        "invalid revision timestamp"
                                    );
                                }
                            }
                        }
                        [.., Contributor, Username] => {
                            if let Some(rev) = &mut revision {
                                rev.username = Some(CompactString::from(text.as_ref()));
                            }
                        }
                        [.., Contributor, Ip] => {
                            if let Some(rev) = &mut revision {
                                rev.ip = Some(CompactString::from(text.as_ref()));
                            }
                        }
                        [.., Revision, Comment] => {
                            if let Some(rev) = &mut revision {
                                rev.comment = Some(CompactString::from(text.as_ref()));
                            }
                        }
                        [.., Revision, Text { deleted: false }] => {
                            if let Some(rev) = &mut revision {
                                // entity boundaries can split one body into
                                // several text events; append, don't assign
                                rev.text.get_or_insert_with(String::new).push_str(&text);
                            }
                        }
                        _ => {}
                    }
                }
                Event::End(_) => {
                    let tag = self.path.pop();
                    match tag {
                        Some(Tag::Revision) => {
                            if let (Some(builder), Some(page)) = (revision.take(), &mut page) {
                                match builder.build() {
                                    Some(rev) => page.revisions.push(rev),
                                    None => tracing::warn!(
                                        title = page.title.as_str(),
                                        position = self.xml.buffer_position(),
                                        "dropping revision without an id"
                                    ),
                                }
                            }
                        }
                        Some(Tag::Page) => {
                            self.buf.clear();
                            return Ok(page.map(|p| {
                                tracing::debug!(
                                    title = p.title.as_str(),
                                    revisions = p.revisions.len(),
                                    "parsed page"
                                );
                                p
                            }));
                        }
                        _ => {}
                    }
                }
                Event::Eof => {
                    return if page.is_some() {
                        Err(ParseError::Eof)
                    } else {
                        Ok(None)
                    };
                }
                _ => {}
            }
            self.buf.clear();
        }
    }
}
