//! # citetrail
//!
//! Mines a MediaWiki page's full edit history to detect when Chronicling
//! America citation links (`http://chroniclingamerica.loc.gov/...`) appear or
//! disappear, and attributes character-level authorship of textual change to
//! individual editors.
//!
//! ## Overview
//!
//! The crate is split into a streaming export parser and a pure analysis
//! core. The parser ([`dump_parser`]) reads a MediaWiki XML export one page
//! at a time with constant memory. The core walks a page's revisions in
//! chronological order:
//!
//! - [`extract`] pulls the normalized citation-URL set and category list out
//!   of each revision's text,
//! - [`diff`] computes character-level added/deleted counts between
//!   consecutive full-text snapshots,
//! - [`attribution`] accumulates per-editor totals, detects citation-set
//!   changes between consecutive revisions and works out each coincident
//!   editor's percent contribution,
//! - [`report`] turns the results into CSV rows for the per-edit log and the
//!   per-editor summary tables.
//!
//! ## Basic usage
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! use citetrail::attribution::analyse_page;
//! use citetrail::dump_parser::DumpParser;
//! use citetrail::extract::CitationScanner;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let file = File::open("pages/A/Abigail_Kuaihelani_Campbell.xml")?;
//!     let mut parser = DumpParser::new(BufReader::new(file));
//!     let scanner = CitationScanner::default();
//!
//!     while let Some(page) = parser.parse_page()? {
//!         let analysis = analyse_page(&page, &scanner, "en.wikipedia.org");
//!         for event in &analysis.events {
//!             println!("{} changed citations in revision {}", event.editor, event.revision_id);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Parallel processing
//!
//! XML parsing is inherently linear, but pages are independent: no analysis
//! state is shared across pages, so whole files (or parsed pages) can be
//! distributed over a thread pool. The binary in this crate does exactly
//! that with `rayon`, serializing only the appends to the two report tables.

pub mod attribution;
pub mod diff;
pub mod dump_parser;
pub mod extract;
pub mod report;
