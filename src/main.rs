use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

use citetrail::attribution::analyse_page;
use citetrail::dump_parser::DumpParser;
use citetrail::extract::{CitationScanner, DEFAULT_CITATION_HOST};
use citetrail::report::{ReportEmitter, DEFAULT_WIKI_HOST};

/// Scans MediaWiki export files for citation-link changes and writes the
/// per-edit log and per-editor summary tables.
#[derive(Debug, clap::Parser)]
#[command(name = "citetrail", version)]
struct CommandLine {
    /// Export XML files, or directories to scan recursively for .xml files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output path for the per-edit log table
    #[arg(long, default_value = "edit_log.csv")]
    edit_log: PathBuf,

    /// Output path for the per-editor summary table
    #[arg(long, default_value = "editor_summary.csv")]
    editor_summary: PathBuf,

    /// Host used to derive page URLs from titles
    #[arg(long, default_value = DEFAULT_WIKI_HOST)]
    wiki_host: String,

    /// Host whose citation links are tracked
    #[arg(long, default_value = DEFAULT_CITATION_HOST)]
    citation_host: String,

    /// Number of worker threads (defaults to the number of cores)
    #[arg(long, short = 'j')]
    jobs: Option<usize>,
}

fn collect_input_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in walkdir::WalkDir::new(input) {
                match entry {
                    Ok(entry) => {
                        let path = entry.path();
                        if path.extension().is_some_and(|ext| ext == "xml") {
                            files.push(path.to_path_buf());
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%error, "skipping unreadable directory entry")
                    }
                }
            }
        } else {
            files.push(input.clone());
        }
    }
    files
}

fn process_file(
    path: &Path,
    scanner: &CitationScanner,
    wiki_host: &str,
    emitter: &Mutex<ReportEmitter<BufWriter<File>>>,
) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut parser = DumpParser::new(BufReader::new(file));

    while let Some(page) = parser
        .parse_page()
        .with_context(|| format!("parsing {}", path.display()))?
    {
        tracing::info!(
            file = %path.display(),
            title = page.title.as_str(),
            revisions = page.revisions.len(),
            "analysing page"
        );
        let analysis = analyse_page(&page, scanner, wiki_host);

        // one page's rows land contiguously and in revision order
        let mut emitter = emitter.lock().expect("emitter mutex poisoned");
        emitter.emit_page(&analysis)?;
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = CommandLine::parse();

    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("configuring the worker pool")?;
    }

    let files = collect_input_files(&args.inputs);
    anyhow::ensure!(!files.is_empty(), "no input files found");

    let emitter = Mutex::new(ReportEmitter::new(
        BufWriter::new(
            File::create(&args.edit_log)
                .with_context(|| format!("creating {}", args.edit_log.display()))?,
        ),
        BufWriter::new(
            File::create(&args.editor_summary)
                .with_context(|| format!("creating {}", args.editor_summary.display()))?,
        ),
    )?);

    let scanner = CitationScanner::for_host(&args.citation_host);
    let failures = AtomicUsize::new(0);

    // pages are independent; parallelize across files and serialize only the
    // row appends
    files.par_iter().for_each(|path| {
        if let Err(error) = process_file(path, &scanner, &args.wiki_host, &emitter) {
            tracing::error!(file = %path.display(), error = format!("{error:#}"), "skipping input");
            failures.fetch_add(1, Ordering::Relaxed);
        }
    });

    emitter
        .into_inner()
        .expect("emitter mutex poisoned")
        .flush()?;

    let failed = failures.load(Ordering::Relaxed);
    if failed > 0 {
        tracing::warn!(failed, total = files.len(), "some inputs were skipped");
    }
    anyhow::ensure!(failed < files.len(), "all {} input files failed", files.len());

    Ok(())
}
