// latsearch-cli: table reading, score output, and the driver loop behind
// the `lattice-search` binary.

pub mod format;
pub mod table;

use std::io::{self, Write};
use std::process;

use latsearch_fst::text::parse_fst_lines;
use latsearch_fst::{FstError, ScalarWeight, TropicalWeight, VectorFst};
use latsearch_lattice::text::parse_compact_lattice_lines;
use latsearch_lattice::{LatticeSearcher, Query, QueryScore, SearchError, SearchOptions};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub use format::format_score;
pub use table::{Rspecifier, TableEntry, TableReader};

/// Error type for the command-line driver.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{path}: {source}")]
    Io { path: String, source: io::Error },
    #[error("{what}: {source}")]
    Parse { what: String, source: FstError },
    #[error("invalid rspecifier: {0}")]
    Rspecifier(String),
    #[error("{0}: binary objects are not supported, write tables in text mode")]
    UnsupportedBinary(String),
    #[error("lock-step tables differ in length: {lattices} lattices, {queries} queries")]
    MismatchedTables { lattices: usize, queries: usize },
    #[error(transparent)]
    Search(#[from] SearchError),
}

/// Everything one run of the driver needs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub lattices: Rspecifier,
    pub queries: Rspecifier,
    pub options: SearchOptions,
    /// Pair the i-th query with the i-th lattice instead of scoring every
    /// query against every lattice.
    pub lockstep: bool,
    /// One JSON object per score instead of text lines.
    pub json: bool,
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub lattices: usize,
    /// Lattices skipped because they could not be parsed or were malformed.
    pub skipped: usize,
    pub scores: usize,
}

/// Read lattices and queries, score them, and write one record per score
/// to `out`. Malformed lattices are logged and skipped; any other error
/// stops the run.
pub fn run<W: ScalarWeight>(
    config: &RunConfig,
    out: &mut impl Write,
) -> Result<RunSummary, CliError> {
    let searcher = LatticeSearcher::<W>::new(config.options)?;
    let mut lattice_table = TableReader::open(&config.lattices)?;
    let mut summary = RunSummary::default();

    if config.lockstep {
        if !config.queries.is_table() {
            return Err(CliError::Rspecifier(format!(
                "{}: lock-step mode needs a query table",
                config.queries.path()
            )));
        }
        let mut query_table = TableReader::open(&config.queries)?;
        loop {
            let lattice = lattice_table.next().transpose()?;
            let query = query_table.next().transpose()?;
            match (lattice, query) {
                (Some(lattice), Some(query)) => {
                    let query = load_query::<W>(Some(query.key.clone()), &query)?;
                    let queries = std::slice::from_ref(&query);
                    score_entry(&searcher, &lattice, queries, config, out, &mut summary)?;
                }
                (None, None) => break,
                (lattice, query) => {
                    let seen = summary.lattices;
                    let lattices = usize::from(lattice.is_some()) + lattice_table.by_ref().count();
                    let queries = usize::from(query.is_some()) + query_table.by_ref().count();
                    return Err(CliError::MismatchedTables {
                        lattices: seen + lattices,
                        queries: seen + queries,
                    });
                }
            }
        }
    } else {
        let queries = load_queries::<W>(&config.queries)?;
        if queries.is_empty() {
            warn!(queries = config.queries.path(), "no queries to score");
        }
        for lattice in lattice_table {
            score_entry(&searcher, &lattice?, &queries, config, out, &mut summary)?;
        }
    }

    out.flush().map_err(stdout_error)?;
    info!(
        lattices = summary.lattices,
        skipped = summary.skipped,
        scores = summary.scores,
        "done"
    );
    Ok(summary)
}

/// Load every query of `spec`: keyed when it is a table, a single unkeyed
/// query otherwise.
pub fn load_queries<W: ScalarWeight>(spec: &Rspecifier) -> Result<Vec<Query<W>>, CliError> {
    let keyed = spec.is_table();
    TableReader::open(spec)?
        .map(|entry| {
            let entry = entry?;
            let key = keyed.then(|| entry.key.clone());
            load_query(key, &entry)
        })
        .collect()
}

fn load_query<W: ScalarWeight>(
    key: Option<String>,
    entry: &TableEntry,
) -> Result<Query<W>, CliError> {
    let fst: VectorFst<TropicalWeight> =
        parse_fst_lines(entry.line_strs(), entry.first_line).map_err(|source| CliError::Parse {
            what: format!("query {}", entry.key),
            source,
        })?;
    Ok(Query::new(key, &fst)?)
}

fn score_entry<W: ScalarWeight>(
    searcher: &LatticeSearcher<W>,
    entry: &TableEntry,
    queries: &[Query<W>],
    config: &RunConfig,
    out: &mut impl Write,
    summary: &mut RunSummary,
) -> Result<(), CliError> {
    summary.lattices += 1;
    let lattice = match parse_compact_lattice_lines(entry.line_strs(), entry.first_line) {
        Ok(lattice) => lattice,
        Err(e) => {
            error!(lattice = %entry.key, error = %e, "skipping unreadable lattice");
            summary.skipped += 1;
            return Ok(());
        }
    };
    let result = match searcher.score(&entry.key, lattice, queries) {
        Ok(result) => result,
        Err(e) => {
            error!(lattice = %entry.key, error = %e, "skipping lattice");
            summary.skipped += 1;
            return Ok(());
        }
    };
    for score in &result.scores {
        write_score(out, score, config.json).map_err(stdout_error)?;
        summary.scores += 1;
    }
    Ok(())
}

/// `LATTICE QUERY SCORE`, `LATTICE SCORE` for an unkeyed query, or the
/// record as one line of JSON.
pub fn write_score(out: &mut impl Write, score: &QueryScore, json: bool) -> io::Result<()> {
    if json {
        serde_json::to_writer(&mut *out, score)?;
        return writeln!(out);
    }
    match &score.query_key {
        Some(query) => {
            writeln!(out, "{} {} {}", score.lattice_key, query, format_score(score.score))
        }
        None => writeln!(out, "{} {}", score.lattice_key, format_score(score.score)),
    }
}

fn stdout_error(source: io::Error) -> CliError {
    CliError::Io {
        path: "<stdout>".to_string(),
        source,
    }
}

/// Install the stderr log subscriber. `RUST_LOG` wins when set; otherwise
/// `verbosity` 0, 1, 2+ selects warn, info, debug.
pub fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_env_filter(filter)
        .try_init();
}

/// Print an error message and exit with code 1.
pub fn fatal(msg: &str) -> ! {
    eprintln!("error: {msg}");
    process::exit(1);
}
