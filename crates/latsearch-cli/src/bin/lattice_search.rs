// lattice-search: score query automata against recognition lattices.
//
// For every lattice and every query, prints the log-likelihood ratio of the
// paths of the lattice accepted by the query against all its paths. With the
// log semiring (default) this is the log posterior probability of the query.
//
// Usage:
//   lattice-search [OPTIONS] <LATTICE_RSPECIFIER> <QUERY_RSPECIFIER>
//
// Examples:
//   lattice-search ark:lats.ark query.fst
//   lattice-search --acoustic-scale=0.1 --beam=8 ark:lats.ark ark:queries.ark
//   lattice-search --lockstep --json scp:lats.scp ark:queries.ark

use std::io::{self, BufWriter, Write};
use std::process;

use clap::{ArgAction, Parser};
use latsearch_cli::{RunConfig, Rspecifier, fatal};
use latsearch_fst::{LogWeight, TropicalWeight};
use latsearch_lattice::SearchOptions;
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "lattice-search",
    version,
    about = "Score query automata against recognition lattices"
)]
struct Cli {
    /// Lattices: ark:PATH, scp:PATH, or a single compact lattice file
    lattice_rspecifier: String,
    /// Queries: a single FST file, or an ark:/scp: table of FSTs
    query_rspecifier: String,
    /// Sum over paths (log semiring); false keeps only the best path
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    use_log: bool,
    /// Scaling factor for acoustic costs
    #[arg(long, default_value_t = 1.0)]
    acoustic_scale: f64,
    /// Scaling factor for graph costs
    #[arg(long, default_value_t = 1.0)]
    graph_scale: f64,
    /// Cost added to every word in the lattice
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    insertion_penalty: f64,
    /// Pruning beam applied to lattices before scoring
    #[arg(long, default_value_t = f64::INFINITY)]
    beam: f64,
    /// Score the i-th query against the i-th lattice only
    #[arg(long)]
    lockstep: bool,
    /// Write one JSON object per score
    #[arg(long)]
    json: bool,
    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    latsearch_cli::init_tracing(cli.verbose);

    let options = SearchOptions {
        acoustic_scale: cli.acoustic_scale,
        graph_scale: cli.graph_scale,
        insertion_penalty: cli.insertion_penalty,
        beam: cli.beam,
        use_log: cli.use_log,
    };
    if let Ok(json) = serde_json::to_string(&options) {
        debug!(options = %json, "search options");
    }

    let rspecifier = |spec: &str| Rspecifier::parse(spec).unwrap_or_else(|e| fatal(&e.to_string()));
    let config = RunConfig {
        lattices: rspecifier(&cli.lattice_rspecifier),
        queries: rspecifier(&cli.query_rspecifier),
        options,
        lockstep: cli.lockstep,
        json: cli.json,
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let result = if options.use_log {
        latsearch_cli::run::<LogWeight>(&config, &mut out)
    } else {
        latsearch_cli::run::<TropicalWeight>(&config, &mut out)
    };

    match result {
        Ok(summary) if summary.skipped > 0 => process::exit(1),
        Ok(_) => {}
        Err(e) => {
            let _ = out.flush();
            fatal(&e.to_string())
        }
    }
}
