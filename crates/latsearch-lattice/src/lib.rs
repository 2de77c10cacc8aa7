//! Recognition lattices and query search over them.
//!
//! A lattice is read in compact form (two-stream weights plus id strings),
//! preprocessed, converted to a scalar automaton, and used to score query
//! automata by their log-likelihood ratio against the whole lattice.
//!
//! # Architecture
//!
//! - [`weight`] -- `LatticeWeight`, `CompactLatticeWeight`, `CompactLattice`
//! - [`transform`] -- Rescaling, insertion penalty, beam pruning, conversion
//! - [`text`] -- Compact lattice text format
//! - [`search`] -- `SearchOptions`, `Query`, `LatticeSearcher`, scoring

pub mod search;
pub mod text;
pub mod transform;
pub mod weight;

pub use search::{
    LatticeScores, LatticeSearcher, Query, QueryScore, SearchOptions, log_likelihood_ratio,
};
pub use transform::{
    PruneOutcome, add_insertion_penalty, convert_lattice, prune_lattice, scale_lattice,
};
pub use weight::{CompactLattice, CompactLatticeWeight, LatticeWeight};

use latsearch_fst::FstError;

/// Error type for lattice scoring.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("malformed lattice: {0}")]
    MalformedLattice(#[source] FstError),
    #[error("malformed query {query}: {source}")]
    MalformedQuery { query: String, source: FstError },
    #[error("invalid option: {0}")]
    InvalidOption(String),
}
