//! Weighted finite-state transducers for lattice scoring.
//!
//! This crate provides the automaton machinery the lattice search pipeline
//! runs on: semiring weights, a mutable vector-backed transducer, and the
//! algorithms needed to score it.
//!
//! # Architecture
//!
//! - [`semiring`] -- `Semiring` trait, tropical and log weights
//! - [`vector`] -- `VectorFst`: states, arcs, arc sorting, weight mapping, validation
//! - [`topology`] -- Topological order, accessibility, connect (trim)
//! - [`compose`] -- Epsilon-filtered composition with sorted-label matching
//! - [`shortest_distance`] -- Semiring shortest distance and total likelihood
//! - [`text`] -- AT&T text format reading and writing

pub mod compose;
pub mod semiring;
pub mod shortest_distance;
pub mod text;
pub mod topology;
pub mod vector;

pub use compose::compose;
pub use semiring::{LogWeight, ScalarWeight, Semiring, TropicalWeight};
pub use shortest_distance::{likelihood, shortest_distance, total_weight};
pub use vector::{Arc, ArcSortKey, EPSILON, Label, StateId, VectorFst};

/// Error type for automaton validation and parsing.
#[derive(Debug, thiserror::Error)]
pub enum FstError {
    #[error(
        "arc {arc} of state {state} points to state {nextstate}, \
         but the automaton has {num_states} states"
    )]
    MalformedAutomaton {
        state: StateId,
        arc: usize,
        nextstate: StateId,
        num_states: usize,
    },
    #[error("start state {start} out of range ({num_states} states)")]
    InvalidStart { start: StateId, num_states: usize },
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}
