// Lattice preprocessing: rescale, insertion penalty, beam pruning, and
// conversion to a scalar-weighted automaton.

use latsearch_fst::topology::{connect, top_order};
use latsearch_fst::{ArcSortKey, EPSILON, ScalarWeight, Semiring, VectorFst};
use tracing::{debug, warn};

use crate::weight::CompactLattice;

/// Scale graph and acoustic costs of every arc and final weight.
pub fn scale_lattice(lat: &mut CompactLattice, graph_scale: f64, acoustic_scale: f64) {
    if graph_scale == 1.0 && acoustic_scale == 1.0 {
        return;
    }
    lat.map_arcs(|_, mut arc| {
        arc.weight.weight = arc.weight.weight.scale(graph_scale, acoustic_scale);
        arc
    });
    lat.map_finals(|_, w| {
        let mut w = w.clone();
        w.weight = w.weight.scale(graph_scale, acoustic_scale);
        w
    });
}

/// Add `penalty` to the graph cost of every arc that emits a word.
/// Epsilon arcs and final weights are unchanged.
pub fn add_insertion_penalty(lat: &mut CompactLattice, penalty: f64) {
    if penalty == 0.0 {
        return;
    }
    lat.map_arcs(|_, mut arc| {
        if arc.olabel != EPSILON {
            arc.weight.weight.graph += penalty;
        }
        arc
    });
}

/// What [`prune_lattice`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneOutcome {
    Pruned { states_removed: usize, arcs_removed: usize },
    /// No start state; nothing to do.
    Empty,
    /// The lattice has a cycle and was left as is.
    Cyclic,
}

/// Remove every arc and final weight that lies only on paths costing more
/// than `beam` above the best path, then trim what became unreachable.
///
/// Requires a topologically sortable lattice; a cyclic one is logged and
/// returned unchanged. `beam` must be positive.
pub fn prune_lattice<W: Semiring>(lat: &mut VectorFst<W>, beam: f64) -> PruneOutcome {
    let Some(start) = lat.start() else {
        return PruneOutcome::Empty;
    };
    let Some(order) = top_order(lat) else {
        warn!(states = lat.num_states(), "lattice has cycles, not pruning it");
        return PruneOutcome::Cyclic;
    };
    let (states_before, arcs_before) = (lat.num_states(), lat.total_arcs());

    let mut forward = vec![f64::INFINITY; states_before];
    forward[start as usize] = 0.0;
    let mut best_final = f64::INFINITY;
    for &s in &order {
        let this = forward[s as usize];
        for arc in lat.arcs(s) {
            let next = &mut forward[arc.nextstate as usize];
            let cost = this + arc.weight.cost();
            if cost < *next {
                *next = cost;
            }
        }
        best_final = best_final.min(this + lat.final_weight(s).cost());
    }
    let cutoff = best_final + beam;

    let mut backward = vec![f64::INFINITY; states_before];
    for &s in order.iter().rev() {
        let this_forward = forward[s as usize];
        let final_cost = lat.final_weight(s).cost();
        let mut this_backward = final_cost;
        if this_forward + final_cost > cutoff && final_cost != f64::INFINITY {
            lat.set_final(s, W::zero());
        }
        let arcs = lat.take_arcs(s);
        let mut kept = Vec::with_capacity(arcs.len());
        for arc in arcs {
            let arc_backward = arc.weight.cost() + backward[arc.nextstate as usize];
            this_backward = this_backward.min(arc_backward);
            if this_forward + arc_backward <= cutoff {
                kept.push(arc);
            }
        }
        lat.set_arcs(s, kept);
        backward[s as usize] = this_backward;
    }
    connect(lat);

    let outcome = PruneOutcome::Pruned {
        states_removed: states_before - lat.num_states(),
        arcs_removed: arcs_before - lat.total_arcs(),
    };
    debug!(beam, best_cost = best_final, ?outcome, "pruned lattice");
    outcome
}

/// Collapse each two-stream weight to the scalar `graph + acoustic`, drop
/// the id strings, and sort arcs by output label for composition.
///
/// Every scalar semiring shares the tropical carrier set, so converting to
/// the log semiring is the tropical conversion followed by a relabeling of
/// the semiring.
pub fn convert_lattice<W: ScalarWeight>(lat: &CompactLattice) -> VectorFst<W> {
    let mut fst = lat.map_weights(|w| W::from_cost(w.cost()));
    fst.sort_arcs(ArcSortKey::Output);
    fst
}
