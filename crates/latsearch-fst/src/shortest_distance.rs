// Single-source shortest distance over a semiring, and the total
// likelihood of an automaton derived from it.

use std::collections::VecDeque;

use tracing::debug;

use crate::semiring::Semiring;
use crate::topology::top_order;
use crate::vector::VectorFst;

/// Convergence threshold for automata with cycles.
pub const SHORTEST_DELTA: f64 = 1e-6;

/// For every state `s`, the `plus` over all paths from the start state to `s`
/// of the `times` of the arc weights along the path.
///
/// Acyclic automata are solved exactly by one pass in topological order.
/// Cyclic automata fall back to the generic queue relaxation, which stops
/// once no distance changes by more than [`SHORTEST_DELTA`]; it terminates
/// whenever the semiring's infinite sums converge (e.g. non-negative cycles
/// in the tropical semiring, or cycles with positive cost in the log one).
pub fn shortest_distance<W: Semiring>(fst: &VectorFst<W>) -> Vec<W> {
    let mut distance = vec![W::zero(); fst.num_states()];
    let Some(start) = fst.start() else {
        return distance;
    };
    distance[start as usize] = W::one();

    match top_order(fst) {
        Some(order) => {
            for s in order {
                let d = &distance[s as usize];
                if d.is_zero() {
                    continue;
                }
                let d = d.clone();
                for arc in fst.arcs(s) {
                    let next = arc.nextstate as usize;
                    distance[next] = distance[next].plus(&d.times(&arc.weight));
                }
            }
        }
        None => {
            let relaxations = relax_fifo(fst, start as usize, &mut distance, SHORTEST_DELTA);
            debug!(
                semiring = W::NAME,
                states = fst.num_states(),
                relaxations,
                "shortest distance on cyclic automaton"
            );
        }
    }
    distance
}

/// Generic single-source relaxation with a FIFO queue. Returns the number of
/// states popped.
fn relax_fifo<W: Semiring>(
    fst: &VectorFst<W>,
    start: usize,
    distance: &mut [W],
    delta: f64,
) -> usize {
    let n = distance.len();
    let mut residual = vec![W::zero(); n];
    let mut enqueued = vec![false; n];
    let mut queue = VecDeque::new();

    residual[start] = W::one();
    enqueued[start] = true;
    queue.push_back(start);

    let mut popped = 0;
    while let Some(s) = queue.pop_front() {
        popped += 1;
        enqueued[s] = false;
        let r = std::mem::replace(&mut residual[s], W::zero());
        for arc in fst.arcs(s as u32) {
            let next = arc.nextstate as usize;
            let contribution = r.times(&arc.weight);
            let updated = distance[next].plus(&contribution);
            if distance[next].approx_eq(&updated, delta) {
                continue;
            }
            distance[next] = updated;
            residual[next] = residual[next].plus(&contribution);
            if !enqueued[next] {
                enqueued[next] = true;
                queue.push_back(next);
            }
        }
    }
    popped
}

/// `plus` over all accepting states `s` of `distance(s) ⊗ final(s)`: the
/// weight of the whole automaton. `zero()` when there is no start state.
pub fn total_weight<W: Semiring>(fst: &VectorFst<W>) -> W {
    if fst.start().is_none() {
        return W::zero();
    }
    let distance = shortest_distance(fst);
    fst.states()
        .filter(|&s| fst.is_final(s))
        .fold(W::zero(), |acc, s| {
            acc.plus(&distance[s as usize].times(fst.final_weight(s)))
        })
}

/// Total log-likelihood of an automaton: the negated total cost, so larger
/// means more likely. A start-less automaton scores `-inf`.
pub fn likelihood<W: Semiring>(fst: &VectorFst<W>) -> f64 {
    if fst.start().is_none() {
        return f64::NEG_INFINITY;
    }
    -total_weight(fst).cost()
}
