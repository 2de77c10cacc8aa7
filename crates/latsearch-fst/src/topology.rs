// Structural queries and trimming: topological order, accessibility,
// coaccessibility and connect.

use std::collections::VecDeque;

use crate::semiring::Semiring;
use crate::vector::{StateId, VectorFst};

/// Topological order of all states (Kahn's algorithm), or `None` if the
/// automaton has a cycle. Ties are broken by state id, so an automaton whose
/// arcs all go forward yields `0, 1, 2, ...`.
pub fn top_order<W: Semiring>(fst: &VectorFst<W>) -> Option<Vec<StateId>> {
    let n = fst.num_states();
    let mut in_degree = vec![0usize; n];
    for s in fst.states() {
        for arc in fst.arcs(s) {
            in_degree[arc.nextstate as usize] += 1;
        }
    }

    let mut ready: VecDeque<StateId> = fst
        .states()
        .filter(|&s| in_degree[s as usize] == 0)
        .collect();
    let mut order = Vec::with_capacity(n);
    while let Some(s) = ready.pop_front() {
        order.push(s);
        for arc in fst.arcs(s) {
            let d = &mut in_degree[arc.nextstate as usize];
            *d -= 1;
            if *d == 0 {
                ready.push_back(arc.nextstate);
            }
        }
    }

    (order.len() == n).then_some(order)
}

pub fn is_acyclic<W: Semiring>(fst: &VectorFst<W>) -> bool {
    top_order(fst).is_some()
}

/// States reachable from the start state.
pub fn accessible<W: Semiring>(fst: &VectorFst<W>) -> Vec<bool> {
    let mut seen = vec![false; fst.num_states()];
    let Some(start) = fst.start() else {
        return seen;
    };
    let mut stack = vec![start];
    seen[start as usize] = true;
    while let Some(s) = stack.pop() {
        for arc in fst.arcs(s) {
            let next = arc.nextstate as usize;
            if !seen[next] {
                seen[next] = true;
                stack.push(arc.nextstate);
            }
        }
    }
    seen
}

/// States from which some accepting state is reachable.
pub fn coaccessible<W: Semiring>(fst: &VectorFst<W>) -> Vec<bool> {
    let n = fst.num_states();
    let mut reverse: Vec<Vec<StateId>> = vec![Vec::new(); n];
    for s in fst.states() {
        for arc in fst.arcs(s) {
            reverse[arc.nextstate as usize].push(s);
        }
    }

    let mut seen = vec![false; n];
    let mut stack: Vec<StateId> = fst.states().filter(|&s| fst.is_final(s)).collect();
    for &s in &stack {
        seen[s as usize] = true;
    }
    while let Some(s) = stack.pop() {
        for &prev in &reverse[s as usize] {
            if !seen[prev as usize] {
                seen[prev as usize] = true;
                stack.push(prev);
            }
        }
    }
    seen
}

/// Trim the automaton to the states that lie on some successful path.
///
/// Surviving states keep their relative order. If no successful path
/// exists, the result has no states and no start state.
pub fn connect<W: Semiring>(fst: &mut VectorFst<W>) {
    let acc = accessible(fst);
    let coacc = coaccessible(fst);
    let keep: Vec<bool> = acc.iter().zip(&coacc).map(|(&a, &c)| a && c).collect();
    if keep.iter().all(|&k| k) {
        return;
    }
    fst.retain_states(&keep);
}
