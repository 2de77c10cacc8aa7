// Composition of two weighted transducers over the same semiring.
//
// The result accepts `x:z` with weight `w1 ⊗ w2` whenever the left operand
// accepts `x:y` with weight `w1` and the right one accepts `y:z` with weight
// `w2`. Epsilons on the shared tape are sequenced by a two-state filter so
// that every pair of matching paths yields exactly one composed path, which
// matters for non-idempotent semirings such as the log semiring.

use std::collections::VecDeque;

use hashbrown::HashMap;
use tracing::debug;

use crate::semiring::Semiring;
use crate::topology::connect;
use crate::vector::{Arc, ArcSortKey, EPSILON, Label, StateId, VectorFst};

/// Epsilon filter state.
///
/// `Open`: the left operand may still take output-epsilon moves.
/// `RightOnly`: the right operand has taken an input-epsilon move since the
/// last matched symbol, so only it may take further epsilon moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Filter {
    Open,
    RightOnly,
}

/// How matching arcs are found for a pair of states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Right arcs are sorted on input label: binary search them.
    LookupRight,
    /// Left arcs are sorted on output label: binary search them.
    LookupLeft,
    /// Neither side is sorted: compare every pair of arcs.
    Scan,
}

impl MatchStrategy {
    pub fn select<W: Semiring>(left: &VectorFst<W>, right: &VectorFst<W>) -> Self {
        if right.is_arc_sorted(ArcSortKey::Input) {
            MatchStrategy::LookupRight
        } else if left.is_arc_sorted(ArcSortKey::Output) {
            MatchStrategy::LookupLeft
        } else {
            MatchStrategy::Scan
        }
    }
}

/// The sub-slice of `arcs` (sorted on `key`) whose label equals `label`.
fn equal_range<W>(arcs: &[Arc<W>], key: ArcSortKey, label: Label) -> &[Arc<W>] {
    let lo = arcs.partition_point(|a| key.label(a) < label);
    let hi = lo + arcs[lo..].partition_point(|a| key.label(a) == label);
    &arcs[lo..hi]
}

struct Composer<'a, W> {
    left: &'a VectorFst<W>,
    right: &'a VectorFst<W>,
    strategy: MatchStrategy,
    result: VectorFst<W>,
    ids: HashMap<(StateId, StateId, Filter), StateId>,
    queue: VecDeque<(StateId, StateId, Filter)>,
}

impl<'a, W: Semiring> Composer<'a, W> {
    fn state_id(&mut self, tuple: (StateId, StateId, Filter)) -> StateId {
        if let Some(&id) = self.ids.get(&tuple) {
            return id;
        }
        let id = self.result.add_state();
        self.ids.insert(tuple, id);
        self.queue.push_back(tuple);
        id
    }

    fn expand(&mut self, id: StateId, (s1, s2, filter): (StateId, StateId, Filter)) {
        let (left, right) = (self.left, self.right);

        if left.is_final(s1) && right.is_final(s2) {
            let weight = left.final_weight(s1).times(right.final_weight(s2));
            self.result.set_final(id, weight);
        }

        // Left moves alone on an output epsilon.
        if filter == Filter::Open {
            for a1 in left.arcs(s1).iter().filter(|a| a.olabel == EPSILON) {
                let next = self.state_id((a1.nextstate, s2, Filter::Open));
                let arc = Arc::new(a1.ilabel, EPSILON, a1.weight.clone(), next);
                self.result.add_arc(id, arc);
            }
        }

        // Right moves alone on an input epsilon.
        for a2 in right.arcs(s2).iter().filter(|a| a.ilabel == EPSILON) {
            let next = self.state_id((s1, a2.nextstate, Filter::RightOnly));
            let arc = Arc::new(EPSILON, a2.olabel, a2.weight.clone(), next);
            self.result.add_arc(id, arc);
        }

        // Both move on a shared non-epsilon symbol.
        match self.strategy {
            MatchStrategy::LookupRight => {
                for a1 in left.arcs(s1).iter().filter(|a| a.olabel != EPSILON) {
                    for a2 in equal_range(right.arcs(s2), ArcSortKey::Input, a1.olabel) {
                        self.add_match(id, a1, a2);
                    }
                }
            }
            MatchStrategy::LookupLeft => {
                for a2 in right.arcs(s2).iter().filter(|a| a.ilabel != EPSILON) {
                    for a1 in equal_range(left.arcs(s1), ArcSortKey::Output, a2.ilabel) {
                        self.add_match(id, a1, a2);
                    }
                }
            }
            MatchStrategy::Scan => {
                for a1 in left.arcs(s1).iter().filter(|a| a.olabel != EPSILON) {
                    for a2 in right.arcs(s2).iter().filter(|a| a.ilabel == a1.olabel) {
                        self.add_match(id, a1, a2);
                    }
                }
            }
        }
    }

    fn add_match(&mut self, id: StateId, a1: &Arc<W>, a2: &Arc<W>) {
        let next = self.state_id((a1.nextstate, a2.nextstate, Filter::Open));
        let arc = Arc::new(a1.ilabel, a2.olabel, a1.weight.times(&a2.weight), next);
        self.result.add_arc(id, arc);
    }
}

/// Compose `left` with `right`, matching `left`'s output labels against
/// `right`'s input labels.
///
/// Sorting `right` on input labels (or `left` on output labels) beforehand
/// lets matching use binary search; unsorted operands are still composed
/// correctly, only more slowly. The result is trimmed: when no path pair
/// matches it is the empty, start-less automaton.
pub fn compose<W: Semiring>(left: &VectorFst<W>, right: &VectorFst<W>) -> VectorFst<W> {
    let strategy = MatchStrategy::select(left, right);
    compose_with(left, right, strategy)
}

/// [`compose`] with an explicit matching strategy. A lookup strategy requires
/// the corresponding operand to be sorted.
pub fn compose_with<W: Semiring>(
    left: &VectorFst<W>,
    right: &VectorFst<W>,
    strategy: MatchStrategy,
) -> VectorFst<W> {
    let mut composer = Composer {
        left,
        right,
        strategy,
        result: VectorFst::new(),
        ids: HashMap::new(),
        queue: VecDeque::new(),
    };

    let (Some(start1), Some(start2)) = (left.start(), right.start()) else {
        return composer.result;
    };
    let start = composer.state_id((start1, start2, Filter::Open));
    composer.result.set_start(start);

    while let Some(tuple) = composer.queue.pop_front() {
        let id = composer.ids[&tuple];
        composer.expand(id, tuple);
    }

    let mut result = composer.result;
    let expanded = result.num_states();
    connect(&mut result);
    debug!(
        ?strategy,
        expanded,
        states = result.num_states(),
        arcs = result.total_arcs(),
        "composed"
    );
    result
}
