// Mutable weighted automaton stored as a vector of states, each owning its
// outgoing arc list.

use crate::semiring::Semiring;
use crate::FstError;

/// Arc label. `EPSILON` (0) means "no symbol".
pub type Label = u32;

/// State identifier: index into the state vector.
pub type StateId = u32;

/// The empty label.
pub const EPSILON: Label = 0;

/// An arc leaving some state (the source is implicit).
#[derive(Debug, Clone, PartialEq)]
pub struct Arc<W> {
    pub ilabel: Label,
    pub olabel: Label,
    pub weight: W,
    pub nextstate: StateId,
}

impl<W> Arc<W> {
    pub fn new(ilabel: Label, olabel: Label, weight: W, nextstate: StateId) -> Self {
        Arc {
            ilabel,
            olabel,
            weight,
            nextstate,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct VectorState<W> {
    /// `W::zero()` for non-accepting states.
    final_weight: W,
    arcs: Vec<Arc<W>>,
}

/// Which label an arc list is ordered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcSortKey {
    Input,
    Output,
}

impl ArcSortKey {
    #[inline]
    pub fn label<W>(self, arc: &Arc<W>) -> Label {
        match self {
            ArcSortKey::Input => arc.ilabel,
            ArcSortKey::Output => arc.olabel,
        }
    }
}

/// A weighted automaton (transducer) with arcs labeled `ilabel:olabel/weight`.
///
/// States are numbered `0..num_states()` in creation order. The start state is
/// optional: an automaton without one accepts nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorFst<W> {
    states: Vec<VectorState<W>>,
    start: Option<StateId>,
}

impl<W: Semiring> Default for VectorFst<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Semiring> VectorFst<W> {
    pub fn new() -> Self {
        VectorFst {
            states: Vec::new(),
            start: None,
        }
    }

    /// Add a non-accepting state and return its id.
    pub fn add_state(&mut self) -> StateId {
        let id = self.states.len() as StateId;
        self.states.push(VectorState {
            final_weight: W::zero(),
            arcs: Vec::new(),
        });
        id
    }

    /// Add states until `num_states() > state`.
    pub fn ensure_state(&mut self, state: StateId) {
        while self.states.len() <= state as usize {
            self.add_state();
        }
    }

    pub fn set_start(&mut self, state: StateId) {
        self.start = Some(state);
    }

    pub fn start(&self) -> Option<StateId> {
        self.start
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn num_arcs(&self, state: StateId) -> usize {
        self.states[state as usize].arcs.len()
    }

    pub fn total_arcs(&self) -> usize {
        self.states.iter().map(|s| s.arcs.len()).sum()
    }

    pub fn states(&self) -> std::ops::Range<StateId> {
        0..self.states.len() as StateId
    }

    pub fn set_final(&mut self, state: StateId, weight: W) {
        self.states[state as usize].final_weight = weight;
    }

    /// Final weight of `state`; `W::zero()` if the state does not accept.
    pub fn final_weight(&self, state: StateId) -> &W {
        &self.states[state as usize].final_weight
    }

    pub fn is_final(&self, state: StateId) -> bool {
        !self.states[state as usize].final_weight.is_zero()
    }

    pub fn add_arc(&mut self, state: StateId, arc: Arc<W>) {
        self.states[state as usize].arcs.push(arc);
    }

    pub fn arcs(&self, state: StateId) -> &[Arc<W>] {
        &self.states[state as usize].arcs
    }

    /// Replace the whole arc list of `state`.
    pub fn set_arcs(&mut self, state: StateId, arcs: Vec<Arc<W>>) {
        self.states[state as usize].arcs = arcs;
    }

    /// Take the arc list of `state`, leaving it empty.
    pub fn take_arcs(&mut self, state: StateId) -> Vec<Arc<W>> {
        std::mem::take(&mut self.states[state as usize].arcs)
    }

    /// Rewrite every arc of every state.
    ///
    /// Each state's arc list is taken out, mapped, and put back, so `f` never
    /// observes a partially rewritten list.
    pub fn map_arcs<F>(&mut self, mut f: F)
    where
        F: FnMut(StateId, Arc<W>) -> Arc<W>,
    {
        for state in self.states() {
            let arcs = self
                .take_arcs(state)
                .into_iter()
                .map(|arc| f(state, arc))
                .collect();
            self.set_arcs(state, arcs);
        }
    }

    /// Rewrite every final weight. Non-accepting states are skipped.
    pub fn map_finals<F>(&mut self, mut f: F)
    where
        F: FnMut(StateId, &W) -> W,
    {
        for (id, state) in self.states.iter_mut().enumerate() {
            if !state.final_weight.is_zero() {
                state.final_weight = f(id as StateId, &state.final_weight);
            }
        }
    }

    /// Build an isomorphic automaton over another weight type.
    ///
    /// `f` is applied to every arc weight and every final weight (including
    /// the `zero()` of non-accepting states, which must map to zero).
    pub fn map_weights<V, F>(&self, f: F) -> VectorFst<V>
    where
        V: Semiring,
        F: Fn(&W) -> V,
    {
        let states = self
            .states
            .iter()
            .map(|s| VectorState {
                final_weight: f(&s.final_weight),
                arcs: s
                    .arcs
                    .iter()
                    .map(|a| Arc::new(a.ilabel, a.olabel, f(&a.weight), a.nextstate))
                    .collect(),
            })
            .collect();
        VectorFst {
            states,
            start: self.start,
        }
    }

    /// Stable-sort every arc list on the given label.
    pub fn sort_arcs(&mut self, key: ArcSortKey) {
        for state in &mut self.states {
            state.arcs.sort_by_key(|arc| key.label(arc));
        }
    }

    pub fn sort_arcs_by_input(&mut self) {
        self.sort_arcs(ArcSortKey::Input);
    }

    pub fn sort_arcs_by_output(&mut self) {
        self.sort_arcs(ArcSortKey::Output);
    }

    /// Whether every arc list is non-decreasing on the given label.
    pub fn is_arc_sorted(&self, key: ArcSortKey) -> bool {
        self.states.iter().all(|s| {
            s.arcs
                .windows(2)
                .all(|w| key.label(&w[0]) <= key.label(&w[1]))
        })
    }

    /// Sort on `key` unless already sorted. Returns whether a sort happened.
    pub fn ensure_arc_sorted(&mut self, key: ArcSortKey) -> bool {
        if self.is_arc_sorted(key) {
            return false;
        }
        self.sort_arcs(key);
        true
    }

    /// Check that the start state and every arc destination exist.
    pub fn validate(&self) -> Result<(), FstError> {
        let num_states = self.states.len();
        if let Some(start) = self.start {
            if start as usize >= num_states {
                return Err(FstError::InvalidStart { start, num_states });
            }
        }
        for (state, s) in self.states.iter().enumerate() {
            for (arc, a) in s.arcs.iter().enumerate() {
                if a.nextstate as usize >= num_states {
                    return Err(FstError::MalformedAutomaton {
                        state: state as StateId,
                        arc,
                        nextstate: a.nextstate,
                        num_states,
                    });
                }
            }
        }
        Ok(())
    }

    /// Keep only the states for which `keep[s]` is true, renumbering the
    /// survivors in their original order. Arcs into dropped states vanish.
    /// If the start state is dropped the result is the empty automaton.
    pub fn retain_states(&mut self, keep: &[bool]) {
        let mut new_id = vec![None; self.states.len()];
        let mut next: StateId = 0;
        for (s, &k) in keep.iter().enumerate().take(self.states.len()) {
            if k {
                new_id[s] = Some(next);
                next += 1;
            }
        }

        let start = self.start.and_then(|s| new_id[s as usize]);
        let Some(start) = start else {
            self.delete_states();
            return;
        };

        let old = std::mem::take(&mut self.states);
        self.states = old
            .into_iter()
            .enumerate()
            .filter(|(s, _)| new_id[*s].is_some())
            .map(|(_, mut state)| {
                state.arcs = state
                    .arcs
                    .into_iter()
                    .filter_map(|mut arc| {
                        arc.nextstate = new_id[arc.nextstate as usize]?;
                        Some(arc)
                    })
                    .collect();
                state
            })
            .collect();
        self.start = Some(start);
    }

    /// Remove all states and the start state.
    pub fn delete_states(&mut self) {
        self.states.clear();
        self.start = None;
    }
}
