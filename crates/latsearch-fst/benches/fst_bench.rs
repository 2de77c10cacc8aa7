// Criterion benchmarks for latsearch-fst.
//
// The input is a synthetic "sausage" lattice: a chain of positions, each with
// a handful of alternative word arcs, which is the shape lattices have after
// determinization. No external data is needed.
//
// Run:
//   cargo bench -p latsearch-fst

use criterion::{Criterion, criterion_group, criterion_main};
use latsearch_fst::{Arc, LogWeight, ScalarWeight, TropicalWeight, VectorFst};

const POSITIONS: u32 = 400;
const ALTERNATIVES: u32 = 8;
const VOCABULARY: u32 = 2000;

fn sausage<W: ScalarWeight>() -> VectorFst<W> {
    let mut fst = VectorFst::new();
    let mut state = fst.add_state();
    fst.set_start(state);
    for pos in 0..POSITIONS {
        let next = fst.add_state();
        for alt in 0..ALTERNATIVES {
            let label = 1 + (pos * 31 + alt * 17) % VOCABULARY;
            let cost = 0.5 + alt as f64 * 0.75;
            fst.add_arc(state, Arc::new(label, label, W::from_cost(cost), next));
        }
        state = next;
    }
    fst.set_final(state, W::one());
    fst.sort_arcs_by_output();
    fst
}

/// Accepts any sequence that contains label 1 somewhere.
fn keyword_query<W: ScalarWeight>() -> VectorFst<W> {
    let mut fst = VectorFst::new();
    let before = fst.add_state();
    let after = fst.add_state();
    fst.set_start(before);
    for label in 1..=VOCABULARY {
        fst.add_arc(before, Arc::new(label, label, W::one(), before));
        fst.add_arc(after, Arc::new(label, label, W::one(), after));
    }
    fst.add_arc(before, Arc::new(1, 1, W::one(), after));
    fst.set_final(after, W::one());
    fst.sort_arcs_by_input();
    fst
}

fn bench_likelihood(c: &mut Criterion) {
    let log = sausage::<LogWeight>();
    let tropical = sausage::<TropicalWeight>();

    c.bench_function("likelihood_log_sausage", |b| {
        b.iter(|| std::hint::black_box(latsearch_fst::likelihood(&log)));
    });
    c.bench_function("likelihood_tropical_sausage", |b| {
        b.iter(|| std::hint::black_box(latsearch_fst::likelihood(&tropical)));
    });
}

fn bench_compose(c: &mut Criterion) {
    let lattice = sausage::<LogWeight>();
    let query = keyword_query::<LogWeight>();

    c.bench_function("compose_keyword_query", |b| {
        b.iter(|| std::hint::black_box(latsearch_fst::compose(&lattice, &query)));
    });
    c.bench_function("compose_and_score_keyword_query", |b| {
        b.iter(|| {
            let restricted = latsearch_fst::compose(&lattice, &query);
            std::hint::black_box(latsearch_fst::likelihood(&restricted))
        });
    });
}

criterion_group!(benches, bench_likelihood, bench_compose);
criterion_main!(benches);
